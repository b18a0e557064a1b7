use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::config::ApiConfig;
use crate::core::Transaction;

/// Timestamp format on the wire: ISO-8601 with milliseconds.
const WIRE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// One page of an account's transaction history.
#[derive(Debug, Clone, Default)]
pub struct TransactionsPage {
    pub transactions: Vec<Transaction>,
    /// Opaque cursor signalling that more pages exist.
    pub next_cursor: Option<String>,
}

/// Read access to the remote transaction ledger.
#[async_trait]
pub trait LedgerSource {
    async fn fetch_transactions(
        &self,
        account: &str,
        cursor: Option<&str>,
    ) -> Result<TransactionsPage, LedgerError>;

    async fn fetch_transaction(&self, tx_id: &str) -> Result<Transaction, LedgerError>;
}

#[derive(Debug)]
pub enum LedgerError {
    /// Transport failure or undecodable response body.
    Network(reqwest::Error),
    /// Non-retryable HTTP status.
    Http(StatusCode),
    /// Gateway-timeout retry budget exhausted.
    MaxRetriesExceeded,
    /// Response decoded but a field was malformed.
    Parse(String),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::Network(e) => write!(f, "network error: {e}"),
            LedgerError::Http(status) => write!(f, "ledger API returned {status}"),
            LedgerError::MaxRetriesExceeded => write!(f, "max retries exceeded"),
            LedgerError::Parse(msg) => write!(f, "malformed ledger response: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

/// What to do with a response, given how many gateway timeouts were already
/// consumed for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    Proceed,
    /// 429: sleep the cool-down and reissue without touching the budget.
    CoolDown,
    /// 504: sleep the backoff and reissue, consuming one attempt.
    Backoff,
    /// 504 with the budget spent.
    GiveUp,
    /// Any other error status.
    Fail,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub rate_limit_cooldown: Duration,
    pub gateway_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ApiConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            rate_limit_cooldown: Duration::from_secs(config.rate_limit_cooldown_secs),
            gateway_backoff: Duration::from_secs(config.gateway_backoff_secs),
        }
    }

    /// Classify a response status. `timeouts` counts 504s already seen for
    /// the request being retried.
    pub fn classify(&self, status: StatusCode, timeouts: u32) -> RetryAction {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return RetryAction::CoolDown;
        }
        if status == StatusCode::GATEWAY_TIMEOUT {
            return if timeouts + 1 >= self.max_retries {
                RetryAction::GiveUp
            } else {
                RetryAction::Backoff
            };
        }
        if status.is_success() {
            RetryAction::Proceed
        } else {
            RetryAction::Fail
        }
    }
}

/// HTTP client for the xrpscan-style ledger API.
pub struct LedgerClient {
    http: Client,
    base_url: String,
    page_size: u32,
    policy: RetryPolicy,
}

impl LedgerClient {
    pub fn new(config: &ApiConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            policy: RetryPolicy::from_config(config),
        }
    }

    /// Issue a GET and decode the body, honoring the retry protocol.
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, LedgerError> {
        let mut timeouts = 0;
        loop {
            let resp = self
                .http
                .get(url)
                .query(query)
                .send()
                .await
                .map_err(LedgerError::Network)?;
            match self.policy.classify(resp.status(), timeouts) {
                RetryAction::Proceed => {
                    return resp.json::<T>().await.map_err(LedgerError::Network);
                }
                RetryAction::CoolDown => {
                    warn!(
                        "Rate limited by ledger API, cooling down for {}s",
                        self.policy.rate_limit_cooldown.as_secs()
                    );
                    tokio::time::sleep(self.policy.rate_limit_cooldown).await;
                }
                RetryAction::Backoff => {
                    timeouts += 1;
                    warn!(
                        "Gateway timeout, retrying ({timeouts}/{})",
                        self.policy.max_retries
                    );
                    tokio::time::sleep(self.policy.gateway_backoff).await;
                }
                RetryAction::GiveUp => return Err(LedgerError::MaxRetriesExceeded),
                RetryAction::Fail => return Err(LedgerError::Http(resp.status())),
            }
        }
    }
}

#[async_trait]
impl LedgerSource for LedgerClient {
    async fn fetch_transactions(
        &self,
        account: &str,
        cursor: Option<&str>,
    ) -> Result<TransactionsPage, LedgerError> {
        let url = format!("{}/account/{account}/transactions", self.base_url);
        let mut query = vec![("limit", self.page_size.to_string())];
        if let Some(cursor) = cursor {
            query.push(("marker", cursor.to_string()));
        }
        let resp: TransactionsResponse = self.get_json(&url, &query).await?;
        let transactions = resp
            .transactions
            .into_iter()
            .map(WireTransaction::into_transaction)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TransactionsPage {
            transactions,
            next_cursor: resp.marker,
        })
    }

    async fn fetch_transaction(&self, tx_id: &str) -> Result<Transaction, LedgerError> {
        let url = format!("{}/transaction/{tx_id}", self.base_url);
        let wire: WireTransaction = self.get_json(&url, &[]).await?;
        wire.into_transaction()
    }
}

// --- Wire formats ---

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    transactions: Vec<WireTransaction>,
    marker: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireTransaction {
    #[serde(rename = "Account")]
    account: String,
    #[serde(rename = "Destination")]
    destination: Option<String>,
    #[serde(rename = "Amount")]
    amount: Option<WireAmount>,
    date: String,
}

/// Amount object; `value` is an integer drop count as a string.
#[derive(Debug, Deserialize)]
struct WireAmount {
    value: String,
}

impl WireTransaction {
    fn into_transaction(self) -> Result<Transaction, LedgerError> {
        let timestamp = NaiveDateTime::parse_from_str(&self.date, WIRE_DATE_FORMAT)
            .map_err(|e| LedgerError::Parse(format!("bad timestamp {:?}: {e}", self.date)))?
            .and_utc();
        let amount = match &self.amount {
            Some(a) => Some(a.value.parse::<u64>().map_err(|e| {
                LedgerError::Parse(format!("bad amount {:?}: {e}", a.value))
            })?),
            None => None,
        };
        Ok(Transaction {
            source: self.account,
            destination: self.destination,
            amount,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 5,
            rate_limit_cooldown: Duration::from_secs(60),
            gateway_backoff: Duration::from_secs(30),
        }
    }

    #[test]
    fn success_proceeds() {
        assert_eq!(policy().classify(StatusCode::OK, 0), RetryAction::Proceed);
    }

    #[test]
    fn rate_limit_never_consumes_budget() {
        let policy = policy();
        // Even after many 504s the 429 path still only cools down.
        assert_eq!(
            policy.classify(StatusCode::TOO_MANY_REQUESTS, 0),
            RetryAction::CoolDown
        );
        assert_eq!(
            policy.classify(StatusCode::TOO_MANY_REQUESTS, 4),
            RetryAction::CoolDown
        );
    }

    #[test]
    fn fifth_consecutive_gateway_timeout_gives_up() {
        let policy = policy();
        let mut timeouts = 0;
        for _ in 0..4 {
            assert_eq!(
                policy.classify(StatusCode::GATEWAY_TIMEOUT, timeouts),
                RetryAction::Backoff
            );
            timeouts += 1;
        }
        assert_eq!(
            policy.classify(StatusCode::GATEWAY_TIMEOUT, timeouts),
            RetryAction::GiveUp
        );
    }

    #[test]
    fn other_errors_fail_immediately() {
        let policy = policy();
        assert_eq!(
            policy.classify(StatusCode::INTERNAL_SERVER_ERROR, 0),
            RetryAction::Fail
        );
        assert_eq!(policy.classify(StatusCode::NOT_FOUND, 0), RetryAction::Fail);
        assert_eq!(policy.classify(StatusCode::FORBIDDEN, 0), RetryAction::Fail);
    }

    #[test]
    fn wire_transaction_decodes_payment() {
        let wire: WireTransaction = serde_json::from_str(
            r#"{
                "Account": "rSourceAccount",
                "Destination": "rDestAccount",
                "Amount": {"value": "2500000"},
                "date": "2023-07-15T10:30:00.000Z"
            }"#,
        )
        .unwrap();
        let txn = wire.into_transaction().unwrap();
        assert_eq!(txn.source, "rSourceAccount");
        assert_eq!(txn.destination.as_deref(), Some("rDestAccount"));
        assert_eq!(txn.amount, Some(2_500_000));
        assert_eq!(txn.timestamp.to_rfc3339(), "2023-07-15T10:30:00+00:00");
    }

    #[test]
    fn wire_transaction_without_destination() {
        // Non-payment types carry neither destination nor amount.
        let wire: WireTransaction = serde_json::from_str(
            r#"{"Account": "rSourceAccount", "date": "2023-07-15T10:30:00.123Z"}"#,
        )
        .unwrap();
        let txn = wire.into_transaction().unwrap();
        assert!(txn.destination.is_none());
        assert!(txn.amount.is_none());
    }

    #[test]
    fn wire_transaction_rejects_bad_timestamp() {
        let wire: WireTransaction = serde_json::from_str(
            r#"{"Account": "rSourceAccount", "date": "15/07/2023"}"#,
        )
        .unwrap();
        assert!(matches!(
            wire.into_transaction(),
            Err(LedgerError::Parse(_))
        ));
    }

    #[test]
    fn wire_transaction_rejects_non_integer_amount() {
        let wire: WireTransaction = serde_json::from_str(
            r#"{
                "Account": "rSourceAccount",
                "Destination": "rDestAccount",
                "Amount": {"value": "12.5"},
                "date": "2023-07-15T10:30:00.000Z"
            }"#,
        )
        .unwrap();
        assert!(matches!(
            wire.into_transaction(),
            Err(LedgerError::Parse(_))
        ));
    }

    #[test]
    fn page_response_with_marker() {
        let resp: TransactionsResponse = serde_json::from_str(
            r#"{"transactions": [], "marker": "page2token"}"#,
        )
        .unwrap();
        assert_eq!(resp.marker.as_deref(), Some("page2token"));
    }
}
