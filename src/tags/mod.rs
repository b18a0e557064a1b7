use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::db::TagStore;

/// Tag category that marks an address as a mixer. Any other category
/// overrides heuristic mixer suspicion.
pub const MIXER_CATEGORY: &str = "mixer";

/// An analyst-supplied label for an address. Authoritative over heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressTag {
    pub address: String,
    pub label: String,
    pub category: String,
    pub notes: String,
}

/// Known exchange deposit addresses, compiled in. Sourced from public lists;
/// verify before acting on a match.
const KNOWN_EXCHANGES: &[(&str, &str)] = &[
    ("rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh", "Binance"),
    ("r9KXXTBM4e3AQ9J1z2DdHNFFwyW1BQhtPQ", "Kraken"),
    ("rLHzPsX6oXkzU2qL12kHCH8G8cn5WSmpJr", "Coinbase"),
];

/// In-memory lookup over known exchanges and analyst tags.
///
/// Loaded once at startup; read-only for the duration of the process. The
/// suspected-mixer set is deliberately NOT here — it is per-trace state
/// owned by the trace context.
pub struct TagRegistry {
    exchanges: HashMap<&'static str, &'static str>,
    tags: HashMap<String, AddressTag>,
}

impl TagRegistry {
    /// Load all analyst tags from the store. A read failure is non-fatal:
    /// the trace still runs, without tags.
    pub fn load(store: &TagStore) -> Self {
        let tags = match store.all_tags() {
            Ok(tags) => {
                tracing::info!("TagRegistry loaded {} analyst tags", tags.len());
                tags
            }
            Err(e) => {
                tracing::warn!("Tag store unavailable, tracing without analyst tags: {e}");
                Vec::new()
            }
        };
        Self::from_tags(tags)
    }

    /// Registry with the compiled-in exchange table and no analyst tags.
    pub fn empty() -> Self {
        Self::from_tags(Vec::new())
    }

    fn from_tags(tags: Vec<AddressTag>) -> Self {
        let mut map = HashMap::with_capacity(tags.len());
        for tag in tags {
            map.insert(tag.address.clone(), tag);
        }
        Self {
            exchanges: KNOWN_EXCHANGES.iter().copied().collect(),
            tags: map,
        }
    }

    /// Exchange label, if the address belongs to a known exchange.
    pub fn exchange(&self, address: &str) -> Option<&'static str> {
        self.exchanges.get(address).copied()
    }

    /// Analyst tag for an address.
    pub fn tag(&self, address: &str) -> Option<&AddressTag> {
        self.tags.get(address)
    }

    /// Number of loaded analyst tags.
    #[allow(dead_code)]
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Insert a tag directly into the in-memory map (for setup/testing).
    pub fn insert(&mut self, tag: AddressTag) {
        self.tags.insert(tag.address.clone(), tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet_tag(address: &str, label: &str) -> AddressTag {
        AddressTag {
            address: address.to_string(),
            label: label.to_string(),
            category: "wallet".to_string(),
            notes: "seized in case 42".to_string(),
        }
    }

    #[test]
    fn exchange_lookup_hit_and_miss() {
        let registry = TagRegistry::empty();
        assert_eq!(
            registry.exchange("rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh"),
            Some("Binance")
        );
        assert!(registry.exchange("rUnknownAddress").is_none());
    }

    #[test]
    fn tag_lookup_after_insert() {
        let mut registry = TagRegistry::empty();
        assert!(registry.tag("rSuspect").is_none());
        registry.insert(wallet_tag("rSuspect", "Seized Wallet"));
        let tag = registry.tag("rSuspect").unwrap();
        assert_eq!(tag.label, "Seized Wallet");
        assert_eq!(tag.category, "wallet");
        assert_eq!(registry.tag_count(), 1);
    }

    #[test]
    fn insert_replaces_existing_tag() {
        let mut registry = TagRegistry::empty();
        registry.insert(wallet_tag("rSuspect", "First"));
        registry.insert(wallet_tag("rSuspect", "Second"));
        assert_eq!(registry.tag("rSuspect").unwrap().label, "Second");
        assert_eq!(registry.tag_count(), 1);
    }
}
