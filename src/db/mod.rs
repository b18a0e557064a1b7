pub mod schema;

use rusqlite::Connection;
use std::path::Path;

use crate::tags::AddressTag;

/// SQLite-backed analyst tag store.
///
/// The registry reads it once at startup; writes come from the external
/// tag-management path (`tag` subcommand), never from a running trace.
pub struct TagStore {
    conn: Connection,
}

impl TagStore {
    pub fn open(path: &Path) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Load every stored tag.
    pub fn all_tags(&self) -> Result<Vec<AddressTag>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT address, label, category, notes FROM tags")?;
        let rows = stmt.query_map([], |row| {
            Ok(AddressTag {
                address: row.get(0)?,
                label: row.get(1)?,
                category: row.get(2)?,
                notes: row.get(3)?,
            })
        })?;
        let mut tags = Vec::new();
        for tag in rows {
            tags.push(tag?);
        }
        Ok(tags)
    }

    /// Insert or update a tag by address.
    pub fn upsert_tag(&self, tag: &AddressTag) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO tags (address, label, category, notes, updated_at)
             VALUES (?1, ?2, ?3, ?4, datetime('now'))",
            rusqlite::params![tag.address, tag.label, tag.category, tag.notes],
        )?;
        Ok(())
    }

    /// Look up one tag by address.
    pub fn lookup(&self, address: &str) -> Option<AddressTag> {
        let mut stmt = self
            .conn
            .prepare("SELECT address, label, category, notes FROM tags WHERE address = ?1")
            .ok()?;
        let mut rows = stmt.query(rusqlite::params![address]).ok()?;
        if let Some(row) = rows.next().ok()? {
            Some(AddressTag {
                address: row.get(0).ok()?,
                label: row.get(1).ok()?,
                category: row.get(2).ok()?,
                notes: row.get(3).ok()?,
            })
        } else {
            None
        }
    }
}
