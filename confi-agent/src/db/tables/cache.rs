//! Database operations for the `cache_entries` table

use chrono::Utc;

use crate::db::Database;

impl Database {
    /// Raw JSON value stored under `key`
    pub fn get_cache(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let conn = self.conn();
        let result = conn.query_row(
            "SELECT value FROM cache_entries WHERE key = ?1",
            rusqlite::params![key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn set_cache(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO cache_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn delete_cache(&self, key: &str) -> Result<bool, rusqlite::Error> {
        let conn = self.conn();
        let deleted = conn.execute(
            "DELETE FROM cache_entries WHERE key = ?1",
            rusqlite::params![key],
        )?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[test]
    fn test_cache_roundtrip_and_overwrite() {
        let db = Database::new(":memory:").unwrap();
        assert_eq!(db.get_cache("twitter/bot/lastSummary").unwrap(), None);

        db.set_cache("twitter/bot/lastSummary", r#"{"id":"1"}"#).unwrap();
        db.set_cache("twitter/bot/lastSummary", r#"{"id":"2"}"#).unwrap();
        assert_eq!(
            db.get_cache("twitter/bot/lastSummary").unwrap().as_deref(),
            Some(r#"{"id":"2"}"#)
        );

        assert!(db.delete_cache("twitter/bot/lastSummary").unwrap());
        assert!(!db.delete_cache("twitter/bot/lastSummary").unwrap());
    }
}
