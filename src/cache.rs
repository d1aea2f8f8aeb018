use rusqlite::{params, Connection};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Persistent store of accepted repairs, keyed on the exact original
/// entry text. An entry that reappears unchanged in a later run is
/// resolved from here without touching the TeX toolchain.
pub struct FixCache {
    conn: Connection,
}

impl FixCache {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, CacheError> {
        let conn = Connection::open(db_path)?;
        let cache = FixCache { conn };
        cache.init_schema()?;
        Ok(cache)
    }

    fn init_schema(&self) -> Result<(), CacheError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS fixes (
                original TEXT PRIMARY KEY,
                key TEXT NOT NULL,
                fixed TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        Ok(())
    }

    /// The accepted text for an entry whose original text was seen
    /// before. Equal to the original when the entry validated as-is.
    pub fn lookup(&self, original: &str) -> Result<Option<String>, CacheError> {
        let mut stmt = self
            .conn
            .prepare("SELECT fixed FROM fixes WHERE original = ?1")?;
        let mut rows = stmt.query(params![original])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    pub fn store(&mut self, key: &str, original: &str, fixed: &str) -> Result<(), CacheError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO fixes (original, key, fixed) VALUES (?1, ?2, ?3)",
            params![original, key, fixed],
        )?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize, CacheError> {
        let count: usize = self
            .conn
            .query_row("SELECT COUNT(*) FROM fixes", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn clear(&mut self) -> Result<(), CacheError> {
        self.conn.execute("DELETE FROM fixes", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn store_and_lookup_round_trip() {
        let dir = tempdir().unwrap();
        let mut cache = FixCache::new(dir.path().join("fixes.db")).unwrap();

        assert_eq!(cache.lookup("@article{a,}").unwrap(), None);
        cache
            .store("a", "@article{a,}", "@article{a,\n    year = \"2012\"\n}")
            .unwrap();
        assert_eq!(
            cache.lookup("@article{a,}").unwrap().as_deref(),
            Some("@article{a,\n    year = \"2012\"\n}")
        );
        assert_eq!(cache.count().unwrap(), 1);
    }

    #[test]
    fn store_replaces_previous_fix() {
        let dir = tempdir().unwrap();
        let mut cache = FixCache::new(dir.path().join("fixes.db")).unwrap();

        cache.store("a", "original", "first").unwrap();
        cache.store("a", "original", "second").unwrap();
        assert_eq!(cache.lookup("original").unwrap().as_deref(), Some("second"));
        assert_eq!(cache.count().unwrap(), 1);
    }

    #[test]
    fn clear_empties_the_table() {
        let dir = tempdir().unwrap();
        let mut cache = FixCache::new(dir.path().join("fixes.db")).unwrap();

        cache.store("a", "one", "one").unwrap();
        cache.store("b", "two", "two fixed").unwrap();
        assert_eq!(cache.count().unwrap(), 2);
        cache.clear().unwrap();
        assert_eq!(cache.count().unwrap(), 0);
        assert_eq!(cache.lookup("one").unwrap(), None);
    }

    #[test]
    fn cache_persists_across_connections() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("fixes.db");
        {
            let mut cache = FixCache::new(&db_path).unwrap();
            cache.store("a", "original", "fixed").unwrap();
        }
        let cache = FixCache::new(&db_path).unwrap();
        assert_eq!(cache.lookup("original").unwrap().as_deref(), Some("fixed"));
    }
}
