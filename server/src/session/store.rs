use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::db::DbPool;

/// Errors crossing the blocking-storage boundary.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Durable scalar store for session counters: one row per session,
/// keyed by the session identifier. Reads-your-writes within one actor
/// is guaranteed by the shared connection.
#[derive(Clone)]
pub struct CounterStore {
    db: DbPool,
}

impl CounterStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Read the persisted counter for a session. None if never persisted.
    pub async fn load(&self, session_id: &str) -> Result<Option<u64>, StoreError> {
        let db = self.db.clone();
        let session_id = session_id.to_string();

        let value = tokio::task::spawn_blocking(move || -> Result<Option<i64>, StoreError> {
            let conn = db.lock().map_err(|_| "DB lock poisoned")?;
            let row = conn
                .query_row(
                    "SELECT counter FROM session_counters WHERE session_id = ?1",
                    rusqlite::params![session_id],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?;
            Ok(row)
        })
        .await??;

        Ok(value.map(|v| v as u64))
    }

    /// Durably write the counter for a session (upsert).
    pub async fn save(&self, session_id: &str, value: u64) -> Result<(), StoreError> {
        let db = self.db.clone();
        let session_id = session_id.to_string();

        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let conn = db.lock().map_err(|_| "DB lock poisoned")?;
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO session_counters (session_id, counter, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(session_id) DO UPDATE SET
                     counter = excluded.counter,
                     updated_at = excluded.updated_at",
                rusqlite::params![session_id, value as i64, now],
            )?;
            Ok(())
        })
        .await??;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (CounterStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = crate::db::init_db(dir.path().to_str().unwrap()).expect("init db");
        (CounterStore::new(db), dir)
    }

    #[tokio::test]
    async fn load_missing_session_is_none() {
        let (store, _dir) = test_store();
        assert_eq!(store.load("never-seen").await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let (store, _dir) = test_store();
        store.save("s1", 7).await.unwrap();
        assert_eq!(store.load("s1").await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn save_overwrites_previous_value() {
        let (store, _dir) = test_store();
        store.save("s1", 1).await.unwrap();
        store.save("s1", 2).await.unwrap();
        assert_eq!(store.load("s1").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn sessions_are_partitioned_by_identifier() {
        let (store, _dir) = test_store();
        store.save("a", 10).await.unwrap();
        store.save("b", 20).await.unwrap();
        assert_eq!(store.load("a").await.unwrap(), Some(10));
        assert_eq!(store.load("b").await.unwrap(), Some(20));
    }
}
