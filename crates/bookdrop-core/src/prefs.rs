use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{
    domain::{CallerId, UserPreference},
    Result,
};

/// Durable snapshot storage for the preference table.
///
/// Injected so persistence can be swapped (file, database, in-memory) without
/// touching the store or the orchestration logic. `store` must be atomic from
/// an external reader's perspective: a reader never observes a half-written
/// snapshot.
pub trait PreferenceRepository: Send + Sync {
    fn load(&self) -> Result<HashMap<i64, UserPreference>>;
    fn store(&self, snapshot: &HashMap<i64, UserPreference>) -> Result<()>;
}

/// JSON-file repository: one document mapping caller id to preference,
/// rewritten wholesale on every flush via a temp file + rename.
pub struct JsonFileRepository {
    path: PathBuf,
    seq: AtomicU64,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seq: AtomicU64::new(0),
        }
    }
}

impl PreferenceRepository for JsonFileRepository {
    fn load(&self) -> Result<HashMap<i64, UserPreference>> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        if !self.path.exists() {
            debug!(path = %self.path.display(), "preferences file does not exist, starting fresh");
            return Ok(HashMap::new());
        }

        let data = fs::read_to_string(&self.path)?;
        let table: HashMap<i64, UserPreference> = serde_json::from_str(&data)?;
        info!(
            path = %self.path.display(),
            user_count = table.len(),
            "loaded user preferences from file"
        );
        Ok(table)
    }

    fn store(&self, snapshot: &HashMap<i64, UserPreference>) -> Result<()> {
        let data = serde_json::to_string_pretty(snapshot)?;

        // Unique temp name per flush so concurrent flushes never clobber each
        // other mid-write; the rename decides which complete snapshot wins.
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let pid = std::process::id();
        let tmp = self.path.with_extension(format!("tmp.{pid}.{seq}"));

        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;

        debug!(
            path = %self.path.display(),
            user_count = snapshot.len(),
            "saved user preferences to file"
        );
        Ok(())
    }
}

/// In-memory preference table with write-through asynchronous persistence.
///
/// Reads proceed concurrently; writers are exclusive. Each mutation schedules
/// a detached flush of the whole table; flush failures are logged and
/// swallowed, since the in-memory table stays authoritative for the process
/// lifetime.
pub struct PreferenceStore {
    table: Arc<RwLock<HashMap<i64, UserPreference>>>,
    repo: Option<Arc<dyn PreferenceRepository>>,
}

impl PreferenceStore {
    /// `repo = None` means in-memory only.
    ///
    /// If the repository holds a snapshot it seeds the table; a load failure
    /// is logged and the store starts empty (never fatal).
    pub fn new(repo: Option<Arc<dyn PreferenceRepository>>) -> Self {
        let table = match &repo {
            Some(r) => r.load().unwrap_or_else(|e| {
                warn!(error = %e, "failed to load preferences, starting empty");
                HashMap::new()
            }),
            None => {
                info!("no preference storage configured, using in-memory only");
                HashMap::new()
            }
        };

        Self {
            table: Arc::new(RwLock::new(table)),
            repo,
        }
    }

    /// Zero-value preference if the caller has never made a selection.
    pub async fn get(&self, caller: CallerId) -> UserPreference {
        self.table
            .read()
            .await
            .get(&caller.0)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn set(
        &self,
        caller: CallerId,
        library_id: i64,
        path_id: i64,
        library_name: &str,
        path_name: &str,
    ) {
        let snapshot = {
            let mut table = self.table.write().await;
            table.insert(
                caller.0,
                UserPreference {
                    library_id,
                    path_id,
                    library_name: library_name.to_string(),
                    path_name: path_name.to_string(),
                },
            );
            table.clone()
        };

        info!(
            user_id = caller.0,
            library_id,
            path_id,
            library_name,
            path_name,
            "user preference set"
        );

        self.schedule_flush(snapshot);
    }

    pub async fn clear(&self, caller: CallerId) {
        let snapshot = {
            let mut table = self.table.write().await;
            table.remove(&caller.0);
            table.clone()
        };

        info!(user_id = caller.0, "user preference cleared");

        self.schedule_flush(snapshot);
    }

    fn schedule_flush(&self, snapshot: HashMap<i64, UserPreference>) {
        let Some(repo) = self.repo.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = repo.store(&snapshot) {
                warn!(error = %e, "failed to persist preferences");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tmp_path(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}.json"))
    }

    struct FailingRepository;

    impl PreferenceRepository for FailingRepository {
        fn load(&self) -> Result<HashMap<i64, UserPreference>> {
            Err(crate::errors::Error::Config("load failure".to_string()))
        }

        fn store(&self, _snapshot: &HashMap<i64, UserPreference>) -> Result<()> {
            Err(crate::errors::Error::Config("store failure".to_string()))
        }
    }

    #[tokio::test]
    async fn absent_caller_gets_zero_value() {
        let store = PreferenceStore::new(None);
        let pref = store.get(CallerId(1)).await;
        assert_eq!(pref, UserPreference::default());
        assert!(!pref.has_library());
    }

    #[tokio::test]
    async fn set_then_get_is_idempotent() {
        let store = PreferenceStore::new(None);
        store.set(CallerId(1), 4, 7, "Books", "/library").await;

        let a = store.get(CallerId(1)).await;
        let b = store.get(CallerId(1)).await;
        assert_eq!(a, b);
        assert_eq!(a.library_id, 4);
        assert_eq!(a.path_name, "/library");
    }

    #[tokio::test]
    async fn set_overwrites_and_clear_removes() {
        let store = PreferenceStore::new(None);
        store.set(CallerId(1), 4, 7, "Books", "/a").await;
        store.set(CallerId(1), 5, 8, "Comics", "/b").await;
        assert_eq!(store.get(CallerId(1)).await.library_id, 5);

        store.clear(CallerId(1)).await;
        assert_eq!(store.get(CallerId(1)).await, UserPreference::default());
    }

    #[tokio::test]
    async fn repository_round_trip() {
        let path = tmp_path("bookdrop-prefs-roundtrip");
        let repo = JsonFileRepository::new(&path);

        let mut table = HashMap::new();
        table.insert(
            9,
            UserPreference {
                library_id: 1,
                path_id: 2,
                library_name: "L".to_string(),
                path_name: "P".to_string(),
            },
        );
        repo.store(&table).unwrap();

        let loaded = JsonFileRepository::new(&path).load().unwrap();
        assert_eq!(loaded, table);
    }

    #[tokio::test]
    async fn set_survives_process_restart() {
        let path = tmp_path("bookdrop-prefs-restart");

        {
            let store = PreferenceStore::new(Some(Arc::new(JsonFileRepository::new(&path))));
            store.set(CallerId(3), 10, 20, "Main", "/books").await;

            // The flush is detached; wait for it to land.
            let mut flushed = false;
            for _ in 0..100 {
                tokio::time::sleep(Duration::from_millis(10)).await;
                if path.exists() {
                    flushed = true;
                    break;
                }
            }
            assert!(flushed, "expected the preference flush to write the file");
        }

        let reloaded = PreferenceStore::new(Some(Arc::new(JsonFileRepository::new(&path))));
        let pref = reloaded.get(CallerId(3)).await;
        assert_eq!(pref.library_id, 10);
        assert_eq!(pref.path_id, 20);
        assert_eq!(pref.library_name, "Main");
        assert_eq!(pref.path_name, "/books");
    }

    #[tokio::test]
    async fn flush_failure_never_fails_the_mutation() {
        let store = PreferenceStore::new(Some(Arc::new(FailingRepository)));
        store.set(CallerId(1), 4, 7, "Books", "/a").await;

        // In-memory table stays authoritative even though persistence fails.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.get(CallerId(1)).await.library_id, 4);
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() {
        let path = tmp_path("bookdrop-prefs-corrupt");
        std::fs::write(&path, "not json{{").unwrap();

        let store = PreferenceStore::new(Some(Arc::new(JsonFileRepository::new(&path))));
        assert_eq!(store.get(CallerId(1)).await, UserPreference::default());
    }
}
