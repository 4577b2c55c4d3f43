//! Encrypted store bootstrap with quarantine recovery
//!
//! A database that no longer opens with the current passphrase (corrupt
//! file, rotated key, interrupted write) is moved aside to `<name>.bad` and
//! a fresh store is created in its place. Losing local data beats refusing
//! to start; the quarantined file stays on disk for manual inspection.
//!
//! Only errors carrying a known corruption signature trigger quarantine.
//! Disk-full, permission and pool errors propagate unchanged.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, instrument, warn};
use waypoint_domain::{Result, WaypointError};

use super::manager::DbManager;
use super::sqlcipher_pool::{SqlCipherPool, SqlCipherPoolConfig, StorageError};

/// Opens the encrypted store, recovering from corruption by quarantine.
///
/// Owned by the composition root; the internal mutex serializes concurrent
/// first-time opens so only one caller runs the quarantine dance.
pub struct StoreBootstrap {
    db_path: PathBuf,
    pool_config: SqlCipherPoolConfig,
    init_lock: Mutex<()>,
}

impl StoreBootstrap {
    pub fn new(db_path: impl Into<PathBuf>, pool_size: u32) -> Self {
        let pool_config =
            SqlCipherPoolConfig { max_size: pool_size.max(1), ..SqlCipherPoolConfig::default() };
        Self { db_path: db_path.into(), pool_config, init_lock: Mutex::new(()) }
    }

    /// Open the store, quarantining and recreating it on corruption.
    ///
    /// A returned manager has passed the encryption probe and carries the
    /// full schema. Re-probe failure after quarantine is fatal.
    #[instrument(skip(self, passphrase), fields(db_path = %self.db_path.display()))]
    pub fn open(&self, passphrase: &str) -> Result<Arc<DbManager>> {
        let _guard = self.init_lock.lock();

        let pool = match SqlCipherPool::new(
            &self.db_path,
            passphrase.to_string(),
            self.pool_config.clone(),
        ) {
            Ok(pool) => pool,
            Err(StorageError::WrongKeyOrNotEncrypted) => {
                warn!(
                    db_path = %self.db_path.display(),
                    "Database failed the encryption probe; quarantining and recreating"
                );
                let quarantined = quarantine_database(&self.db_path)?;
                info!(quarantined = %quarantined.display(), "Corrupt database moved aside");

                SqlCipherPool::new(&self.db_path, passphrase.to_string(), self.pool_config.clone())
                    .map_err(|err| {
                        error!(error = %err, "Store recreation failed after quarantine");
                        WaypointError::from(err)
                    })?
            }
            Err(other) => return Err(other.into()),
        };

        let manager = Arc::new(DbManager::from_pool(pool, self.db_path.clone()));
        manager.run_migrations()?;
        Ok(manager)
    }

    /// Remove the database, its sidecars and any quarantined copy.
    ///
    /// Callers must drop every handle to the old store first.
    pub fn reset(&self) -> Result<()> {
        let _guard = self.init_lock.lock();

        remove_if_exists(&self.db_path)?;
        remove_sidecars(&self.db_path)?;
        remove_if_exists(&quarantine_path(&self.db_path))?;
        info!(db_path = %self.db_path.display(), "Store files removed");
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Move the database file to `<name>.bad`, replacing any earlier quarantine.
///
/// WAL/SHM sidecars are deleted rather than quarantined; they are useless
/// without the main file and would confuse a fresh open.
pub fn quarantine_database(db_path: &Path) -> Result<PathBuf> {
    let bad_path = quarantine_path(db_path);

    remove_if_exists(&bad_path)?;
    remove_sidecars(db_path)?;

    match std::fs::rename(db_path, &bad_path) {
        Ok(()) => Ok(bad_path),
        // A missing file is fine: nothing to quarantine, the rebuild starts clean
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(bad_path),
        Err(err) => Err(WaypointError::Database(format!(
            "failed to quarantine database {}: {}",
            db_path.display(),
            err
        ))),
    }
}

fn quarantine_path(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(".bad");
    PathBuf::from(name)
}

fn remove_sidecars(db_path: &Path) -> Result<()> {
    for suffix in ["-wal", "-shm"] {
        let mut name = db_path.as_os_str().to_os_string();
        name.push(suffix);
        remove_if_exists(Path::new(&name))?;
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => {
            Err(WaypointError::Database(format!("failed to remove {}: {}", path.display(), err)))
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const TEST_KEY: &str = "test_key_64_chars_long_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    fn table_names(manager: &DbManager) -> Vec<String> {
        let conn = manager.get_connection().unwrap();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        names
    }

    #[test]
    fn open_creates_fresh_store_with_schema() {
        let temp_dir = TempDir::new().unwrap();
        let bootstrap = StoreBootstrap::new(temp_dir.path().join("waypoint.db"), 4);

        let manager = bootstrap.open(TEST_KEY).unwrap();

        let tables = table_names(&manager);
        assert!(tables.contains(&"applications".to_string()));
        assert!(tables.contains(&"milestones".to_string()));
        assert!(tables.contains(&"reminders".to_string()));
    }

    #[test]
    fn garbage_file_is_quarantined_and_store_recreated() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("waypoint.db");
        std::fs::write(&db_path, b"this is not a database at all").unwrap();

        let bootstrap = StoreBootstrap::new(&db_path, 4);
        let manager = bootstrap.open(TEST_KEY).unwrap();

        let bad_path = temp_dir.path().join("waypoint.db.bad");
        assert!(bad_path.exists(), "corrupt file should be moved to .bad");
        assert_eq!(
            std::fs::read(&bad_path).unwrap(),
            b"this is not a database at all".to_vec()
        );

        // The fresh store is usable read/write
        let conn = manager.get_connection().unwrap();
        conn.execute(
            "INSERT INTO applications (id, company_name, role_title, applied_date, status,
                is_archived, notifications_enabled, created_at, updated_at)
             VALUES ('a1', 'Acme', 'Engineer', 1, 'APPLIED', 0, 1, 1, 1)",
            [],
        )
        .unwrap();
    }

    #[test]
    fn wrong_key_quarantines_previous_store() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("waypoint.db");

        {
            let bootstrap = StoreBootstrap::new(&db_path, 2);
            let manager = bootstrap.open(TEST_KEY).unwrap();
            let conn = manager.get_connection().unwrap();
            conn.execute("CREATE TABLE legacy_marker (id INTEGER)", []).unwrap();
        }

        let bootstrap = StoreBootstrap::new(&db_path, 2);
        let manager = bootstrap
            .open("different_key_64_chars_long_bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")
            .unwrap();

        assert!(temp_dir.path().join("waypoint.db.bad").exists());
        let tables = table_names(&manager);
        assert!(!tables.contains(&"legacy_marker".to_string()), "old data is gone");
        assert!(tables.contains(&"applications".to_string()));
    }

    #[test]
    fn second_quarantine_replaces_the_first() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("waypoint.db");
        let bad_path = temp_dir.path().join("waypoint.db.bad");

        std::fs::write(&db_path, b"garbage one").unwrap();
        let bootstrap = StoreBootstrap::new(&db_path, 2);
        drop(bootstrap.open(TEST_KEY).unwrap());
        assert_eq!(std::fs::read(&bad_path).unwrap(), b"garbage one".to_vec());

        std::fs::write(&db_path, b"garbage two").unwrap();
        drop(bootstrap.open(TEST_KEY).unwrap());
        assert_eq!(std::fs::read(&bad_path).unwrap(), b"garbage two".to_vec());
    }

    #[test]
    fn reset_removes_store_and_quarantine() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("waypoint.db");

        std::fs::write(&db_path, b"junk").unwrap();
        let bootstrap = StoreBootstrap::new(&db_path, 2);
        drop(bootstrap.open(TEST_KEY).unwrap());

        bootstrap.reset().unwrap();
        assert!(!db_path.exists());
        assert!(!temp_dir.path().join("waypoint.db.bad").exists());
    }
}
