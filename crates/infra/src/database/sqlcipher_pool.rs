//! SQLCipher connection pool
//!
//! r2d2-based pooling for the encrypted store. Every connection gets the
//! SQLCipher key pragmas applied before any statement runs, then the shared
//! connection pragmas (WAL, foreign keys, busy timeout). Pool construction
//! probes the database eagerly so a wrong key or a corrupt file surfaces
//! here instead of on the first query.

use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::{debug, error, info, instrument, warn};

use waypoint_domain::WaypointError;

/// Errors raised while opening or using the encrypted store.
///
/// `WrongKeyOrNotEncrypted` is the corruption signature the recovery path
/// keys off; everything else propagates unchanged.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database key rejected or file is not an encrypted database")]
    WrongKeyOrNotEncrypted,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("encryption setup error: {0}")]
    Encryption(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

impl From<StorageError> for WaypointError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::WrongKeyOrNotEncrypted => {
                WaypointError::Security("SQLCipher key rejected or database corrupted".into())
            }
            other => WaypointError::Database(other.to_string()),
        }
    }
}

/// SQLCipher pool configuration
#[derive(Debug, Clone)]
pub struct SqlCipherPoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,

    /// Connection timeout
    pub connection_timeout: Duration,

    /// Busy timeout for SQLite operations
    pub busy_timeout: Duration,

    /// Enable WAL journal mode
    pub enable_wal: bool,

    /// Enable foreign key constraints
    pub enable_foreign_keys: bool,
}

impl Default for SqlCipherPoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10,
            connection_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_millis(5000),
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

/// SQLCipher key configuration applied to every new connection
#[derive(Clone)]
pub struct SqlCipherConfig {
    /// Encryption passphrase (hex text, fed through the SQLCipher KDF)
    pub key: String,

    /// Cipher compatibility version (4 for SQLCipher 4.x)
    pub cipher_compatibility: i32,

    /// KDF iterations for key derivation
    pub kdf_iter: i32,

    /// Enable cipher memory security
    pub cipher_memory_security: bool,
}

// Custom Debug impl to avoid exposing the key
impl std::fmt::Debug for SqlCipherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlCipherConfig")
            .field("key", &"***")
            .field("cipher_compatibility", &self.cipher_compatibility)
            .field("kdf_iter", &self.kdf_iter)
            .field("cipher_memory_security", &self.cipher_memory_security)
            .finish()
    }
}

impl SqlCipherConfig {
    pub fn new(key: String) -> Self {
        Self { key, cipher_compatibility: 4, kdf_iter: 256_000, cipher_memory_security: true }
    }
}

/// Connection pool over an encrypted SQLite database
#[derive(Debug)]
pub struct SqlCipherPool {
    pool: Pool<SqliteConnectionManager>,
    config: SqlCipherPoolConfig,
}

impl SqlCipherPool {
    /// Create a pool and verify the database opens with the given key.
    ///
    /// A probe connection runs `PRAGMA user_version` and reads
    /// `sqlite_master` so that key mismatches and corrupt files fail pool
    /// construction instead of the first repository call.
    #[instrument(skip(encryption_key), fields(db_path = ?path, pool_size = config.max_size))]
    pub fn new(
        path: &Path,
        encryption_key: String,
        config: SqlCipherPoolConfig,
    ) -> StorageResult<Self> {
        info!("Creating SQLCipher connection pool");

        let cipher_config = SqlCipherConfig::new(encryption_key);
        let pool_config = config.clone();

        let manager = SqliteConnectionManager::file(path).with_init(move |conn| {
            configure_sqlcipher(conn, &cipher_config)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

            apply_connection_pragmas(conn, &pool_config)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

            Ok(())
        });

        let pool = Pool::builder()
            .max_size(config.max_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .map_err(|e| {
                warn!("Failed to create connection pool: {}", e);
                classify_open_error(&e.to_string(), || {
                    StorageError::Connection(format!("Failed to create pool: {}", e))
                })
            })?;

        {
            let conn = pool.get().map_err(|e| {
                warn!("Failed to get probe connection: {}", e);
                classify_open_error(&e.to_string(), || {
                    StorageError::Connection(format!("Failed to get probe connection: {}", e))
                })
            })?;

            verify_encryption(&conn)?;
            debug!("Encryption verified successfully");
        }

        info!("SQLCipher pool created successfully with {} connections", config.max_size);

        Ok(Self { pool, config })
    }

    /// Get a connection from the pool.
    pub fn get(&self) -> StorageResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            let err_str = e.to_string().to_lowercase();
            if err_str.contains("timeout") {
                warn!("Connection timeout after {:?}", self.config.connection_timeout);
            } else {
                warn!("Connection error: {}", e);
            }
            StorageError::Connection(format!("Failed to get connection: {}", e))
        })
    }

    /// Pool health: can a connection be acquired and answer a query.
    pub fn health_check(&self) -> StorageResult<()> {
        let conn = self.get()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i32>(0))
            .map_err(|e| StorageError::Query(format!("health check failed: {}", e)))?;
        Ok(())
    }

    pub fn max_size(&self) -> u32 {
        self.config.max_size
    }
}

/// Apply SQLCipher key pragmas to a fresh connection.
///
/// Must run before any other statement; the key pragma is a no-op once the
/// database has been read.
pub fn configure_sqlcipher(conn: &Connection, config: &SqlCipherConfig) -> StorageResult<()> {
    let result = conn.pragma_update(None, "key", &config.key).map_err(|e| {
        if is_corruption_signature(&e.to_string()) {
            StorageError::WrongKeyOrNotEncrypted
        } else {
            StorageError::Encryption(format!("Failed to set encryption key: {}", e))
        }
    });

    if let Err(ref e) = result {
        error!(error = %e, "SQLCipher key setup failed");
        return result;
    }

    conn.pragma_update(None, "cipher_compatibility", config.cipher_compatibility).map_err(|e| {
        error!(error = %e, "Failed to set cipher_compatibility");
        StorageError::Encryption(format!("Failed to set cipher_compatibility: {}", e))
    })?;

    conn.pragma_update(None, "kdf_iter", config.kdf_iter).map_err(|e| {
        error!(error = %e, "Failed to set kdf_iter");
        StorageError::Encryption(format!("Failed to set kdf_iter: {}", e))
    })?;

    let memory_security = if config.cipher_memory_security { "ON" } else { "OFF" };
    conn.pragma_update(None, "cipher_memory_security", memory_security).map_err(|e| {
        error!(error = %e, "Failed to set cipher_memory_security");
        StorageError::Encryption(format!("Failed to set cipher_memory_security: {}", e))
    })?;

    Ok(())
}

/// Apply connection-level pragmas shared by every pooled connection.
pub fn apply_connection_pragmas(
    conn: &Connection,
    config: &SqlCipherPoolConfig,
) -> StorageResult<()> {
    let mut pragma_sql = String::new();

    if config.enable_wal {
        pragma_sql.push_str("PRAGMA journal_mode=WAL;\n");
        pragma_sql.push_str("PRAGMA wal_autocheckpoint=1000;\n");
    }

    pragma_sql.push_str("PRAGMA synchronous=NORMAL;\n");

    if config.enable_foreign_keys {
        pragma_sql.push_str("PRAGMA foreign_keys=ON;\n");
    }

    conn.execute_batch(&pragma_sql)
        .map_err(|e| StorageError::Query(format!("Failed to apply pragmas: {}", e)))?;

    conn.busy_timeout(config.busy_timeout)
        .map_err(|e| StorageError::Query(format!("Failed to set busy timeout: {}", e)))?;

    Ok(())
}

/// Verify that the key opens the database.
///
/// `PRAGMA user_version` decrypts the header; reading `sqlite_master`
/// forces decryption of actual pages. A wrong key and a corrupt file are
/// indistinguishable here, which is exactly what the recovery path wants.
pub fn verify_encryption(conn: &Connection) -> StorageResult<()> {
    let result = conn
        .query_row("PRAGMA user_version", [], |_| Ok::<(), rusqlite::Error>(()))
        .and_then(|_| conn.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(())))
        .map_err(|e| {
            if is_wrong_key_error(&e) {
                StorageError::WrongKeyOrNotEncrypted
            } else {
                StorageError::Query(format!("encryption probe failed: {}", e))
            }
        });

    match &result {
        Ok(_) => {
            debug!("Encryption verification successful");
        }
        Err(e) => {
            error!(error = %e, "Encryption verification failed");
        }
    }

    result
}

fn is_wrong_key_error(err: &rusqlite::Error) -> bool {
    if let rusqlite::Error::SqliteFailure(ffi_err, _) = err {
        // SQLITE_NOTADB
        if ffi_err.extended_code == 26 {
            return true;
        }
    }
    is_corruption_signature(&err.to_string())
}

fn is_corruption_signature(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("file is not a database")
        || lower.contains("file is encrypted")
        || lower.contains("database disk image is malformed")
        || lower.contains("notadb")
}

fn classify_open_error(message: &str, fallback: impl FnOnce() -> StorageError) -> StorageError {
    if is_corruption_signature(message) {
        StorageError::WrongKeyOrNotEncrypted
    } else {
        fallback()
    }
}
