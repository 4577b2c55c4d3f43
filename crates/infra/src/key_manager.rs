//! Encryption key management using the system keyring
//!
//! The database passphrase is 32 random bytes generated once, sealed with
//! AES-256-GCM under a master key held in the OS keychain, and stored next
//! to the database. Unsealing the same blob on every start keeps the
//! effective database key stable across restarts. Any unseal failure is
//! treated as first use: a fresh passphrase is sealed in place, which
//! changes the database key and hands the old store to recovery.

use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use keyring::Entry;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use waypoint_domain::{Result, WaypointError};

use crate::errors::InfraError;

const SERVICE_NAME: &str = "com.waypoint.app";
const KEY_NAME: &str = "master_encryption_key";
const PASSPHRASE_FILE: &str = "waypoint.keys";
const NONCE_LEN: usize = 12;

/// Sealed passphrase as persisted on disk
#[derive(Serialize, Deserialize)]
struct SealedPassphrase {
    ciphertext: String,
    nonce: String,
}

/// Manages the database passphrase using the system keyring
pub struct KeyManager {
    data_dir: PathBuf,
}

impl KeyManager {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    /// Get or create the database passphrase, hex-encoded for SQLCipher.
    ///
    /// Deterministic across restarts as long as the keychain entry and the
    /// sealed file survive; otherwise a new passphrase is minted here.
    pub fn get_or_create_passphrase(&self) -> Result<String> {
        let master = self.get_or_create_master_key()?;
        let passphrase = self.get_or_create_from_master(&master)?;
        Ok(hex::encode(passphrase))
    }

    /// Delete the sealed passphrase and the keychain master key (use with
    /// caution: the database becomes unreadable!)
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(self.passphrase_path()) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(WaypointError::Security(format!(
                    "Failed to remove sealed passphrase: {err}"
                )))
            }
        }

        let entry = Entry::new(SERVICE_NAME, KEY_NAME).map_err(map_keyring_error)?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(map_keyring_error(err)),
        }
    }

    /// Unseal the stored passphrase under the given master key, minting and
    /// sealing a fresh one on any failure.
    pub(crate) fn get_or_create_from_master(&self, master: &[u8; 32]) -> Result<[u8; 32]> {
        let path = self.passphrase_path();

        if let Some(passphrase) = self.try_unseal(&path, master) {
            debug!(fingerprint = %fingerprint(&passphrase), "Unsealed stored database passphrase");
            return Ok(passphrase);
        }

        let passphrase = random_bytes();
        let sealed = seal(master, &passphrase)?;
        let json = serde_json::to_string(&sealed)
            .map_err(|err| WaypointError::Serialization(err.to_string()))?;
        std::fs::write(&path, json).map_err(|err| {
            WaypointError::Security(format!("Failed to persist sealed passphrase: {err}"))
        })?;

        debug!(fingerprint = %fingerprint(&passphrase), "Sealed new database passphrase");
        Ok(passphrase)
    }

    fn try_unseal(&self, path: &Path, master: &[u8; 32]) -> Option<[u8; 32]> {
        let raw = std::fs::read_to_string(path).ok()?;
        let sealed: SealedPassphrase = match serde_json::from_str(&raw) {
            Ok(sealed) => sealed,
            Err(err) => {
                warn!(error = %err, "Sealed passphrase file is unreadable; treating as first use");
                return None;
            }
        };
        match unseal(master, &sealed) {
            Ok(passphrase) => Some(passphrase),
            Err(err) => {
                warn!(error = %err, "Could not unseal stored passphrase; treating as first use");
                None
            }
        }
    }

    fn get_or_create_master_key(&self) -> Result<[u8; 32]> {
        let entry = Entry::new(SERVICE_NAME, KEY_NAME).map_err(map_keyring_error)?;

        match entry.get_password() {
            Ok(stored) => match decode_master(&stored) {
                Some(master) => Ok(master),
                None => {
                    warn!("Keychain master key is unreadable; generating a new one");
                    store_new_master(&entry)
                }
            },
            Err(keyring::Error::NoEntry) => store_new_master(&entry),
            Err(err) => Err(map_keyring_error(err)),
        }
    }

    fn passphrase_path(&self) -> PathBuf {
        self.data_dir.join(PASSPHRASE_FILE)
    }
}

fn store_new_master(entry: &Entry) -> Result<[u8; 32]> {
    let master = random_bytes();
    entry.set_password(&hex::encode(master)).map_err(map_keyring_error)?;
    Ok(master)
}

fn decode_master(stored: &str) -> Option<[u8; 32]> {
    let bytes = hex::decode(stored.trim()).ok()?;
    bytes.try_into().ok()
}

fn seal(master: &[u8; 32], passphrase: &[u8; 32]) -> Result<SealedPassphrase> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(master));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, passphrase.as_slice())
        .map_err(|_| WaypointError::Security("Passphrase encryption failed".into()))?;

    Ok(SealedPassphrase {
        ciphertext: BASE64.encode(ciphertext),
        nonce: BASE64.encode(nonce),
    })
}

fn unseal(master: &[u8; 32], sealed: &SealedPassphrase) -> Result<[u8; 32]> {
    let ciphertext = BASE64
        .decode(&sealed.ciphertext)
        .map_err(|_| WaypointError::Security("Sealed passphrase is not valid base64".into()))?;
    let nonce_bytes = BASE64
        .decode(&sealed.nonce)
        .map_err(|_| WaypointError::Security("Sealed nonce is not valid base64".into()))?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(WaypointError::Security("Sealed nonce has the wrong length".into()));
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(master));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
        .map_err(|_| WaypointError::Security("Passphrase decryption failed".into()))?;

    plaintext
        .try_into()
        .map_err(|_| WaypointError::Security("Sealed passphrase has the wrong length".into()))
}

fn random_bytes() -> [u8; 32] {
    let mut rng = rand::thread_rng();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    bytes
}

/// Short digest for correlating key material in debug logs without
/// exposing it
fn fingerprint(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..4])
}

fn map_keyring_error(err: keyring::Error) -> WaypointError {
    WaypointError::from(InfraError::from(err))
}
