//! Conversions from external infrastructure errors into domain errors.

use keyring::Error as KeyringError;
use rusqlite::Error as SqlError;
use waypoint_domain::WaypointError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub WaypointError);

impl From<InfraError> for WaypointError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<WaypointError> for InfraError {
    fn from(value: WaypointError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoWaypointError {
    fn into_waypoint(self) -> WaypointError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → WaypointError */
/* -------------------------------------------------------------------------- */

impl IntoWaypointError for SqlError {
    fn into_waypoint(self) -> WaypointError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        fn looks_like_wrong_key(message: &str) -> bool {
            let lower = message.to_ascii_lowercase();
            lower.contains("not a database") || lower.contains("encrypted")
        }

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        WaypointError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        WaypointError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        WaypointError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        WaypointError::Database("foreign key constraint violation".into())
                    }
                    (_, _) if looks_like_wrong_key(&message) => WaypointError::Security(
                        "SQLCipher key rejected or database not encrypted".into(),
                    ),
                    _ => WaypointError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => WaypointError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                WaypointError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                WaypointError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => {
                WaypointError::Database("invalid UTF-8 returned from sqlite".into())
            }
            RE::InvalidParameterName(parameter_name) => {
                WaypointError::Database(format!("invalid parameter name: {parameter_name}"))
            }
            RE::InvalidPath(path) => WaypointError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            RE::InvalidQuery => WaypointError::Database("invalid SQL query".into()),
            other => WaypointError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_waypoint())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → WaypointError */
/* -------------------------------------------------------------------------- */

impl IntoWaypointError for r2d2::Error {
    fn into_waypoint(self) -> WaypointError {
        WaypointError::Database(format!("connection pool error: {self}"))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(value.into_waypoint())
    }
}

/* -------------------------------------------------------------------------- */
/* keyring::Error → WaypointError */
/* -------------------------------------------------------------------------- */

impl IntoWaypointError for KeyringError {
    fn into_waypoint(self) -> WaypointError {
        use KeyringError::*;

        let description = self.to_string();

        match self {
            NoEntry => WaypointError::NotFound("keychain entry not found".into()),
            BadEncoding(_) => {
                WaypointError::Security("credential in keychain is not valid UTF-8".into())
            }
            TooLong(name, limit) => WaypointError::Security(format!(
                "keychain attribute '{name}' exceeds platform limit ({limit})"
            )),
            Invalid(attr, reason) => {
                WaypointError::Security(format!("keychain attribute '{attr}' is invalid: {reason}"))
            }
            Ambiguous(entries) => WaypointError::Security(format!(
                "multiple keychain entries matched request ({} results)",
                entries.len()
            )),
            PlatformFailure(err) => {
                WaypointError::Security(format!("keychain platform error: {err}"))
            }
            NoStorageAccess(err) => {
                WaypointError::Security(format!("unable to access secure storage: {err}"))
            }
            _ => WaypointError::Security(description),
        }
    }
}

impl From<KeyringError> for InfraError {
    fn from(value: KeyringError) -> Self {
        InfraError(value.into_waypoint())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
