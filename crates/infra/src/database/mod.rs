//! Database implementations

pub mod application_repository;
pub mod manager;
pub mod milestone_repository;
pub mod recovery;
pub mod reminder_repository;
pub mod sqlcipher_pool;

pub use application_repository::*;
pub use manager::*;
pub use milestone_repository::*;
pub use recovery::*;
pub use reminder_repository::*;
pub use sqlcipher_pool::*;
