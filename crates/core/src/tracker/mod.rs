//! Application tracking: ports, change notification and the use-case service

pub mod changes;
pub mod ports;
pub mod service;

pub use service::TrackerService;
