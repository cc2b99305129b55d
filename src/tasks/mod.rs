//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the cache is live.
//!
//! # Tasks
//! - Maintenance: sweeps expired entries and reconciles the tag index

mod maintenance;

pub use maintenance::{run_maintenance, spawn_maintenance_task, MaintenanceReport};
