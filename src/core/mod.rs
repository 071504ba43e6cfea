//! Runtime plumbing around the sensor registry

mod update_manager;

pub use update_manager::UpdateManager;
