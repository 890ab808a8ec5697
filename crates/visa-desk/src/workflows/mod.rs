//! Scheduling and case-folder workflows for visa applications.

pub mod casework;
pub mod directory;
pub mod memory;
pub mod persistence;
pub mod scheduling;

pub use memory::InMemoryStore;
pub use persistence::{Constraint, RepositoryError};
