//! Domain layer for the Mergeward dispatch engine
//!
//! This module contains core business logic, domain models and the ports
//! implemented by adapters.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
