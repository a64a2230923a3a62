//! Infrastructure adapters for external systems.

pub mod gitlab;
pub mod host;
pub mod http;
pub mod mock;
pub mod notify;
pub mod sqlite;
