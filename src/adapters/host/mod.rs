//! Host metrics adapter.

pub mod probe;

pub use probe::SystemProbe;
