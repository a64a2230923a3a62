//! GitLab REST adapter.

pub mod client;

pub use client::GitLabClient;
