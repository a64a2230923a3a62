//! Notification adapters.

pub mod team_chat;

pub use team_chat::{ChatPlatform, TeamChatNotifier};
