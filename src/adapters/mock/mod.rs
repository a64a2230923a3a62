//! In-memory adapters for the outbound ports, used by tests.

pub mod gitlab;
pub mod host;
pub mod notifier;

pub use gitlab::{MockGitLab, NoteTarget, RecordedIssue, RecordedNote, RecordedTrigger};
pub use host::{HostReadings, MockHostProbe};
pub use notifier::{MockNotifier, SentNotification};
