use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::TaskPriority;

/// Durable FIFO queues, one per priority.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Append `task_id` to the tail of `queue`.
    async fn enqueue(&self, queue: TaskPriority, task_id: Uuid) -> DomainResult<()>;

    /// Claim the oldest unclaimed entry of `queue`. The entry stays in the
    /// queue until [`WorkQueue::ack`]; a claim that is never acknowledged
    /// expires and the entry is handed out again.
    async fn dequeue(&self, queue: TaskPriority) -> DomainResult<Option<Uuid>>;

    /// Remove the entry for `task_id` once its dispatch attempt is settled.
    async fn ack(&self, task_id: Uuid) -> DomainResult<()>;

    /// Entries in `queue`, claimed or not.
    async fn depth(&self, queue: TaskPriority) -> DomainResult<u64>;
}
