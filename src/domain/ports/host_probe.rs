use async_trait::async_trait;

/// Host resource readings used by infrastructure alerts.
///
/// Every reading is optional: `None` means the value could not be
/// measured and the corresponding check leaves its alert untouched.
#[async_trait]
pub trait HostProbe: Send + Sync {
    /// Load average relative to CPU count, 0-100
    async fn cpu_percent(&self) -> Option<f64>;

    /// Used memory, 0-100
    async fn memory_percent(&self) -> Option<f64>;

    /// Used space on the data volume, 0-100
    async fn disk_percent(&self) -> Option<f64>;

    /// Result of the container health endpoint
    async fn container_healthy(&self) -> Option<bool>;
}
