//! Host probe with settable readings.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::ports::HostProbe;

/// Fixed host metrics returned by the mock.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HostReadings {
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub disk_percent: Option<f64>,
    pub container_healthy: Option<bool>,
}

/// Host metrics source returning canned readings.
#[derive(Default)]
pub struct MockHostProbe {
    readings: Mutex<HostReadings>,
}

impl MockHostProbe {
    /// Probe returning `readings`.
    pub fn new(readings: HostReadings) -> Self {
        Self {
            readings: Mutex::new(readings),
        }
    }

    /// Replace the readings returned from now on.
    pub async fn set(&self, readings: HostReadings) {
        *self.readings.lock().await = readings;
    }
}

#[async_trait]
impl HostProbe for MockHostProbe {
    async fn cpu_percent(&self) -> Option<f64> {
        self.readings.lock().await.cpu_percent
    }

    async fn memory_percent(&self) -> Option<f64> {
        self.readings.lock().await.memory_percent
    }

    async fn disk_percent(&self) -> Option<f64> {
        self.readings.lock().await.disk_percent
    }

    async fn container_healthy(&self) -> Option<bool> {
        self.readings.lock().await.container_healthy
    }
}
