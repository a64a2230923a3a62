//! Host resource probe backed by procfs, statvfs and an HTTP health endpoint.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::domain::models::AlertsConfig;
use crate::domain::ports::HostProbe;

/// Reads host metrics for the infrastructure alert rules.
pub struct SystemProbe {
    http: Client,
    health_url: Option<String>,
    disk_path: PathBuf,
    proc_root: PathBuf,
}

impl SystemProbe {
    /// Probe configured from the alert settings.
    pub fn new(config: &AlertsConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();

        Self {
            http,
            health_url: config.health_url.clone().filter(|u| !u.is_empty()),
            disk_path: PathBuf::from(&config.disk_path),
            proc_root: PathBuf::from("/proc"),
        }
    }

    /// Read procfs files from `root` instead of `/proc`.
    pub fn with_proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc_root = root.into();
        self
    }

    async fn read_proc(&self, name: &str) -> Option<String> {
        tokio::fs::read_to_string(self.proc_root.join(name)).await.ok()
    }
}

/// One-minute load average as a share of available CPUs, capped at 100.
pub fn cpu_percent_from_loadavg(loadavg: &str, cpus: usize) -> Option<f64> {
    let one_minute: f64 = loadavg.split_whitespace().next()?.parse().ok()?;
    let cpus = cpus.max(1) as f64;
    Some((one_minute / cpus * 100.0).min(100.0))
}

/// Used memory share from `/proc/meminfo`, rounded to one decimal.
pub fn memory_percent_from_meminfo(meminfo: &str) -> Option<f64> {
    let field = |name: &str| -> Option<u64> {
        meminfo
            .lines()
            .find_map(|line| line.strip_prefix(name))
            .and_then(|rest| rest.trim_start_matches(':').split_whitespace().next())
            .and_then(|v| v.parse().ok())
    };

    let total = field("MemTotal")?;
    let available = field("MemAvailable")?;
    if total == 0 {
        return None;
    }

    let used = (1.0 - available as f64 / total as f64) * 100.0;
    Some((used * 10.0).round() / 10.0)
}

#[async_trait]
impl HostProbe for SystemProbe {
    async fn cpu_percent(&self) -> Option<f64> {
        let loadavg = self.read_proc("loadavg").await?;
        let cpus = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        cpu_percent_from_loadavg(&loadavg, cpus)
    }

    async fn memory_percent(&self) -> Option<f64> {
        memory_percent_from_meminfo(&self.read_proc("meminfo").await?)
    }

    async fn disk_percent(&self) -> Option<f64> {
        let path = self.disk_path.clone();
        let stat = tokio::task::spawn_blocking(move || nix::sys::statvfs::statvfs(&path))
            .await
            .ok()?
            .ok()?;

        #[allow(clippy::unnecessary_cast)]
        let total = stat.blocks() as f64 * stat.fragment_size() as f64;
        #[allow(clippy::unnecessary_cast)]
        let free = stat.blocks_available() as f64 * stat.fragment_size() as f64;
        if total <= 0.0 {
            return None;
        }
        Some(((total - free) / total * 1000.0).round() / 10.0)
    }

    async fn container_healthy(&self) -> Option<bool> {
        let url = self.health_url.as_ref()?;

        let healthy = match self.http.get(url).send().await {
            Ok(response) if response.status().is_success() => response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| body.get("status").and_then(Value::as_str).map(|s| s == "healthy"))
                .unwrap_or(false),
            Ok(_) => false,
            Err(e) => {
                tracing::debug!(error = %e, "health endpoint unreachable");
                false
            }
        };
        Some(healthy)
    }
}
