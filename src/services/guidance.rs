//! Review guidance assembled from a project's stored hints.

use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{GuidanceConfig, GuidanceEntry, GuidanceKind};
use crate::domain::ports::GuidanceRepository;

/// Assembles the per-project guidance passed to review runners.
pub struct GuidanceService {
    repository: Arc<dyn GuidanceRepository>,
    config: GuidanceConfig,
}

impl GuidanceService {
    /// Service reading entries from `repository`.
    pub fn new(repository: Arc<dyn GuidanceRepository>, config: GuidanceConfig) -> Self {
        Self { repository, config }
    }

    /// Bullet list of review patterns followed by health signals.
    ///
    /// Each section keeps to `max_words`; an empty string means nothing
    /// to inject.
    pub async fn build_review_guidance(&self, project_id: i64) -> DomainResult<String> {
        if !self.config.enabled {
            return Ok(String::new());
        }

        let entries = self.repository.list_active(project_id).await?;
        let sections = [GuidanceKind::ReviewPattern, GuidanceKind::HealthSignal]
            .map(|kind| build_section(entries.iter().filter(|e| e.kind == kind), self.config.max_words));

        Ok(sections.into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join("\n"))
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn build_section<'a>(entries: impl Iterator<Item = &'a GuidanceEntry>, max_words: usize) -> String {
    let mut lines = Vec::new();
    let mut used = 0;

    for entry in entries {
        let content = entry.content.trim();
        if content.is_empty() {
            continue;
        }

        let line = format!("- {content}");
        let words = word_count(&line);
        if used + words > max_words {
            break;
        }
        used += words;
        lines.push(line);
    }

    lines.join("\n")
}
