//! Review strategy selection from changed file paths.

use std::path::Path;
use std::sync::LazyLock;

use regex::{Regex, RegexSet};

use crate::domain::models::{ReviewStrategy, TaskType};

const FRONTEND_EXTENSIONS: &[&str] = &["vue", "tsx", "ts", "jsx", "js", "css", "scss", "sass", "less"];
const BACKEND_EXTENSIONS: &[&str] = &["php"];

static SECURITY_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"\.env",
        r"auth/",
        r"middleware/",
        r"(?i)password",
        r"(?i)secret",
        r"(?i)token",
        r"config/auth\.php$",
        r"config/sanctum\.php$",
        r"config/cors\.php$",
        r"config/session\.php$",
        r"\.htaccess$",
        r"docker-compose.*\.yml$",
        r"Dockerfile",
    ])
    .expect("valid security patterns")
});

static MIGRATION_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"database/migrations/").expect("valid regex"));

/// Picks the review strategy from the files a merge request touches.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyResolver;

impl StrategyResolver {
    /// Strategy fixed by the task type, bypassing file detection.
    pub fn for_task_type(task_type: TaskType) -> Option<ReviewStrategy> {
        match task_type {
            TaskType::SecurityAudit => Some(ReviewStrategy::SecurityAudit),
            TaskType::UiAdjustment => Some(ReviewStrategy::FrontendReview),
            TaskType::IssueDiscussion | TaskType::DeepAnalysis | TaskType::FeatureDev => {
                Some(ReviewStrategy::BackendReview)
            }
            TaskType::CodeReview | TaskType::PrdCreation => None,
        }
    }

    /// Pick a strategy from the merge request's changed paths.
    ///
    /// Security-sensitive paths override everything else.
    pub fn resolve<S: AsRef<str>>(paths: &[S]) -> ReviewStrategy {
        if paths.is_empty() {
            return ReviewStrategy::BackendReview;
        }

        if paths.iter().any(|p| SECURITY_PATTERNS.is_match(p.as_ref())) {
            return ReviewStrategy::SecurityAudit;
        }

        let mut frontend = false;
        let mut backend = false;
        for path in paths.iter().map(AsRef::as_ref) {
            let extension = Path::new(path)
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_lowercase)
                .unwrap_or_default();

            frontend |= FRONTEND_EXTENSIONS.contains(&extension.as_str());
            backend |= BACKEND_EXTENSIONS.contains(&extension.as_str()) || MIGRATION_PATH.is_match(path);

            if frontend && backend {
                return ReviewStrategy::MixedReview;
            }
        }

        if frontend {
            ReviewStrategy::FrontendReview
        } else {
            ReviewStrategy::BackendReview
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_changes_default_to_backend() {
        assert_eq!(StrategyResolver::resolve::<&str>(&[]), ReviewStrategy::BackendReview);
    }

    #[test]
    fn test_extension_based_selection() {
        assert_eq!(
            StrategyResolver::resolve(&["src/App.vue", "src/style.scss"]),
            ReviewStrategy::FrontendReview
        );
        assert_eq!(StrategyResolver::resolve(&["app/Models/User.php"]), ReviewStrategy::BackendReview);
        assert_eq!(
            StrategyResolver::resolve(&["app/Models/User.php", "src/App.vue"]),
            ReviewStrategy::MixedReview
        );
        assert_eq!(
            StrategyResolver::resolve(&["database/migrations/2024_create_users.sql", "src/main.ts"]),
            ReviewStrategy::MixedReview
        );
        assert_eq!(StrategyResolver::resolve(&["README.md"]), ReviewStrategy::BackendReview);
    }

    #[test]
    fn test_security_paths_override() {
        for path in [
            ".env.example",
            "app/http/middleware/x.php",
            "app/auth/Guard.php",
            "src/PasswordReset.vue",
            "config/session.php",
            "docker-compose.prod.yml",
            "Dockerfile",
            "public/.htaccess",
        ] {
            assert_eq!(
                StrategyResolver::resolve(&[path, "src/App.vue"]),
                ReviewStrategy::SecurityAudit,
                "{path}"
            );
        }
    }

    #[test]
    fn test_fixed_task_types() {
        assert_eq!(StrategyResolver::for_task_type(TaskType::SecurityAudit), Some(ReviewStrategy::SecurityAudit));
        assert_eq!(StrategyResolver::for_task_type(TaskType::UiAdjustment), Some(ReviewStrategy::FrontendReview));
        assert_eq!(StrategyResolver::for_task_type(TaskType::FeatureDev), Some(ReviewStrategy::BackendReview));
        assert_eq!(StrategyResolver::for_task_type(TaskType::CodeReview), None);
    }
}
