//! Per-repository overrides read from `.mergeward.yml`.
//!
//! Reading is best-effort: a missing, unreadable or malformed file yields an
//! empty override set.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::domain::ports::GitLabApi;

/// Repository file holding the overrides.
pub const REPO_CONFIG_PATH: &str = ".mergeward.yml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettingKind {
    Text,
    Integer,
    Boolean,
}

/// Keys a repository may override and their expected value kinds.
const SETTING_KEYS: &[(&str, SettingKind)] = &[
    ("ai_model", SettingKind::Text),
    ("ai_language", SettingKind::Text),
    ("timeout_minutes", SettingKind::Integer),
    ("max_tokens", SettingKind::Integer),
    ("code_review.auto_review", SettingKind::Boolean),
    ("code_review.auto_review_on_push", SettingKind::Boolean),
    ("code_review.severity_threshold", SettingKind::Text),
    ("feature_dev.enabled", SettingKind::Boolean),
    ("feature_dev.branch_prefix", SettingKind::Text),
    ("feature_dev.auto_create_mr", SettingKind::Boolean),
    ("ui_adjustment.dev_server_command", SettingKind::Text),
    ("ui_adjustment.screenshot_base_url", SettingKind::Text),
    ("ui_adjustment.screenshot_wait_ms", SettingKind::Integer),
    ("labels.auto_label", SettingKind::Boolean),
    ("labels.risk_labels", SettingKind::Boolean),
];

/// `general` section keys and the flat key each maps to.
const GENERAL_KEYS: &[(&str, &str)] = &[
    ("model", "ai_model"),
    ("language", "ai_language"),
    ("timeout_minutes", "timeout_minutes"),
    ("max_tokens", "max_tokens"),
];

fn accepts(key: &str, value: &Value) -> bool {
    SETTING_KEYS.iter().any(|(k, kind)| {
        *k == key
            && match kind {
                SettingKind::Text => value.is_string(),
                SettingKind::Integer => value.is_i64() || value.is_u64(),
                SettingKind::Boolean => value.is_boolean(),
            }
    })
}

/// Flatten YAML sections into allow-listed `section.key` overrides.
///
/// Unknown keys and values of the wrong kind are dropped.
pub fn parse_repo_config(content: &str) -> Result<BTreeMap<String, Value>, serde_yaml::Error> {
    let parsed: serde_yaml::Value = serde_yaml::from_str(content)?;
    let parsed: Value = serde_json::to_value(parsed).map_err(<serde_yaml::Error as serde::de::Error>::custom)?;

    let mut overrides = BTreeMap::new();
    let Some(sections) = parsed.as_object() else {
        return Ok(overrides);
    };

    for (section, values) in sections {
        let Some(values) = values.as_object() else {
            continue;
        };

        for (key, value) in values {
            let flat = if section == "general" {
                match GENERAL_KEYS.iter().find(|(k, _)| k == key) {
                    Some((_, mapped)) => (*mapped).to_string(),
                    None => continue,
                }
            } else {
                format!("{section}.{key}")
            };

            if accepts(&flat, value) {
                overrides.insert(flat, value.clone());
            }
        }
    }

    Ok(overrides)
}

/// Reads repository overrides through the GitLab files API.
pub struct RepoConfigReader {
    gitlab: Arc<dyn GitLabApi>,
}

impl RepoConfigReader {
    /// Reader fetching files through `gitlab`.
    pub fn new(gitlab: Arc<dyn GitLabApi>) -> Self {
        Self { gitlab }
    }

    /// Parsed `.mergeward.yml` at `git_ref`, or an empty map when the file is
    /// missing or invalid.
    pub async fn read(&self, gitlab_project_id: i64, git_ref: &str) -> BTreeMap<String, Value> {
        let content = match self.gitlab.get_file(gitlab_project_id, REPO_CONFIG_PATH, git_ref).await {
            Ok(Some(content)) => content,
            Ok(None) => return BTreeMap::new(),
            Err(e) => {
                tracing::warn!(gitlab_project_id, git_ref, error = %e, "failed to read repository config");
                return BTreeMap::new();
            }
        };

        parse_repo_config(&content).unwrap_or_else(|e| {
            tracing::warn!(gitlab_project_id, git_ref, error = %e, "malformed repository config");
            BTreeMap::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_general_keys_are_mapped() {
        let overrides = parse_repo_config("general:\n  model: opus\n  language: de\n  timeout_minutes: 20\n").unwrap();
        assert_eq!(overrides.get("ai_model"), Some(&json!("opus")));
        assert_eq!(overrides.get("ai_language"), Some(&json!("de")));
        assert_eq!(overrides.get("timeout_minutes"), Some(&json!(20)));
    }

    #[test]
    fn test_sections_flatten_and_filter() {
        let yaml = r"
code_review:
  auto_review: false
  severity_threshold: major
  unknown_key: 1
feature_dev:
  branch_prefix: ai/
  enabled: 'yes'
general:
  colour: blue
";
        let overrides = parse_repo_config(yaml).unwrap();
        assert_eq!(overrides.get("code_review.auto_review"), Some(&json!(false)));
        assert_eq!(overrides.get("code_review.severity_threshold"), Some(&json!("major")));
        assert_eq!(overrides.get("feature_dev.branch_prefix"), Some(&json!("ai/")));
        // Wrong kind for a boolean setting.
        assert!(!overrides.contains_key("feature_dev.enabled"));
        assert!(!overrides.contains_key("code_review.unknown_key"));
        assert_eq!(overrides.len(), 3);
    }

    #[test]
    fn test_non_mapping_documents() {
        assert!(parse_repo_config("just a string").unwrap().is_empty());
        assert!(parse_repo_config("general: [1, 2]").unwrap().is_empty());
        assert!(parse_repo_config("general: {model: [").is_err());
    }
}
