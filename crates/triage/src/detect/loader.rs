//! Rule file loader.
//!
//! Scans a directory for `.yml`/`.yaml` files, one [`ThreatRule`] per file.
//! A file that fails to load is logged and skipped.

use std::collections::HashSet;
use std::path::Path;

use watchpost_core::types::ThreatRule;

use crate::error::TriageError;

const MAX_RULE_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10MB
const MAX_RULES_COUNT: usize = 10_000;

/// Loads threat rules from disk.
pub struct RuleLoader;

impl RuleLoader {
    /// Loads every YAML rule file in `dir`, sorted by file name.
    ///
    /// Rules repeating an id or a name already loaded are skipped.
    ///
    /// # Errors
    /// - the directory cannot be read
    /// - more than `MAX_RULES_COUNT` rules are found
    pub async fn load_directory(dir: impl AsRef<Path>) -> Result<Vec<ThreatRule>, TriageError> {
        let dir = dir.as_ref();
        let dir_error = |reason: String| TriageError::RuleLoad {
            path: dir.display().to_string(),
            reason,
        };

        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| dir_error(format!("failed to read directory: {e}")))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| dir_error(format!("failed to read directory entry: {e}")))?
        {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            if is_yaml {
                paths.push(path);
            }
        }
        paths.sort();

        let mut rules = Vec::new();
        let mut seen_ids = HashSet::new();
        let mut seen_names = HashSet::new();

        for path in paths {
            match Self::load_file(&path).await {
                Ok(rule) => {
                    if seen_ids.contains(&rule.id) || seen_names.contains(&rule.name) {
                        tracing::warn!(
                            rule_id = %rule.id,
                            rule = %rule.name,
                            path = %path.display(),
                            "duplicate rule, skipping"
                        );
                        continue;
                    }
                    seen_ids.insert(rule.id);
                    seen_names.insert(rule.name.clone());
                    rules.push(rule);
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load rule file, skipping"
                    );
                }
            }

            if rules.len() > MAX_RULES_COUNT {
                return Err(dir_error(format!("too many rules: max {MAX_RULES_COUNT}")));
            }
        }

        tracing::info!(dir = %dir.display(), count = rules.len(), "loaded threat rules");
        Ok(rules)
    }

    /// Loads a single rule file.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<ThreatRule, TriageError> {
        let path = path.as_ref();
        let file_error = |reason: String| TriageError::RuleLoad {
            path: path.display().to_string(),
            reason,
        };

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| file_error(format!("failed to read file metadata: {e}")))?;
        if metadata.len() > MAX_RULE_FILE_SIZE {
            return Err(file_error(format!(
                "file too large: {} bytes (max: {MAX_RULE_FILE_SIZE})",
                metadata.len()
            )));
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| file_error(format!("failed to read file: {e}")))?;

        Self::parse_yaml(&content, &path.display().to_string())
    }

    /// Parses and validates one rule.
    pub fn parse_yaml(yaml_str: &str, source: &str) -> Result<ThreatRule, TriageError> {
        let rule: ThreatRule =
            serde_yaml::from_str(yaml_str).map_err(|e| TriageError::RuleLoad {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;
        validate(&rule)?;
        Ok(rule)
    }
}

/// Checks the fields serde cannot: a non-blank name and a compilable pattern.
pub fn validate(rule: &ThreatRule) -> Result<(), TriageError> {
    if rule.name.trim().is_empty() {
        return Err(TriageError::RuleValidation {
            rule: rule.id.to_string(),
            reason: "name must not be empty".to_owned(),
        });
    }
    if rule.pattern.is_empty() {
        return Err(TriageError::RuleValidation {
            rule: rule.name.clone(),
            reason: "pattern must not be empty".to_owned(),
        });
    }
    regex::Regex::new(&rule.pattern).map_err(|e| TriageError::RuleValidation {
        rule: rule.name.clone(),
        reason: format!("invalid pattern: {e}"),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchpost_core::types::AlertSeverity;

    const SSH_RULE: &str = r#"
name: SSH brute force
description: Repeated failed password attempts
pattern: "(?i)failed password for .+ from"
severity: HIGH
"#;

    #[test]
    fn parse_valid_yaml() {
        let rule = RuleLoader::parse_yaml(SSH_RULE, "ssh.yml").unwrap();
        assert_eq!(rule.name, "SSH brute force");
        assert_eq!(rule.severity, AlertSeverity::High);
        assert!(rule.enabled);
    }

    #[test]
    fn unknown_severity_is_rejected() {
        let yaml = "name: x\npattern: x\nseverity: SEVERE\n";
        assert!(matches!(
            RuleLoader::parse_yaml(yaml, "x.yml"),
            Err(TriageError::RuleLoad { .. })
        ));
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let yaml = "name: broken\npattern: \"([a-z\"\nseverity: LOW\n";
        assert!(matches!(
            RuleLoader::parse_yaml(yaml, "broken.yml"),
            Err(TriageError::RuleValidation { .. })
        ));
    }

    #[test]
    fn blank_name_is_rejected() {
        let yaml = "name: \"  \"\npattern: x\nseverity: LOW\n";
        assert!(RuleLoader::parse_yaml(yaml, "blank.yml").is_err());
    }

    #[tokio::test]
    async fn load_nonexistent_directory_returns_error() {
        let result = RuleLoader::load_directory("/nonexistent/path/rules").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn load_directory_skips_bad_and_duplicate_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a_ssh.yml"), SSH_RULE).unwrap();
        std::fs::write(dir.path().join("b_ssh_copy.yaml"), SSH_RULE).unwrap();
        std::fs::write(dir.path().join("c_broken.yml"), "not: [valid").unwrap();
        std::fs::write(dir.path().join("notes.txt"), SSH_RULE).unwrap();
        std::fs::write(
            dir.path().join("d_sudo.yml"),
            "name: sudo abuse\npattern: \"sudo: .* COMMAND=\"\nseverity: MEDIUM\n",
        )
        .unwrap();

        let rules = RuleLoader::load_directory(dir.path()).await.unwrap();
        let names: Vec<&str> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["SSH brute force", "sudo abuse"]);
    }
}
