use std::collections::HashMap;
use std::env;
use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::roles::RoleFlags;

/// Secrets and endpoints, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: String,
    pub openai_api_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let github_token = env::var("GITHUB_TOKEN")
            .map_err(|_| Error::Config("GITHUB_TOKEN environment variable not set".to_string()))?;

        let openai_api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| Error::Config("OPENAI_API_KEY environment variable not set".to_string()))?;

        Ok(Self {
            github_token,
            openai_api_key,
        })
    }
}

/// Role names usable in settings files. A list of names is OR-ed into one
/// mask, so an entry binds to the exact role combination it spells out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleName {
    Review,
    Issue,
    Assignee,
    Issuer,
    Collaborator,
    Contributor,
    Task,
}

impl RoleName {
    pub fn flag(self) -> RoleFlags {
        match self {
            RoleName::Review => RoleFlags::REVIEW,
            RoleName::Issue => RoleFlags::ISSUE,
            RoleName::Assignee => RoleFlags::ASSIGNEE,
            RoleName::Issuer => RoleFlags::ISSUER,
            RoleName::Collaborator => RoleFlags::COLLABORATOR,
            RoleName::Contributor => RoleFlags::CONTRIBUTOR,
            RoleName::Task => RoleFlags::TASK,
        }
    }
}

pub fn mask_of(roles: &[RoleName]) -> RoleFlags {
    roles
        .iter()
        .fold(RoleFlags::empty(), |acc, role| acc | role.flag())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleMultiplier {
    pub role: Vec<RoleName>,
    pub formatting_multiplier: Decimal,
    pub word_value: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedRelevance {
    pub role: Vec<RoleName>,
    pub relevance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserExtractorConfig {
    pub enabled: bool,
}

impl Default for UserExtractorConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPurgeConfig {
    pub enabled: bool,
}

impl Default for DataPurgeConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormattingEvaluatorConfig {
    pub enabled: bool,
    pub multipliers: Vec<RoleMultiplier>,
    /// Per-tag weight; tags not listed here score 1.
    pub scores: HashMap<String, Decimal>,
}

impl Default for FormattingEvaluatorConfig {
    fn default() -> Self {
        let pair = |role: &[RoleName], formatting_multiplier: Decimal, word_value: Decimal| {
            RoleMultiplier {
                role: role.to_vec(),
                formatting_multiplier,
                word_value,
            }
        };
        Self {
            enabled: true,
            multipliers: vec![
                pair(
                    &[RoleName::Issue, RoleName::Issuer, RoleName::Task],
                    dec!(1),
                    dec!(0.1),
                ),
                pair(&[RoleName::Issue, RoleName::Issuer], dec!(1), dec!(0.2)),
                pair(&[RoleName::Issue, RoleName::Assignee], dec!(0), dec!(0)),
                pair(&[RoleName::Issue, RoleName::Collaborator], dec!(1), dec!(0.1)),
                pair(
                    &[RoleName::Issue, RoleName::Contributor],
                    dec!(0.25),
                    dec!(0.1),
                ),
                pair(&[RoleName::Review, RoleName::Issuer], dec!(2), dec!(0.2)),
                pair(&[RoleName::Review, RoleName::Assignee], dec!(1), dec!(0.1)),
                pair(&[RoleName::Review, RoleName::Collaborator], dec!(1), dec!(0.1)),
                pair(
                    &[RoleName::Review, RoleName::Contributor],
                    dec!(0.25),
                    dec!(0.1),
                ),
            ],
            scores: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub model: String,
    pub endpoint: Option<String>,
    /// Ceiling for the structured response, in tokens.
    pub token_limit: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-2024-08-06".to_string(),
            endpoint: None,
            token_limit: 16_384,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentEvaluatorConfig {
    pub enabled: bool,
    /// Role combinations scored by constant instead of by the LLM.
    pub multipliers: Vec<FixedRelevance>,
    pub openai: OpenAiConfig,
}

impl Default for ContentEvaluatorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            multipliers: vec![
                FixedRelevance {
                    role: vec![RoleName::Issue, RoleName::Issuer, RoleName::Task],
                    relevance: 1.0,
                },
                FixedRelevance {
                    role: vec![RoleName::Issue, RoleName::Issuer],
                    relevance: 1.0,
                },
            ],
            openai: OpenAiConfig::default(),
        }
    }
}

impl ContentEvaluatorConfig {
    pub fn validate(&self) -> Result<()> {
        for fixed in &self.multipliers {
            if fixed.role.is_empty() {
                return Err(Error::Config(
                    "fixed relevance entry with empty role list".to_string(),
                ));
            }
            if !(0.0..=1.0).contains(&fixed.relevance) {
                return Err(Error::Config(format!(
                    "fixed relevance {} outside [0, 1]",
                    fixed.relevance
                )));
            }
        }
        if self.openai.token_limit == 0 {
            return Err(Error::Config("token limit must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub enabled: bool,
    /// Post the combined report back to the issue.
    pub post: bool,
    /// Write the combined report to this path for inspection.
    pub debug_output: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            post: false,
            debug_output: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IncentivesConfig {
    pub user_extractor: UserExtractorConfig,
    pub data_purge: DataPurgeConfig,
    pub formatting_evaluator: FormattingEvaluatorConfig,
    pub content_evaluator: ContentEvaluatorConfig,
    pub report: ReportConfig,
}

impl IncentivesConfig {
    /// Loads settings from a JSON file, falling back to the defaults when no
    /// path is given. A file that fails to parse reverts to defaults with a
    /// warning rather than aborting the run.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path)?;
        match serde_json::from_str(&raw) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(
                    "Invalid incentives configuration in {}, reverting to defaults: {}",
                    path.display(),
                    e
                );
                Ok(Self::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_list_folds_into_one_mask() {
        let mask = mask_of(&[RoleName::Issue, RoleName::Issuer, RoleName::Task]);
        assert_eq!(
            mask,
            RoleFlags::ISSUE | RoleFlags::ISSUER | RoleFlags::TASK
        );
    }

    #[test]
    fn relevance_outside_unit_interval_fails_validation() {
        let config = ContentEvaluatorConfig {
            multipliers: vec![FixedRelevance {
                role: vec![RoleName::Issue],
                relevance: 1.5,
            }],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn settings_roundtrip_from_json() {
        let raw = r#"{
            "formatting_evaluator": {
                "scores": { "code": 5, "a": 2 }
            },
            "content_evaluator": {
                "openai": { "model": "gpt-4o-mini", "token_limit": 2048 }
            }
        }"#;
        let config: IncentivesConfig = serde_json::from_str(raw).unwrap();
        assert!(config.formatting_evaluator.enabled);
        assert_eq!(
            config.formatting_evaluator.scores.get("code"),
            Some(&Decimal::from(5))
        );
        assert_eq!(config.content_evaluator.openai.model, "gpt-4o-mini");
        assert_eq!(config.content_evaluator.openai.token_limit, 2048);
    }
}
