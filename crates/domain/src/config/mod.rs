mod admin;
mod clear;
mod context;
mod drift;
mod llm;
mod server;
mod sessions;
mod store;
mod upstream;

pub use admin::*;
pub use clear::*;
pub use context::*;
pub use drift::*;
pub use llm::*;
pub use server::*;
pub use sessions::*;
pub use store::*;
pub use upstream::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub llm: AuxLlmConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub drift: DriftConfig,
    #[serde(default)]
    pub clear: ClearConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.server.max_body_bytes == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.max_body_bytes".into(),
                message: "max_body_bytes must be greater than 0".into(),
            });
        }

        if self.upstream.base_url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "upstream.base_url".into(),
                message: "base_url must not be empty".into(),
            });
        } else if !self.upstream.base_url.starts_with("http://")
            && !self.upstream.base_url.starts_with("https://")
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "upstream.base_url".into(),
                message: format!(
                    "base_url must start with http:// or https:// (got \"{}\")",
                    self.upstream.base_url
                ),
            });
        }

        if self.upstream.api_key_env.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "upstream.api_key_env".into(),
                message: "no env var configured for the upstream API key".into(),
            });
        }

        // Warn when no auxiliary LLM roles are configured.
        if self.llm.roles.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.roles".into(),
                message: "no auxiliary LLM roles configured; helpers fall back to heuristics"
                    .into(),
            });
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        for (role, provider) in self.llm.roles.iter() {
            if provider.id.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.roles.{role}.id"),
                    message: "provider id must not be empty".into(),
                });
            }
            if provider.base_url.is_empty()
                || (!provider.base_url.starts_with("http://")
                    && !provider.base_url.starts_with("https://"))
            {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.roles.{role}.base_url"),
                    message: format!(
                        "base_url must start with http:// or https:// (got \"{}\")",
                        provider.base_url
                    ),
                });
            }
            if provider.auth.key.is_none() && provider.auth.env.is_none() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("llm.roles.{role}.auth"),
                    message: "no auth.env or auth.key configured; requests will be unauthenticated"
                        .into(),
                });
            }
            if !provider.id.is_empty() && !seen_ids.insert(&provider.id) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("llm.roles.{role}.id"),
                    message: format!(
                        "duplicate provider id \"{}\" across roles",
                        provider.id
                    ),
                });
            }
        }

        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        if let Some(rl) = &self.server.rate_limit {
            if rl.requests_per_second == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.requests_per_second".into(),
                    message: "requests_per_second must be greater than 0".into(),
                });
            }
            if rl.burst_size == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.burst_size".into(),
                    message: "burst_size must be greater than 0".into(),
                });
            }
        }

        if self.drift.realign_score <= self.drift.drift_score {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "drift.realign_score".into(),
                message: format!(
                    "realign_score ({}) must be greater than drift_score ({})",
                    self.drift.realign_score, self.drift.drift_score
                ),
            });
        }

        if self.clear.pre_compute_ratio <= 0.0 || self.clear.pre_compute_ratio > 1.0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "clear.pre_compute_ratio".into(),
                message: "pre_compute_ratio must be in (0.0, 1.0]".into(),
            });
        }

        if self.store.db_path.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "store.db_path".into(),
                message: "db_path must not be empty".into(),
            });
        }

        if self.clear.token_clear_threshold == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "clear.token_clear_threshold".into(),
                message: "token_clear_threshold must be greater than 0".into(),
            });
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config::default()
    }

    fn find_issue<'a>(issues: &'a [ConfigError], field_prefix: &str) -> Option<&'a ConfigError> {
        issues.iter().find(|e| e.field.starts_with(field_prefix))
    }

    #[test]
    fn default_config_has_no_errors() {
        let issues = valid_config().validate();
        let errors: Vec<_> = issues
            .iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn default_config_warns_about_missing_aux_roles() {
        let issues = valid_config().validate();
        assert!(find_issue(&issues, "llm.roles").is_some());
    }

    #[test]
    fn server_port_zero_is_error() {
        let mut cfg = valid_config();
        cfg.server.port = 0;
        let issues = cfg.validate();
        let issue = find_issue(&issues, "server.port").expect("expected server.port error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn upstream_base_url_empty_is_error() {
        let mut cfg = valid_config();
        cfg.upstream.base_url = String::new();
        let issues = cfg.validate();
        let issue =
            find_issue(&issues, "upstream.base_url").expect("expected upstream.base_url error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn upstream_base_url_invalid_scheme_is_error() {
        let mut cfg = valid_config();
        cfg.upstream.base_url = "ftp://example.com".into();
        let issues = cfg.validate();
        let issue =
            find_issue(&issues, "upstream.base_url").expect("expected upstream.base_url error");
        assert!(issue.message.contains("http://"));
    }

    #[test]
    fn cors_wildcard_is_warning() {
        let mut cfg = valid_config();
        cfg.server.cors.allowed_origins = vec!["*".into()];
        let issues = cfg.validate();
        let issue = find_issue(&issues, "server.cors.allowed_origins")
            .expect("expected CORS wildcard warning");
        assert_eq!(issue.severity, ConfigSeverity::Warning);
    }

    #[test]
    fn rate_limit_zero_rps_is_error() {
        let mut cfg = valid_config();
        cfg.server.rate_limit = Some(RateLimitConfig {
            requests_per_second: 0,
            burst_size: 100,
        });
        let issues = cfg.validate();
        let issue = find_issue(&issues, "server.rate_limit.requests_per_second")
            .expect("expected rps error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn drift_thresholds_must_be_ordered() {
        let mut cfg = valid_config();
        cfg.drift.realign_score = 4;
        cfg.drift.drift_score = 5;
        let issues = cfg.validate();
        let issue =
            find_issue(&issues, "drift.realign_score").expect("expected drift ordering error");
        assert_eq!(issue.severity, ConfigSeverity::Error);
    }

    #[test]
    fn pre_compute_ratio_out_of_range_is_error() {
        let mut cfg = valid_config();
        cfg.clear.pre_compute_ratio = 1.5;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "clear.pre_compute_ratio").is_some());

        cfg.clear.pre_compute_ratio = 0.0;
        let issues = cfg.validate();
        assert!(find_issue(&issues, "clear.pre_compute_ratio").is_some());
    }

    #[test]
    fn aux_role_with_auth_no_warning() {
        let mut cfg = valid_config();
        cfg.llm.roles.insert(
            "drift".into(),
            ProviderConfig {
                id: "haiku".into(),
                kind: ProviderKind::Anthropic,
                base_url: "https://api.anthropic.com".into(),
                model: "claude-haiku".into(),
                auth: AuthConfig {
                    env: Some("GROV_AUX_API_KEY_DRIFT".into()),
                    key: None,
                },
            },
        );
        let issues = cfg.validate();
        assert!(find_issue(&issues, "llm.roles").is_none());
    }

    #[test]
    fn config_error_display_format() {
        let err = ConfigError {
            severity: ConfigSeverity::Error,
            field: "server.port".into(),
            message: "port must be greater than 0".into(),
        };
        assert_eq!(
            format!("{err}"),
            "[ERROR] server.port: port must be greater than 0"
        );
    }
}
