//! Configuration loading and resolution.
//!
//! Layers, lowest to highest: built-in defaults, a JSON config file,
//! environment variables, then command-line flags (applied by `main`).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use pageaudit::providers::completion::DEFAULT_COMPLETION_MODEL;
use pageaudit::{
    parse_categories, Category, CompletionClient, LanguageModel, MetricsProvider, Orchestrator,
    PageSpeedClient, RunOptions, UnitRegistry, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
};

use crate::error::{CliError, CliResult};

pub const CONFIG_ENV: &str = "PAGEAUDIT_CONFIG";
const LLM_KEY_ENVS: &[&str] = &["PAGEAUDIT_LLM_API_KEY", "TOGETHER_API_KEY"];
const LLM_MODEL_ENV: &str = "PAGEAUDIT_LLM_MODEL";
const PAGESPEED_KEY_ENV: &str = "PAGESPEED_API_KEY";
const UNIT_TIMEOUT_ENV: &str = "PAGEAUDIT_UNIT_TIMEOUT_SECS";

/// Resolved settings for one `analyze` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Category keys to analyze.
    pub categories: Vec<String>,
    pub unit_timeout_secs: u64,
    pub ai_timeout_secs: u64,
    pub metrics_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub ai: AiConfig,
    pub pagespeed: PageSpeedConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Request AI recommendations next to the rule-based analysis.
    pub enabled: bool,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: Option<String>,
    /// Completion length per request.
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSpeedConfig {
    /// Query PageSpeed Insights even without an API key.
    pub enabled: bool,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            categories: Category::ALL.iter().map(|c| c.as_str().to_string()).collect(),
            unit_timeout_secs: 30,
            ai_timeout_secs: 30,
            metrics_timeout_secs: 20,
            fetch_timeout_secs: 20,
            ai: AiConfig::default(),
            pagespeed: PageSpeedConfig::default(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            model: DEFAULT_COMPLETION_MODEL.to_string(),
            base_url: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl AuditConfig {
    /// Defaults, then the resolved config file, then the process environment.
    pub fn resolve(explicit: Option<&str>) -> CliResult<Self> {
        let path = resolve_config_path(explicit);
        let mut config = Self::load(path.as_deref())?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Defaults overlaid with a config file, if one is given.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|source| CliError::ConfigParse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Overlay environment variables read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> CliResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = LLM_KEY_ENVS.iter().find_map(|k| present(*k)) {
            self.ai.api_key = Some(key);
        }
        if let Some(model) = present(LLM_MODEL_ENV) {
            self.ai.model = model;
        }
        if let Some(key) = present(PAGESPEED_KEY_ENV) {
            self.pagespeed.api_key = Some(key);
        }
        if let Some(raw) = present(UNIT_TIMEOUT_ENV) {
            self.unit_timeout_secs = raw.trim().parse().map_err(|_| {
                CliError::Config(format!("{UNIT_TIMEOUT_ENV} must be a whole number of seconds, got {raw:?}"))
            })?;
        }
        Ok(())
    }

    /// Requested categories, validated.
    pub fn categories(&self) -> CliResult<Vec<Category>> {
        Ok(parse_categories(self.categories.as_slice())?)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            unit_timeout: Duration::from_secs(self.unit_timeout_secs),
            ai_timeout: Duration::from_secs(self.ai_timeout_secs),
            ai_recommendations: self.ai.enabled,
            metrics_timeout: Duration::from_secs(self.metrics_timeout_secs),
            ai_max_tokens: self.ai.max_tokens,
            ai_temperature: self.ai.temperature,
        }
    }

    /// Completion client, when an API key is configured.
    pub fn language_model(&self) -> Option<Arc<dyn LanguageModel>> {
        let key = self.ai.api_key.as_ref()?;
        let mut client = CompletionClient::new(key.clone(), Duration::from_secs(self.ai_timeout_secs));
        if let Some(base) = &self.ai.base_url {
            client = client.with_base_url(base.clone());
        }
        Some(Arc::new(client))
    }

    /// PageSpeed client, when enabled or keyed.
    pub fn metrics_provider(&self) -> Option<Arc<dyn MetricsProvider>> {
        if !self.pagespeed.enabled && self.pagespeed.api_key.is_none() {
            return None;
        }
        let mut client = PageSpeedClient::new(
            self.pagespeed.api_key.clone(),
            Duration::from_secs(self.metrics_timeout_secs),
        );
        if let Some(base) = &self.pagespeed.base_url {
            client = client.with_base_url(base.clone());
        }
        Some(Arc::new(client))
    }

    /// Engine wired with the built-in units and whichever providers are configured.
    pub fn orchestrator(&self) -> Orchestrator {
        let mut orchestrator = Orchestrator::new(UnitRegistry::with_defaults(), self.run_options());
        if let Some(metrics) = self.metrics_provider() {
            orchestrator = orchestrator.with_metrics(metrics);
        }
        if let Some(model) = self.language_model() {
            orchestrator = orchestrator.with_language_model(model, self.ai.model.clone());
        }
        orchestrator
    }
}

/// Resolve the config file: explicit path, `PAGEAUDIT_CONFIG`, then
/// `.pageaudit/config.json` in the working directory, then in `$HOME`.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(env_path));
    }

    let cwd_config = PathBuf::from(".pageaudit/config.json");
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .ok()?;
    let home_config = PathBuf::from(home).join(".pageaudit/config.json");
    home_config.exists().then_some(home_config)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AuditConfig::default();
        assert_eq!(config.categories().unwrap(), Category::ALL.to_vec());
        let options = config.run_options();
        assert_eq!(options.unit_timeout, Duration::from_secs(30));
        assert!(!options.ai_recommendations);
        assert!(config.language_model().is_none());
        assert!(config.metrics_provider().is_none());
    }

    #[test]
    fn test_explicit_path_wins() {
        assert_eq!(
            resolve_config_path(Some("/tmp/custom.json")),
            Some(PathBuf::from("/tmp/custom.json"))
        );
    }

    #[test]
    fn test_env_overlay() {
        let mut config = AuditConfig::default();
        config
            .apply_env(env(&[
                ("TOGETHER_API_KEY", "tk"),
                ("PAGEAUDIT_LLM_MODEL", "my-model"),
                ("PAGESPEED_API_KEY", "psk"),
                ("PAGEAUDIT_UNIT_TIMEOUT_SECS", "12"),
            ]))
            .unwrap();
        assert_eq!(config.ai.api_key.as_deref(), Some("tk"));
        assert_eq!(config.ai.model, "my-model");
        assert_eq!(config.pagespeed.api_key.as_deref(), Some("psk"));
        assert_eq!(config.unit_timeout_secs, 12);
        assert!(config.language_model().is_some());
        assert!(config.metrics_provider().is_some());
    }

    #[test]
    fn test_primary_llm_key_preferred() {
        let mut config = AuditConfig::default();
        config
            .apply_env(env(&[("PAGEAUDIT_LLM_API_KEY", "primary"), ("TOGETHER_API_KEY", "fallback")]))
            .unwrap();
        assert_eq!(config.ai.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn test_bad_timeout_env_is_rejected() {
        let mut config = AuditConfig::default();
        let err = config
            .apply_env(env(&[("PAGEAUDIT_UNIT_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_unknown_category_in_config() {
        let config = AuditConfig {
            categories: vec!["seo".into(), "speed".into()],
            ..AuditConfig::default()
        };
        assert!(matches!(config.categories(), Err(CliError::Audit(_))));
    }
}
