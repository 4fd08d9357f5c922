//! Loader for the portal client configuration with YAML + environment overlays.
//!
//! Sources are merged in order: YAML files and inline snippets first, then
//! `PRIOVAR_`-prefixed environment variables (`__` separates nesting, so
//! `PRIOVAR_API__BASE_URL` overrides `api.base_url`). After merging, every
//! string value has `${VAR}` placeholders expanded, recursively up to a fixed
//! depth so cyclic definitions terminate.
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::Path;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "PRIOVAR";

#[derive(Debug, Deserialize)]
pub struct PortalConfig {
    pub version: Option<String>,
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub auth_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retry budget for idempotent requests. POSTs are never retried.
    #[serde(default)]
    pub retries: usize,
}

impl ApiConfig {
    /// The auth token, if one is configured and its placeholder resolved.
    pub fn token(&self) -> Option<&str> {
        self.auth_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty() && !t.contains("${"))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionConfig {
    /// Seeds the session's health center when the session file has none.
    /// A center already stored in the session file is kept.
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub health_center_id: Option<String>,
    /// Where the session context is persisted; defaults to the data directory.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            format: default_log_format(),
            dir: None,
            stderr: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Seconds between background list refreshes; 0 disables polling.
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
    #[serde(default)]
    pub scope: ListScope,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            poll_secs: default_poll_secs(),
            scope: ListScope::default(),
        }
    }
}

/// Which patient list the table shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListScope {
    /// Patients of other clinics whose files this center requested.
    #[default]
    Requested,
    /// The center's own patients.
    Clinic,
}

fn default_timeout_secs() -> u64 {
    15
}
fn default_log_filter() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_tick_ms() -> u64 {
    80
}
fn default_poll_secs() -> u64 {
    30
}

fn opt_string_or_number<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(de)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

impl PortalConfig {
    /// Reject values the client cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Message("api.base_url must not be empty".into()));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Message(
                "api.timeout_secs must be at least 1".into(),
            ));
        }
        if self.ui.tick_ms < 10 {
            return Err(ConfigError::Message("ui.tick_ms must be at least 10".into()));
        }
        Ok(())
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (YAML + env overrides).
pub struct PortalConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for PortalConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PortalConfigLoader {
    /// Start with no files; only `PRIOVAR_` environment overrides.
    ///
    /// ```
    /// use priovar_config::PortalConfigLoader;
    ///
    /// let cfg = PortalConfigLoader::new()
    ///     .with_yaml_str("api:\n  base_url: 'http://localhost:8080/'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(cfg.api.timeout_secs, 15);
    /// assert_eq!(cfg.ui.poll_secs, 30);
    /// ```
    pub fn new() -> Self {
        let builder = Config::builder().add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );
        Self { builder }
    }

    /// Attach a required YAML/TOML/JSON file; the format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that may be missing, so environment-only setups work.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use priovar_config::{ListScope, PortalConfigLoader};
    ///
    /// let cfg = PortalConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// api:
    ///   base_url: "https://portal.example.org/priovar/"
    /// session:
    ///   health_center_id: 12
    /// ui:
    ///   scope: clinic
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.session.health_center_id.as_deref(), Some("12"));
    /// assert_eq!(cfg.ui.scope, ListScope::Clinic);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    pub fn load(self) -> Result<PortalConfig, ConfigError> {
        let cfg = self.builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: PortalConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed.validate()?;

        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_token_placeholder() {
        temp_env::with_var("PV_TEST_TOKEN", Some("abc123"), || {
            let mut v = json!({ "api": { "auth_token": "${PV_TEST_TOKEN}" } });
            expand_env_in_value(&mut v);
            assert_eq!(v, json!({ "api": { "auth_token": "abc123" } }));
        });
    }

    #[test]
    fn expands_in_arrays_and_leaves_scalars() {
        temp_env::with_vars([("PV_HOST", Some("lab.local")), ("PV_PORT", Some("8443"))], || {
            let mut v = json!(["https://$PV_HOST:${PV_PORT}/", 7, false, null]);
            expand_env_in_value(&mut v);
            assert_eq!(v, json!(["https://lab.local:8443/", 7, false, null]));
        });
    }

    #[test]
    fn expands_through_nested_variables() {
        temp_env::with_vars(
            [
                ("PV_ROOT", Some("portal.example.org")),
                ("PV_BASE", Some("https://${PV_ROOT}/priovar/")),
            ],
            || {
                let mut v = json!("${PV_BASE}");
                expand_env_in_value(&mut v);
                assert_eq!(v, json!("https://portal.example.org/priovar/"));
            },
        );
    }

    #[test]
    fn cyclic_variables_terminate() {
        temp_env::with_vars([("PV_A", Some("${PV_B}")), ("PV_B", Some("${PV_A}"))], || {
            let mut v = json!("x=${PV_A}");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.contains("${"));
        });
    }

    #[test]
    fn unresolved_token_counts_as_missing() {
        let api = ApiConfig {
            base_url: "http://localhost/".into(),
            auth_token: Some("${PRIOVAR_TOKEN_UNSET}".into()),
            timeout_secs: 15,
            retries: 0,
        };
        assert_eq!(api.token(), None);

        let api = ApiConfig {
            auth_token: Some("  tok  ".into()),
            ..api
        };
        assert_eq!(api.token(), Some("tok"));
    }

    #[test]
    fn rejects_zero_timeout() {
        let err = PortalConfigLoader::new()
            .with_yaml_str("api:\n  base_url: 'http://localhost/'\n  timeout_secs: 0")
            .load()
            .unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }
}
