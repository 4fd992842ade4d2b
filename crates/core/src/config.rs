//! TOML-based configuration for the control file editor.
//!
//! Placeholder values can be given inline (`[template.substitutions]`) or
//! as references to environment variables (`[template.substitutions_env]`),
//! which are read at runtime via [`EditorConfig::resolve_env_vars`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::conflict::{MergeStrategy, Merger, NoMerge};
use crate::editor::generated::{GeneratedMarkers, DEFAULT_MARKERS};
use crate::errors::ConfigError;
use crate::template::SubstitutionRule;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Log level for the CLI (default "info").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub template: TemplateConfig,

    #[serde(default)]
    pub generated: GeneratedConfig,

    #[serde(default)]
    pub relations: RelationsConfig,

    #[serde(default)]
    pub merge: MergeConfig,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            template: TemplateConfig::default(),
            generated: GeneratedConfig::default(),
            relations: RelationsConfig::default(),
            merge: MergeConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Appended to a file name to find its template (default ".in").
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// Placeholder name to value.
    #[serde(default)]
    pub substitutions: BTreeMap<String, String>,

    /// Placeholder name to the environment variable holding its value.
    #[serde(default)]
    pub substitutions_env: BTreeMap<String, String>,

    /// Values resolved from `substitutions_env` (not serialized).
    #[serde(skip)]
    pub resolved: BTreeMap<String, String>,
}

fn default_suffix() -> String {
    ".in".into()
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            suffix: default_suffix(),
            substitutions: BTreeMap::new(),
            substitutions_env: BTreeMap::new(),
            resolved: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Generated files
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedConfig {
    /// Regular expressions matched against the first two lines of a file.
    #[serde(default = "default_markers")]
    pub markers: Vec<String>,
}

fn default_markers() -> Vec<String> {
    DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect()
}

impl Default for GeneratedConfig {
    fn default() -> Self {
        Self {
            markers: default_markers(),
        }
    }
}

// ---------------------------------------------------------------------------
// Relation fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationsConfig {
    /// Fields whose values are relation expressions.
    #[serde(default = "default_relation_fields")]
    pub fields: Vec<String>,
}

fn default_relation_fields() -> Vec<String> {
    [
        "Build-Depends",
        "Build-Depends-Indep",
        "Build-Depends-Arch",
        "Build-Conflicts",
        "Depends",
        "Pre-Depends",
        "Recommends",
        "Suggests",
        "Breaks",
        "Conflicts",
        "Provides",
        "Replaces",
        "Enhances",
    ]
    .iter()
    .map(|f| f.to_string())
    .collect()
}

impl Default for RelationsConfig {
    fn default() -> Self {
        Self {
            fields: default_relation_fields(),
        }
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Fall back to a three-way merge when formatting cannot be kept
    /// verbatim (default true).
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl EditorConfig {
    /// Load an [`EditorConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: EditorConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve `template.substitutions_env` references.
    ///
    /// Unset variables log a warning and leave the placeholder without a
    /// value, so templates using it are not expanded.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        info!("resolving environment variable references in config");
        for (name, env_name) in &self.template.substitutions_env {
            let field = format!("template.substitutions_env.{name}");
            if let Some(value) = resolve_optional_env(env_name, &field) {
                self.template.resolved.insert(name.clone(), value);
            }
        }
        debug!("environment variable resolution complete");
        Ok(())
    }

    /// Validate that all fields are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.template.suffix.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "template.suffix".into(),
                detail: "template suffix must not be empty".into(),
            });
        }
        if self.template.suffix.contains(std::path::is_separator) {
            return Err(ConfigError::InvalidValue {
                field: "template.suffix".into(),
                detail: "template suffix must not contain a path separator".into(),
            });
        }
        if let Some(name) = self
            .template
            .substitutions
            .keys()
            .chain(self.template.substitutions_env.keys())
            .find(|name| !crate::template::is_placeholder(&format!("@{name}@")))
        {
            return Err(ConfigError::InvalidValue {
                field: "template.substitutions".into(),
                detail: format!("'{name}' is not a valid placeholder name"),
            });
        }
        self.generated_markers()?;
        if self.relations.fields.iter().any(|f| f.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "relations.fields".into(),
                detail: "field names must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Inline values plus those resolved from the environment, the latter
    /// taking precedence.
    pub fn substitution_rule(&self) -> SubstitutionRule {
        let mut values = self.template.substitutions.clone();
        values.extend(
            self.template
                .resolved
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        SubstitutionRule::from_map(values)
    }

    pub fn generated_markers(&self) -> Result<GeneratedMarkers, ConfigError> {
        GeneratedMarkers::from_patterns(&self.generated.markers)
    }

    pub fn merge_strategy(&self) -> Arc<dyn MergeStrategy> {
        if self.merge.enabled {
            Arc::new(Merger)
        } else {
            Arc::new(NoMerge)
        }
    }

    /// A commented default configuration, as written by `controledit init`.
    pub fn default_toml() -> String {
        let markers = default_markers()
            .iter()
            .map(|m| format!("    '{m}',"))
            .collect::<Vec<_>>()
            .join("\n");
        let fields = default_relation_fields()
            .iter()
            .map(|f| format!("    \"{f}\","))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            r#"# controledit configuration
log_level = "info"

[template]
# Templates live next to the generated file: debian/control -> debian/control.in
suffix = ".in"

[template.substitutions]
# cdbs = "debhelper (>= 12), cdbs"

[template.substitutions_env]
# uploaders = "DEB_UPLOADERS"

[generated]
markers = [
{markers}
]

[relations]
fields = [
{fields}
]

[merge]
enabled = true
"#
        )
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}
