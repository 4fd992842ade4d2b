//! controledit command-line tool.
//!
//! Provides subcommands for reading and editing fields of a Debian control
//! file, adjusting relation fields such as `Build-Depends`, and generating /
//! validating configuration files. Generated control files are edited
//! through their `control.in` template when one exists.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use controledit_core::config::EditorConfig;
use controledit_core::control::Paragraph;
use controledit_core::editor::{ControlEditor, DEFAULT_CONTROL_PATH};
use controledit_core::errors::RelationError;
use controledit_core::relations::{
    add_dependency, drop_dependency, ensure_exact_version, ensure_minimum_version,
    ensure_relation, ensure_some_version, is_relation_implied, parse_relations,
};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// controledit command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "controledit",
    version,
    about = "Edit Debian control files without disturbing their formatting"
)]
struct Cli {
    /// Path to the TOML configuration file
    /// (default: $XDG_CONFIG_HOME/controledit/config.toml when present).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Control file to edit.
    #[arg(short, long, global = true, default_value = DEFAULT_CONTROL_PATH)]
    file: PathBuf,

    /// Edit the paragraph of this binary package instead of the source
    /// paragraph.
    #[arg(long = "package", global = true, value_name = "NAME")]
    binary: Option<String>,

    /// Log more (-v for debug, -vv for trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the value of a field.
    Get { field: String },

    /// Set the value of a field.
    Set { field: String, value: String },

    /// Require at least VERSION of PACKAGE in a relation field.
    EnsureMinimumVersion {
        field: String,
        package: String,
        version: String,
    },

    /// Require exactly VERSION of PACKAGE in a relation field.
    EnsureExactVersion {
        field: String,
        package: String,
        version: String,
    },

    /// Require PACKAGE in a relation field, in any version.
    EnsureSomeVersion { field: String, package: String },

    /// Make sure RELATION is implied by a relation field.
    EnsureRelation { field: String, relation: String },

    /// Add a relation clause to a field.
    AddDependency {
        field: String,
        entry: String,

        /// Clause index to insert at (default: the end).
        #[arg(long)]
        position: Option<usize>,
    },

    /// Remove every mention of PACKAGE from a relation field.
    DropDependency { field: String, package: String },

    /// List the clauses of a relation field.
    Relations {
        field: String,

        /// Print JSON instead of one clause per line.
        #[arg(long)]
        json: bool,
    },

    /// Check whether relation INNER is implied by relation OUTER.
    Implied { inner: String, outer: String },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    // `init` and `validate` work on the configuration file itself.
    let config = match cli.command {
        Commands::Init { .. } | Commands::Validate => EditorConfig::default(),
        _ => load_config(cli.config.as_deref())?,
    };
    init_logging(&log_filter(cli.verbose, &config.log_level));

    let config_path = cli.config.clone().or_else(default_config_path);
    match cli.command {
        Commands::Init { ref output } => {
            let output = output
                .clone()
                .or(config_path)
                .context("no configuration directory; pass --output")?;
            return cmd_init(&output);
        }
        Commands::Validate => {
            let path = config_path.context("no configuration file; pass --config")?;
            return cmd_validate(&path);
        }
        Commands::Implied {
            ref inner,
            ref outer,
        } => return cmd_implied(inner, outer),
        _ => {}
    }

    let target = Target {
        file: &cli.file,
        binary: cli.binary.as_deref(),
        config: &config,
    };
    match cli.command {
        Commands::Get { field } => cmd_get(&target, &field),
        Commands::Set { field, value } => target.edit_field(&field, |_| Ok(value)),
        Commands::EnsureMinimumVersion {
            field,
            package,
            version,
        } => target.edit_field(&field, |text| {
            ensure_minimum_version(text, &package, &version)
        }),
        Commands::EnsureExactVersion {
            field,
            package,
            version,
        } => target.edit_field(&field, |text| ensure_exact_version(text, &package, &version)),
        Commands::EnsureSomeVersion { field, package } => {
            target.edit_field(&field, |text| ensure_some_version(text, &package))
        }
        Commands::EnsureRelation { field, relation } => {
            target.edit_field(&field, |text| ensure_relation(text, &relation))
        }
        Commands::AddDependency {
            field,
            entry,
            position,
        } => target.edit_field(&field, |text| add_dependency(text, &entry, position)),
        Commands::DropDependency { field, package } => {
            target.edit_field(&field, |text| drop_dependency(text, &package))
        }
        Commands::Relations { field, json } => cmd_relations(&target, &field, json),
        Commands::Init { .. } | Commands::Validate | Commands::Implied { .. } => Ok(()),
    }
}

fn log_filter(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("controledit").join("config.toml"))
}

fn load_config(explicit: Option<&Path>) -> Result<EditorConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path().filter(|p| p.is_file()) {
            Some(path) => path,
            None => return Ok(EditorConfig::default()),
        },
    };
    EditorConfig::load_and_resolve(&path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

// ---------------------------------------------------------------------------
// Paragraph access
// ---------------------------------------------------------------------------

/// The control file and paragraph a command works on.
struct Target<'a> {
    file: &'a Path,
    binary: Option<&'a str>,
    config: &'a EditorConfig,
}

impl Target<'_> {
    fn describe(&self) -> String {
        match self.binary {
            Some(name) => format!("binary package '{name}'"),
            None => "source paragraph".to_string(),
        }
    }

    fn open(&self) -> Result<ControlEditor> {
        ControlEditor::open_with(self.file, self.config)
            .with_context(|| format!("failed to open {}", self.file.display()))
    }

    fn paragraph<'e>(&self, editor: &'e ControlEditor) -> Result<Option<&'e Paragraph>> {
        match self.binary {
            Some(name) => editor
                .binary(name)
                .map(Some)
                .with_context(|| format!("no {} in {}", self.describe(), self.file.display())),
            None => Ok(editor.source()),
        }
    }

    fn paragraph_mut<'e>(&self, editor: &'e mut ControlEditor) -> Result<&'e mut Paragraph> {
        match self.binary {
            Some(name) => editor
                .binary_mut(name)?
                .with_context(|| format!("no {} in {}", self.describe(), self.file.display())),
            None => Ok(editor.source_mut()?),
        }
    }

    fn value(&self, editor: &ControlEditor, field: &str) -> Result<Option<String>> {
        Ok(self
            .paragraph(editor)?
            .and_then(|p| p.get(field))
            .map(str::to_string))
    }

    /// Replace `field` with `edit(current value)` and commit. An empty
    /// result removes the field.
    fn edit_field(
        &self,
        field: &str,
        edit: impl FnOnce(&str) -> Result<String, RelationError>,
    ) -> Result<()> {
        let mut editor = self.open()?;
        let current = self.value(&editor, field)?;
        let updated = edit(current.as_deref().unwrap_or_default())
            .with_context(|| format!("failed to update {field}"))?;

        if current.as_deref().unwrap_or_default() == updated {
            println!("{field}: unchanged");
            return Ok(());
        }
        debug!(field, value = %updated, "updating field");

        let paragraph = self.paragraph_mut(&mut editor)?;
        if updated.is_empty() {
            paragraph.remove(field);
        } else {
            paragraph
                .set(field, &updated)
                .with_context(|| format!("failed to set {field}"))?;
        }

        let outcome = editor
            .commit()
            .with_context(|| format!("failed to write {}", self.file.display()))?;
        println!("{}: {}", self.file.display(), outcome);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_get(target: &Target<'_>, field: &str) -> Result<()> {
    let editor = target.open()?;
    let value = target
        .value(&editor, field)?
        .with_context(|| format!("{field} is not set in the {}", target.describe()))?;
    println!("{value}");
    Ok(())
}

fn cmd_relations(target: &Target<'_>, field: &str, json: bool) -> Result<()> {
    let editor = target.open()?;
    let value = target.value(&editor, field)?.unwrap_or_default();
    let expression =
        parse_relations(&value).with_context(|| format!("{field} is not a relation field"))?;
    let clauses: Vec<_> = expression.clauses().map(|(_, clause)| clause).collect();

    if json {
        let rendered =
            serde_json::to_string_pretty(&clauses).context("failed to serialize relations")?;
        println!("{rendered}");
    } else {
        for clause in clauses {
            println!("{}", clause.to_string().trim());
        }
    }
    Ok(())
}

fn cmd_implied(inner: &str, outer: &str) -> Result<()> {
    let implied = is_relation_implied(inner, outer).context("failed to parse relations")?;
    if implied {
        println!("'{inner}' is implied by '{outer}'");
    } else {
        println!("'{inner}' is not implied by '{outer}'");
    }
    Ok(())
}

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    std::fs::write(output, EditorConfig::default_toml()).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Add placeholder values under [template.substitutions]");
    println!(
        "  2. Validate with: controledit validate --config {}",
        output.display()
    );
    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        EditorConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.resolve_env_vars() {
        Ok(()) => println!("  [OK] Environment variable references processed"),
        Err(e) => {
            println!("  [FAIL] {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    match config.validate() {
        Ok(()) => println!("  [OK] All fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    let rule = config.substitution_rule();
    println!();
    println!("Configuration summary:");
    println!("  Template suffix : {}", config.template.suffix);
    println!(
        "  Placeholders    : {}",
        config
            .template
            .substitutions
            .keys()
            .chain(config.template.substitutions_env.keys())
            .map(|name| match rule.value(name) {
                Some(_) => name.clone(),
                None => format!("{name} (NOT SET)"),
            })
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Generated marks : {}", config.generated.markers.len());
    println!("  Relation fields : {}", config.relations.fields.len());
    println!(
        "  Three-way merge : {}",
        if config.merge.enabled { "enabled" } else { "disabled" }
    );
    println!();
    println!("Configuration is valid.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_relation_command() {
        let cli = Cli::try_parse_from([
            "controledit",
            "--package",
            "libfoo1",
            "ensure-minimum-version",
            "Depends",
            "libc6",
            "2.36",
        ])
        .unwrap();
        assert_eq!(cli.binary.as_deref(), Some("libfoo1"));
        assert_eq!(cli.file, PathBuf::from(DEFAULT_CONTROL_PATH));
        assert!(matches!(
            cli.command,
            Commands::EnsureMinimumVersion { ref package, .. } if package == "libc6"
        ));
    }

    #[test]
    fn test_verbose_overrides_configured_level() {
        let cli = Cli::try_parse_from(["controledit", "-vv", "implied", "bzr", "bzr"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(log_filter(cli.verbose, "warn"), "trace");
        assert_eq!(log_filter(1, "warn"), "debug");
        assert_eq!(log_filter(0, "info"), "info");
    }

    #[test]
    fn test_init_then_validate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        cmd_init(&path).unwrap();
        assert!(cmd_init(&path).is_err());
        cmd_validate(&path).unwrap();
        load_config(Some(&path)).unwrap();
    }

    #[test]
    fn test_edit_field_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("control");
        std::fs::write(
            &file,
            "Source: foo\nBuild-Depends: debhelper (>= 9)\n\nPackage: foo\nDepends: libc6\n",
        )
        .unwrap();
        let config = EditorConfig::default();

        let source = Target {
            file: &file,
            binary: None,
            config: &config,
        };
        source
            .edit_field("Build-Depends", |text| {
                ensure_minimum_version(text, "debhelper", "12")
            })
            .unwrap();

        let binary = Target {
            binary: Some("foo"),
            ..source
        };
        binary
            .edit_field("Depends", |text| drop_dependency(text, "libc6"))
            .unwrap();
        assert!(binary
            .edit_field("Depends", |text| add_dependency(text, "libbar", None))
            .is_ok());

        let missing = Target {
            binary: Some("nope"),
            ..source
        };
        assert!(missing.edit_field("Depends", |_| Ok("x".into())).is_err());

        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "Source: foo\nBuild-Depends: debhelper (>= 12)\n\nPackage: foo\nDepends: libbar\n"
        );
    }
}
