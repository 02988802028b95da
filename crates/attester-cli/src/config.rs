//! Configuration file management for attester-bridge.
//!
//! Provides a TOML-based config file at
//! `~/.config/attester-bridge/config.toml` and a resolution chain:
//! CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use attester_core::{EngineConfig, EngineKind, ExternalExecutable, OutputTarget};

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub executables: ExecutablesSection,
}

/// Engine installation roots.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attester: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atjstestrunner: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutablesSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phantomjs: Option<String>,
}

impl ConfigFile {
    pub fn engine_root(&self, kind: EngineKind) -> Option<&Path> {
        match kind {
            EngineKind::Attester => self.paths.attester.as_deref(),
            EngineKind::AtJsTestRunner => self.paths.atjstestrunner.as_deref(),
        }
    }

    pub fn set_engine_root(&mut self, kind: EngineKind, root: PathBuf) {
        match kind {
            EngineKind::Attester => self.paths.attester = Some(root),
            EngineKind::AtJsTestRunner => self.paths.atjstestrunner = Some(root),
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the attester-bridge config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/attester-bridge` or
/// `~/.config/attester-bridge`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("attester-bridge");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("attester-bridge")
}

/// Return the path to the config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf> {
    let path = config_path();
    save_config_to(config, &path)?;
    Ok(path)
}

pub fn save_config_to(config: &ConfigFile, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }
    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;
    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub engine_root: Option<PathBuf>,
    pub node: Option<String>,
    pub phantomjs: Option<String>,
}

/// Resolve the engine configuration using the chain:
/// CLI flag > env var > config file > default.
///
/// - Engine root: `--engine-root` > `ATTESTER_PATH`/`ATJSTESTRUNNER_PATH` >
///   `paths.<engine>` > unset (reported when the engine is launched)
/// - Node: `--node` > `ATTESTER_NODE_BIN` > `executables.node` > `node`
/// - PhantomJS: `--phantomjs` > `ATTESTER_PHANTOMJS_BIN` >
///   `executables.phantomjs` > `phantomjs`
pub fn resolve(kind: EngineKind, cli: &CliOverrides) -> EngineConfig {
    let file_config = load_config().ok();
    resolve_with(kind, cli, file_config.as_ref())
}

pub fn resolve_with(kind: EngineKind, cli: &CliOverrides, file: Option<&ConfigFile>) -> EngineConfig {
    let engine_root = cli
        .engine_root
        .clone()
        .or_else(|| std::env::var_os(kind.root_setting()).map(PathBuf::from))
        .or_else(|| file.and_then(|f| f.engine_root(kind)).map(Path::to_path_buf));

    let node = pick(
        cli.node.as_deref(),
        ExternalExecutable::NODE_SETTING,
        file.and_then(|f| f.executables.node.as_deref()),
        "node",
    );
    let phantomjs = pick(
        cli.phantomjs.as_deref(),
        ExternalExecutable::PHANTOMJS_SETTING,
        file.and_then(|f| f.executables.phantomjs.as_deref()),
        "phantomjs",
    );

    EngineConfig {
        kind,
        engine_root,
        node: ExternalExecutable::node(node),
        phantomjs: ExternalExecutable::phantomjs(phantomjs),
        output: OutputTarget::default(),
    }
}

fn pick(flag: Option<&str>, env: &str, file: Option<&str>, default: &str) -> String {
    if let Some(value) = flag {
        value.to_string()
    } else if let Ok(value) = std::env::var(env) {
        value
    } else if let Some(value) = file {
        value.to_string()
    } else {
        default.to_string()
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    fn clear_env() {
        for var in [
            "ATTESTER_PATH",
            "ATJSTESTRUNNER_PATH",
            "ATTESTER_NODE_BIN",
            "ATTESTER_PHANTOMJS_BIN",
        ] {
            unsafe { std::env::remove_var(var) };
        }
    }

    fn sample_file() -> ConfigFile {
        ConfigFile {
            paths: PathsSection {
                attester: Some(PathBuf::from("/file/attester")),
                atjstestrunner: Some(PathBuf::from("/file/atjstestrunner")),
            },
            executables: ExecutablesSection {
                node: Some("file-node".to_string()),
                phantomjs: None,
            },
        }
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        let original = sample_file();
        save_config_to(&original, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn empty_file_parses_to_defaults() {
        let loaded: ConfigFile = toml::from_str("").unwrap();
        assert_eq!(loaded, ConfigFile::default());
    }

    #[test]
    fn partial_file_parses() {
        let loaded: ConfigFile = toml::from_str("[executables]\nphantomjs = \"slimerjs\"\n").unwrap();
        assert_eq!(loaded.executables.phantomjs.as_deref(), Some("slimerjs"));
        assert_eq!(loaded.engine_root(EngineKind::Attester), None);
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = load_config_from(&tmp.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn resolve_with_cli_flag_overrides_all() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var("ATTESTER_PATH", "/env/attester") };
        unsafe { std::env::set_var("ATTESTER_NODE_BIN", "env-node") };

        let cli = CliOverrides {
            engine_root: Some(PathBuf::from("/cli/attester")),
            node: Some("cli-node".to_string()),
            phantomjs: Some("cli-phantom".to_string()),
        };
        let config = resolve_with(EngineKind::Attester, &cli, Some(&sample_file()));
        assert_eq!(config.engine_root, Some(PathBuf::from("/cli/attester")));
        assert_eq!(config.node.binary, "cli-node");
        assert_eq!(config.phantomjs.binary, "cli-phantom");

        clear_env();
    }

    #[test]
    fn resolve_with_env_var_overrides_config_file() {
        let _lock = lock_env();
        clear_env();
        unsafe { std::env::set_var("ATJSTESTRUNNER_PATH", "/env/runner") };
        unsafe { std::env::set_var("ATTESTER_NODE_BIN", "env-node") };

        let config = resolve_with(
            EngineKind::AtJsTestRunner,
            &CliOverrides::default(),
            Some(&sample_file()),
        );
        assert_eq!(config.engine_root, Some(PathBuf::from("/env/runner")));
        assert_eq!(config.node.binary, "env-node");

        clear_env();
    }

    #[test]
    fn resolve_uses_config_file_then_defaults() {
        let _lock = lock_env();
        clear_env();

        let config = resolve_with(
            EngineKind::AtJsTestRunner,
            &CliOverrides::default(),
            Some(&sample_file()),
        );
        assert_eq!(config.kind, EngineKind::AtJsTestRunner);
        assert_eq!(config.engine_root, Some(PathBuf::from("/file/atjstestrunner")));
        assert_eq!(config.node.binary, "file-node");
        assert_eq!(config.phantomjs.binary, "phantomjs");
    }

    #[test]
    fn resolve_without_anything_leaves_root_unset() {
        let _lock = lock_env();
        clear_env();

        let config = resolve_with(EngineKind::Attester, &CliOverrides::default(), None);
        assert_eq!(config.engine_root, None);
        assert_eq!(config.node.binary, "node");
        assert!(config.entry_script().unwrap_err().is_config_error());
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("attester-bridge/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
