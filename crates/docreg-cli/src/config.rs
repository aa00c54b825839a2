//! CLI configuration: an optional TOML file plus `DOCREG_*` environment
//! variables, with command-line flags applied on top by the caller.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use docreg_core::identity::Identity;
use serde::Deserialize;

/// Shape of `docreg.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
  /// Registry database file. `~/` is expanded.
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  /// Identity used when `--as` is not given.
  #[serde(default)]
  pub caller:     Option<String>,
}

fn default_store_path() -> PathBuf { PathBuf::from("registry.db") }

impl CliConfig {
  /// Load from `path` (missing file is fine) and the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    Self::load_with_env(path, config::Environment::with_prefix("DOCREG"))
  }

  /// Environment values win over the file.
  fn load_with_env(path: &Path, env: config::Environment) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(env)
      .build()
      .context("failed to read config file")?;

    settings
      .try_deserialize()
      .context("failed to deserialise CliConfig")
  }

  /// Parse the configured caller, if any.
  pub fn caller_identity(&self) -> anyhow::Result<Option<Identity>> {
    self
      .caller
      .as_deref()
      .map(|s| {
        s.parse()
          .with_context(|| format!("invalid caller identity in config: {s:?}"))
      })
      .transpose()
  }

  pub fn resolved_store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }

  /// The caller and store path to use, with `--as` and `--store` flags
  /// taking precedence over configured values.
  pub fn resolve(
    &self,
    caller: Option<Identity>,
    store: Option<PathBuf>,
  ) -> anyhow::Result<(Option<Identity>, PathBuf)> {
    let caller = match caller {
      Some(c) => Some(c),
      None => self.caller_identity()?,
    };
    let store = store.unwrap_or_else(|| self.resolved_store_path());
    Ok((caller, store))
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = CliConfig::load(&dir.path().join("absent.toml")).unwrap();
    assert!(cfg.store_path.ends_with("registry.db"));
  }

  #[test]
  fn file_values_are_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("docreg.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "store_path = \"/var/lib/docreg/main.db\"").unwrap();
    writeln!(f, "caller = \"0x{}\"", "a1".repeat(20)).unwrap();
    drop(f);

    let cfg = CliConfig::load(&path).unwrap();
    assert_eq!(cfg.store_path, PathBuf::from("/var/lib/docreg/main.db"));
    let caller = cfg.caller_identity().unwrap().unwrap();
    assert_eq!(caller, Identity::from_bytes([0xa1; 20]));
  }

  #[test]
  fn bad_caller_is_reported() {
    let cfg = CliConfig {
      store_path: default_store_path(),
      caller:     Some("not-an-address".into()),
    };
    assert!(cfg.caller_identity().is_err());
  }

  fn docreg_env(vars: &[(&str, &str)]) -> config::Environment {
    let vars = vars
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    config::Environment::with_prefix("DOCREG").source(Some(vars))
  }

  fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("docreg.toml");
    std::fs::write(
      &path,
      format!("store_path = \"/srv/file.db\"\ncaller = \"0x{}\"\n", "a1".repeat(20)),
    )
    .unwrap();
    path
  }

  #[test]
  fn environment_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path());
    let bob = format!("0x{}", "b0".repeat(20));
    let env = docreg_env(&[
      ("DOCREG_CALLER", bob.as_str()),
      ("DOCREG_STORE_PATH", "/srv/env.db"),
      ("OTHER_CALLER", "ignored"),
    ]);

    let cfg = CliConfig::load_with_env(&path, env).unwrap();
    let (caller, store) = cfg.resolve(None, None).unwrap();
    assert_eq!(caller, Some(Identity::from_bytes([0xb0; 20])));
    assert_eq!(store, PathBuf::from("/srv/env.db"));
  }

  #[test]
  fn flags_override_environment_and_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path());
    let bob = format!("0x{}", "b0".repeat(20));
    let env = docreg_env(&[
      ("DOCREG_CALLER", bob.as_str()),
      ("DOCREG_STORE_PATH", "/srv/env.db"),
    ]);
    let cfg = CliConfig::load_with_env(&path, env).unwrap();

    let flagged = Identity::from_bytes([0x01; 20]);
    let (caller, store) = cfg
      .resolve(Some(flagged), Some(PathBuf::from("/srv/flag.db")))
      .unwrap();
    assert_eq!(caller, Some(flagged));
    assert_eq!(store, PathBuf::from("/srv/flag.db"));
  }

  #[test]
  fn flag_caller_skips_a_broken_configured_one() {
    let cfg = CliConfig {
      store_path: default_store_path(),
      caller:     Some("not-an-address".into()),
    };
    assert!(cfg.resolve(None, None).is_err());
    let flagged = Identity::from_bytes([0x01; 20]);
    let (caller, _) = cfg.resolve(Some(flagged), None).unwrap();
    assert_eq!(caller, Some(flagged));
  }

  #[test]
  fn tilde_expands_against_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    let expanded = expand_tilde(Path::new("~/docreg/registry.db"));
    assert_eq!(expanded, PathBuf::from(home).join("docreg/registry.db"));
  }
}
