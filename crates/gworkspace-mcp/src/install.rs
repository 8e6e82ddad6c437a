//! Register a server entry in an MCP host's JSON config

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Map, Value};
use tracing::info;

use gworkspace_google::Service;

/// Claude Desktop's config file under the platform config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("Claude").join("claude_desktop_config.json"))
}

/// `mcpServers` entry that launches `exe serve <service>`.
pub fn server_entry(exe: &Path, service: Service, credentials: &Path, token_dir: Option<&Path>) -> Value {
    let mut args = vec![
        "serve".to_string(),
        service.name().to_string(),
        "--credentials".to_string(),
        credentials.display().to_string(),
    ];
    if let Some(dir) = token_dir {
        args.push("--token-dir".to_string());
        args.push(dir.display().to_string());
    }
    json!({
        "command": exe.display().to_string(),
        "args": args,
    })
}

/// Absolute form of a token directory for the host config, creating it when missing.
pub fn absolute_token_dir(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    std::fs::canonicalize(dir).with_context(|| format!("resolving {}", dir.display()))
}

#[derive(Debug, PartialEq, Eq)]
pub struct InstallOutcome {
    /// An entry with the same name was overwritten.
    pub replaced: bool,
    pub backup: Option<PathBuf>,
}

/// Add or replace `mcpServers.<name>` in `config_path`, creating the file
/// when missing and backing up an existing one to `<file>.bak` first.
pub fn install(config_path: &Path, name: &str, entry: Value) -> Result<InstallOutcome> {
    let mut backup = None;
    let mut config = if config_path.exists() {
        let raw = std::fs::read_to_string(config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;

        let backup_path = backup_path(config_path);
        std::fs::write(&backup_path, &raw).with_context(|| format!("writing backup {}", backup_path.display()))?;
        backup = Some(backup_path);

        if raw.trim().is_empty() {
            Map::new()
        } else {
            match serde_json::from_str::<Value>(&raw).with_context(|| format!("parsing {}", config_path.display()))? {
                Value::Object(map) => map,
                _ => bail!("{} is not a JSON object", config_path.display()),
            }
        }
    } else {
        Map::new()
    };

    let servers = config
        .entry("mcpServers")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| anyhow!("\"mcpServers\" in {} is not an object", config_path.display()))?;
    let replaced = servers.insert(name.to_string(), entry).is_some();

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let mut text = serde_json::to_string_pretty(&Value::Object(config))?;
    text.push('\n');
    std::fs::write(config_path, text).with_context(|| format!("writing {}", config_path.display()))?;

    info!(
        "{} MCP server '{}' in {}",
        if replaced { "Replaced" } else { "Added" },
        name,
        config_path.display()
    );
    Ok(InstallOutcome { replaced, backup })
}

fn backup_path(config_path: &Path) -> PathBuf {
    let mut name = config_path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> Value {
        server_entry(
            Path::new("/usr/local/bin/gworkspace-mcp"),
            Service::Gmail,
            Path::new("/home/u/credentials.json"),
            None,
        )
    }

    #[test]
    fn test_server_entry_args() {
        let with_dir = server_entry(
            Path::new("/bin/gw"),
            Service::Drive,
            Path::new("/c.json"),
            Some(Path::new("/tokens")),
        );
        assert_eq!(
            with_dir,
            json!({"command": "/bin/gw", "args": ["serve", "drive", "--credentials", "/c.json", "--token-dir", "/tokens"]})
        );
    }

    #[test]
    fn test_token_dir_is_created_and_made_absolute() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("state")).unwrap();
        let tokens = dir.path().join("state").join("..").join("tokens");

        let resolved = absolute_token_dir(&tokens).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.is_dir());
        assert_eq!(resolved, std::fs::canonicalize(dir.path()).unwrap().join("tokens"));
    }

    #[test]
    fn test_creates_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Claude").join("claude_desktop_config.json");

        let outcome = install(&path, "gworkspace-gmail", entry()).unwrap();
        assert_eq!(outcome, InstallOutcome { replaced: false, backup: None });

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["mcpServers"]["gworkspace-gmail"]["args"][1], "gmail");
    }

    #[test]
    fn test_preserves_other_keys_and_backs_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claude_desktop_config.json");
        let original = r#"{"theme": "dark", "mcpServers": {"other": {"command": "x"}, "gworkspace-gmail": {"command": "old"}}}"#;
        std::fs::write(&path, original).unwrap();

        let outcome = install(&path, "gworkspace-gmail", entry()).unwrap();
        assert!(outcome.replaced);
        let backup = outcome.backup.unwrap();
        assert_eq!(backup, dir.path().join("claude_desktop_config.json.bak"));
        assert_eq!(std::fs::read_to_string(backup).unwrap(), original);

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["theme"], "dark");
        assert_eq!(written["mcpServers"]["other"]["command"], "x");
        assert_eq!(written["mcpServers"]["gworkspace-gmail"]["command"], "/usr/local/bin/gworkspace-mcp");
    }

    #[test]
    fn test_rejects_non_object_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(install(&path, "gworkspace-gmail", entry()).is_err());
    }
}
