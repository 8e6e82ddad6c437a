//! Path Utilities
//!
//! Default locations for stored OAuth tokens.

use std::path::{Path, PathBuf};

use crate::Service;

/// Application directory under the platform config dir
/// (`~/.config/gworkspace-mcp` on Linux, `~/Library/Application Support/gworkspace-mcp` on macOS).
pub fn app_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gworkspace-mcp"))
}

/// Default directory holding one token file per service
pub fn default_token_dir() -> Option<PathBuf> {
    app_dir().map(|dir| dir.join("tokens"))
}

/// Token file for a service inside `token_dir`
///
/// # Example
/// ```ignore
/// let path = token_path(&dir, Service::Gmail); // <dir>/gmail_auth_token.json
/// ```
pub fn token_path(token_dir: &Path, service: Service) -> PathBuf {
    token_dir.join(format!("{}_auth_token.json", service.name()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_path_per_service() {
        let dir = Path::new("/tmp/tokens");
        assert_eq!(
            token_path(dir, Service::Calendar),
            PathBuf::from("/tmp/tokens/calendar_auth_token.json")
        );
        assert_eq!(
            token_path(dir, Service::Drive),
            PathBuf::from("/tmp/tokens/drive_auth_token.json")
        );
    }
}
