//! Settings loader and makepkg.conf lookup.

use crate::config::BuildConfig;
use crate::error::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};

/// System makepkg configuration consulted for the default package destination
pub const MAKEPKG_CONF: &str = "/etc/makepkg.conf";

/// Get the global settings path: ~/.config/zfs-pkgbuilder/settings.json
pub fn get_global_settings_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or_else(|| {
        ConfigError::ValidationFailed("Cannot determine home directory".to_string())
    })?;

    Ok(home.join(".config/zfs-pkgbuilder").join("settings.json"))
}

/// Load settings from an explicit path, or from the global path when present.
///
/// An explicit path must exist; a missing global file means defaults.
pub fn load_settings(explicit: Option<&Path>) -> Result<BuildConfig, ConfigError> {
    if let Some(path) = explicit {
        return load_config_from_file(path);
    }

    match get_global_settings_path() {
        Ok(path) if path.exists() => {
            log::debug!("[Config] Loading settings from {}", path.display());
            load_config_from_file(&path)
        }
        _ => Ok(BuildConfig::default()),
    }
}

/// Load config from JSON file.
pub fn load_config_from_file(path: &Path) -> Result<BuildConfig, ConfigError> {
    validate_config_path(path)?;

    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::FileNotFound(format!(
                "Configuration file not found at: {}",
                path.display()
            ))
        } else {
            ConfigError::IoError(e)
        }
    })?;

    let config: BuildConfig = serde_json::from_str(&content).map_err(ConfigError::InvalidJson)?;
    Ok(config)
}

/// Validate config path (.json extension required).
pub fn validate_config_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationFailed(
            "Configuration path cannot be empty".to_string(),
        ));
    }

    match path.extension() {
        Some(ext) if ext == "json" => Ok(()),
        Some(ext) => Err(ConfigError::ValidationFailed(format!(
            "Configuration file must have .json extension, got .{}",
            ext.to_string_lossy()
        ))),
        None => Err(ConfigError::ValidationFailed(
            "Configuration file must have .json extension".to_string(),
        )),
    }
}

/// Extract a non-empty `PKGDEST=` value from makepkg.conf content.
///
/// The first `PKGDEST=` line wins; surrounding quotes are dropped.
pub fn parse_makepkg_pkgdest(content: &str) -> Option<PathBuf> {
    let line = content.lines().find(|line| line.starts_with("PKGDEST="))?;
    let value = line["PKGDEST=".len()..]
        .trim()
        .trim_matches(|c| c == '"' || c == '\'');
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

/// Resolve the package destination: explicit flag, then makepkg.conf, then `./out`.
pub fn resolve_destination(explicit: Option<PathBuf>, makepkg_conf: &Path, cwd: &Path) -> PathBuf {
    if let Some(dest) = explicit {
        return dest;
    }

    fs::read_to_string(makepkg_conf)
        .ok()
        .and_then(|content| parse_makepkg_pkgdest(&content))
        .unwrap_or_else(|| cwd.join("out"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_config_path_requires_json() {
        assert!(validate_config_path(Path::new("settings.json")).is_ok());
        assert!(validate_config_path(Path::new("settings.toml")).is_err());
        assert!(validate_config_path(Path::new("settings")).is_err());
        assert!(validate_config_path(Path::new("")).is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"api_url": "http://localhost/releases"}"#).unwrap();

        let config = load_config_from_file(&path).unwrap();
        assert_eq!(config.api_url, "http://localhost/releases");
        assert_eq!(config.utils_stage, "zfs-utils");
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = load_settings(Some(&dir.path().join("absent.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_invalid_json_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_config_from_file(&path),
            Err(ConfigError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_parse_makepkg_pkgdest() {
        let content = "# comment\nPKGDEST=/home/packages\nSRCDEST=/src\n";
        assert_eq!(
            parse_makepkg_pkgdest(content),
            Some(PathBuf::from("/home/packages"))
        );
        assert_eq!(parse_makepkg_pkgdest("#PKGDEST=/home/packages\n"), None);
        assert_eq!(parse_makepkg_pkgdest("PKGDEST=\n"), None);
        assert_eq!(
            parse_makepkg_pkgdest("PKGDEST=\"/quoted\"\n"),
            Some(PathBuf::from("/quoted"))
        );
    }

    #[test]
    fn test_resolve_destination_precedence() {
        let dir = TempDir::new().unwrap();
        let conf = dir.path().join("makepkg.conf");
        let cwd = dir.path().join("cwd");

        assert_eq!(resolve_destination(None, &conf, &cwd), cwd.join("out"));

        fs::write(&conf, "PKGDEST=/srv/pkgs\n").unwrap();
        assert_eq!(resolve_destination(None, &conf, &cwd), PathBuf::from("/srv/pkgs"));

        assert_eq!(
            resolve_destination(Some(PathBuf::from("/explicit")), &conf, &cwd),
            PathBuf::from("/explicit")
        );
    }
}
