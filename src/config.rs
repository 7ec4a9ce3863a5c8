//! Configuration system using TOML files.
//!
//! Settings are loaded once at startup from the path given on the command
//! line (or `tunelink.toml` in the working directory). Every field has a
//! default so a minimal config only needs `media.music_dir`; parse
//! problems fall back to defaults with a logged error rather than
//! aborting, and [`Config::validate`] enforces the hard requirements
//! afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config filename, looked up in the working directory.
pub const DEFAULT_CONFIG_NAME: &str = "tunelink.toml";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener settings
    pub server: ServerConfig,

    /// Branding shown on preview pages
    pub site: SiteConfig,

    /// Media root and asset directories
    pub media: MediaConfig,

    /// Resolution pipeline settings
    pub resolver: ResolverConfig,

    /// Persistent cache settings
    pub cache: CacheConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Host to use when building absolute URLs (empty = derive from the
    /// request's forwarded/host headers)
    pub public_host: String,

    /// Serve raw audio and cover files directly (for testing; production
    /// deployments put a file server in front)
    pub serve_files: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 36900,
            public_host: String::new(),
            serve_files: false,
        }
    }
}

/// Branding shown on preview pages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Site name used in og:site_name
    pub name: String,

    /// Page title suffix
    pub page_title: String,

    /// Theme color meta tag
    pub theme_color: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Tunelink".to_string(),
            page_title: "Tunelink".to_string(),
            theme_color: "#F5A9B8".to_string(),
        }
    }
}

/// Media root and asset directories
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Local path of the music directory (required)
    pub music_dir: PathBuf,

    /// HTTP path the music directory is served under
    pub http_root: String,

    /// Local path of the resized cover directory
    pub cover_dir: PathBuf,

    /// HTTP path the cover directory is served under
    pub cover_http_root: String,

    /// Image shown when a file has no discoverable cover; a flat
    /// placeholder is synthesized when the file is absent
    pub default_cover_path: Option<PathBuf>,

    /// File extensions eligible for preview resolution (lowercase)
    pub accepted_extensions: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            music_dir: PathBuf::new(),
            http_root: "/".to_string(),
            cover_dir: PathBuf::from("cover"),
            cover_http_root: "/cover/".to_string(),
            default_cover_path: None,
            accepted_extensions: vec!["flac".to_string(), "mp3".to_string()],
        }
    }
}

/// Resolution pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Number of extraction workers
    pub workers: usize,

    /// Per-request resolution deadline in seconds
    pub timeout_secs: u64,

    /// Interval between periodic full rescans in seconds
    pub rescan_interval_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            timeout_secs: 2,
            rescan_interval_secs: 3600,
        }
    }
}

/// Persistent cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Path of the SQLite cache database
    pub db_path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("cache.db"),
        }
    }
}

impl Config {
    /// Load configuration from disk.
    ///
    /// Returns defaults if the file doesn't exist or can't be parsed.
    /// Logs problems but doesn't fail - validation happens separately.
    pub fn load(path: Option<&Path>) -> Config {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_NAME));

        if !path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", path);
            return Config::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    tracing::error!("Failed to parse config file {:?}: {}", path, e);
                    tracing::warn!("Using default configuration");
                    Config::default()
                }
            },
            Err(e) => {
                tracing::error!("Failed to read config file {:?}: {}", path, e);
                Config::default()
            }
        }
    }

    /// Check the hard requirements a running server needs.
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        if self.media.music_dir.as_os_str().is_empty() {
            return Err(crate::error::Error::config("media.music_dir is not set"));
        }
        if !self.media.music_dir.is_dir() {
            return Err(crate::error::Error::config(format!(
                "media.music_dir {:?} is not a directory",
                self.media.music_dir
            )));
        }
        if self.resolver.workers == 0 {
            return Err(crate::error::Error::config("resolver.workers must be >= 1"));
        }
        Ok(())
    }

    /// Per-request resolution deadline.
    pub fn resolve_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.resolver.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[server]"));
        assert!(toml.contains("[site]"));
        assert!(toml.contains("[media]"));
        assert!(toml.contains("[resolver]"));
        assert!(toml.contains("[cache]"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.server.port = 8080;
        config.media.music_dir = PathBuf::from("/srv/music");
        config.resolver.workers = 2;

        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();

        assert_eq!(parsed.server.port, 8080);
        assert_eq!(parsed.media.music_dir, PathBuf::from("/srv/music"));
        assert_eq!(parsed.resolver.workers, 2);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        // Config with only some fields
        let toml = r#"
[media]
music_dir = "/srv/music"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.media.music_dir, PathBuf::from("/srv/music"));

        // Other fields use defaults
        assert_eq!(config.server.port, 36900);
        assert_eq!(config.site.theme_color, "#F5A9B8");
        assert_eq!(config.media.accepted_extensions, vec!["flac", "mp3"]);
        assert_eq!(config.resolver.timeout_secs, 2);
    }

    #[test]
    fn test_validate_requires_music_dir() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.media.music_dir = dir.path().to_path_buf();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.media.music_dir = dir.path().to_path_buf();
        config.resolver.workers = 0;
        assert!(config.validate().is_err());
    }
}
