//! Configuration management for Lab Photo Server

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;
use thiserror::Error;

use crate::upload::{SessionPolicy, IMAGE_SIZE};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub storage: StorageConfig,
    pub gallery: GalleryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    /// Raw TCP port for the upload protocol
    pub image_port: u16,
    /// HTTP port for the gallery
    pub web_port: u16,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Artificial pause between reading the id and the payload
    pub delay: Duration,
    /// Per-read deadline; `None` waits forever
    pub read_timeout: Option<Duration>,
    pub image_size: usize,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct GalleryConfig {
    /// Zone capture times are shown in; `None` uses the host's local zone
    pub utc_offset: Option<FixedOffset>,
}

#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// When set, logs are also written to a daily-rotated file here
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    InvalidValue {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                image_port: 2240,
                web_port: 2241,
            },
            upload: UploadConfig {
                delay: Duration::ZERO,
                read_timeout: None,
                image_size: IMAGE_SIZE,
            },
            storage: StorageConfig {
                root: PathBuf::from("photos"),
            },
            gallery: GalleryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                image_port: parse_var("IMAGE_SERVER_PORT", "a port number")?
                    .unwrap_or(defaults.server.image_port),
                web_port: parse_var("WEB_SERVER_PORT", "a port number")?
                    .unwrap_or(defaults.server.web_port),
            },
            upload: UploadConfig {
                delay: parse_var::<u64>("UPLOAD_DELAY_SECS", "a whole number of seconds")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.upload.delay),
                read_timeout: read_timeout_from_secs(parse_var(
                    "UPLOAD_READ_TIMEOUT_SECS",
                    "a whole number of seconds",
                )?),
                image_size: parse_var("UPLOAD_IMAGE_SIZE", "a byte count")?
                    .unwrap_or(defaults.upload.image_size),
            },
            storage: StorageConfig {
                root: env::var("PHOTO_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.root),
            },
            gallery: GalleryConfig {
                utc_offset: parse_var("GALLERY_UTC_OFFSET", "an offset like -07:00")?,
            },
            logging: LoggingConfig {
                directory: env::var("LOG_DIR").ok().map(PathBuf::from),
            },
        })
    }

    /// Session behaviour handed to every upload connection
    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            delay: self.upload.delay,
            read_timeout: self.upload.read_timeout,
            image_size: self.upload.image_size,
        }
    }
}

/// Zero seconds means no deadline, the same way a zero delay means no delay
fn read_timeout_from_secs(secs: Option<u64>) -> Option<Duration> {
    secs.filter(|secs| *secs > 0).map(Duration::from_secs)
}

/// Read and parse an optional environment variable. Unset or empty means `None`.
fn parse_var<T: std::str::FromStr>(
    name: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                name,
                expected,
                value,
            }),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol() {
        let config = Config::default();
        assert_eq!(config.server.image_port, 2240);
        assert_eq!(config.server.web_port, 2241);
        assert_eq!(config.upload.delay, Duration::ZERO);
        assert!(config.upload.read_timeout.is_none());
        assert_eq!(config.upload.image_size, 49206);
        assert_eq!(config.storage.root, PathBuf::from("photos"));
    }

    #[test]
    fn test_session_policy_mirrors_upload_config() {
        let mut config = Config::default();
        config.upload.delay = Duration::from_secs(3);
        config.upload.read_timeout = Some(Duration::from_secs(10));

        let policy = config.session_policy();
        assert_eq!(policy.delay, Duration::from_secs(3));
        assert_eq!(policy.read_timeout, Some(Duration::from_secs(10)));
        assert_eq!(policy.image_size, IMAGE_SIZE);
    }

    #[test]
    fn test_zero_read_timeout_is_unbounded() {
        assert_eq!(read_timeout_from_secs(Some(0)), None);
        assert_eq!(read_timeout_from_secs(None), None);
        assert_eq!(read_timeout_from_secs(Some(15)), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_gallery_offset_parses() {
        env::set_var("LPS_TEST_GALLERY_OFFSET", "-07:00");
        let offset = parse_var::<FixedOffset>("LPS_TEST_GALLERY_OFFSET", "an offset")
            .unwrap()
            .unwrap();
        assert_eq!(offset.local_minus_utc(), -7 * 3600);

        env::set_var("LPS_TEST_GALLERY_OFFSET_BAD", "Mountain");
        let result = parse_var::<FixedOffset>("LPS_TEST_GALLERY_OFFSET_BAD", "an offset");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_parse_var_rejects_garbage() {
        // Variable names unique to this test so parallel tests don't race
        env::set_var("LPS_TEST_PORT_GARBAGE", "not-a-port");
        let result = parse_var::<u16>("LPS_TEST_PORT_GARBAGE", "a port number");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

        env::set_var("LPS_TEST_PORT_OK", " 8080 ");
        let result = parse_var::<u16>("LPS_TEST_PORT_OK", "a port number").unwrap();
        assert_eq!(result, Some(8080));

        let result = parse_var::<u16>("LPS_TEST_PORT_UNSET", "a port number").unwrap();
        assert_eq!(result, None);
    }
}
