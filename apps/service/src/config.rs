use std::time::Duration;
use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notification::{DispatcherSettings, SmtpSettings};
use crate::orchestrator::{EngineSettings, RetentionPolicy};

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: std::io::Error },
    #[error("failed to write config {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: std::io::Error },
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config path available: neither XDG_CONFIG_HOME nor HOME is set")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorConfig,
    pub storage: StorageConfig,
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub probe_timeout_seconds: u64,
    pub result_buffer: usize,
    pub history_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: path::PathBuf,
    pub retention_days: i64,
    pub max_samples_per_target: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub throttle_minutes: u64,
    pub queue_capacity: usize,
    pub delivery_timeout_seconds: u64,
    pub delivery_workers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp: Option<SmtpSettings>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { probe_timeout_seconds: 30, result_buffer: 1000, history_buffer: 1000 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { database_path: "uppe.db".into(), retention_days: 30, max_samples_per_target: 1000 }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            throttle_minutes: 5,
            queue_capacity: 100,
            delivery_timeout_seconds: 30,
            delivery_workers: 4,
            smtp: None,
        }
    }
}

impl NotificationsConfig {
    pub fn dispatcher_settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            throttle_window: Duration::from_secs(self.throttle_minutes * 60),
            queue_capacity: self.queue_capacity,
            delivery_timeout: Duration::from_secs(self.delivery_timeout_seconds),
            delivery_workers: self.delivery_workers,
        }
    }

    /// SMTP settings, if mail is usable at all
    pub fn smtp(&self) -> Option<&SmtpSettings> {
        self.smtp.as_ref().filter(|smtp| smtp.is_configured())
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/uppe/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("uppe/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Configuration:")?;

        write_title_1(f, "Monitor")?;
        write_1(f, "Probe Timeout (s)", &self.monitor.probe_timeout_seconds)?;
        write_1(f, "Result Buffer", &self.monitor.result_buffer)?;
        write_1(f, "History Buffer", &self.monitor.history_buffer)?;

        write_title_1(f, "Storage")?;
        write_1(f, "Database", &self.storage.database_path.display())?;
        write_1(f, "Retention (days)", &self.storage.retention_days)?;
        write_1(f, "Samples per Target", &self.storage.max_samples_per_target)?;

        write_title_1(f, "Notifications")?;
        write_1(f, "Throttle (min)", &self.notifications.throttle_minutes)?;
        write_1(f, "Queue Capacity", &self.notifications.queue_capacity)?;
        write_1(f, "Delivery Timeout (s)", &self.notifications.delivery_timeout_seconds)?;
        write_1(f, "Delivery Workers", &self.notifications.delivery_workers)?;
        match self.notifications.smtp() {
            Some(smtp) => {
                let server = format!("{}:{} as {}", smtp.host, smtp.port, smtp.username);
                write_1(f, "SMTP", &server)?;
                write_1(f, "From", &smtp.from_address)?;
            }
            None => write_1(f, "SMTP", &"not configured")?,
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/uppe/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```no_run
    /// use std::path;
    /// let cfg = uppe_watch::config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// # Ok::<(), uppe_watch::config::Error>(())
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;
        let write_failed = |source| Error::WriteFailed { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        fs::write(path, config_str).map_err(write_failed)
    }

    /// Pipeline settings derived from this configuration
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            result_buffer: self.monitor.result_buffer,
            history_buffer: self.monitor.history_buffer,
            dispatcher: self.notifications.dispatcher_settings(),
            retention: RetentionPolicy { history_days: self.storage.retention_days },
            ..EngineSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config");

        let config = Config::from_config(Some(&path)).unwrap();
        assert_eq!(config.monitor.probe_timeout_seconds, 30);
        assert!(dir.path().join("nested/config.toml").exists());

        // Reading the written file gives the same values back
        let again = Config::from_config(Some(&path)).unwrap();
        assert_eq!(again.storage.database_path, path::PathBuf::from("uppe.db"));
        assert!(again.notifications.smtp.is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[notifications]
throttle_minutes = 10

[notifications.smtp]
host = "smtp.example.com"
username = "alerts"
password = "secret"
from_address = "alerts@example.com"
"#,
        )
        .unwrap();

        let config = Config::from_config(Some(&path)).unwrap();
        let settings = config.engine_settings();

        assert_eq!(settings.dispatcher.throttle_window, Duration::from_secs(600));
        assert_eq!(settings.dispatcher.queue_capacity, 100);
        assert_eq!(settings.retention.history_days, 30);
        assert_eq!(config.notifications.smtp().unwrap().port, 587);
    }

    #[test]
    fn test_invalid_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[monitor\nprobe_timeout_seconds = ").unwrap();

        assert!(matches!(Config::from_config(Some(&path)), Err(Error::ParseFailed(_))));
    }

    #[test]
    fn test_display_hides_password() {
        let mut config = Config::default();
        config.notifications.smtp = Some(SmtpSettings {
            host: "smtp.example.com".into(),
            port: 2525,
            username: "alerts".into(),
            password: "hunter2".into(),
            from_address: "alerts@example.com".into(),
        });

        let shown = config.to_string();
        assert!(shown.contains("smtp.example.com:2525 as alerts"));
        assert!(!shown.contains("hunter2"));
    }
}
