//! Settings file handling.
//!
//! The daemon reads one TOML file (default `conf/chime.toml`) holding the
//! HTTP server parameters, the relay pin, and the persisted schedule. The
//! schedule lives in `[schedule]` as `ring_duration` plus one key per
//! trigger line, `cron0..cronN-1`. Schedule write-back goes through
//! [`Settings::persist_schedule`], which rewrites the `cron*` keys
//! wholesale while leaving the rest of the file untouched.

use crate::error::{BellError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Key prefix under which trigger lines are stored.
const TRIGGER_KEY_PREFIX: &str = "cron";

/// HTTP server parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Basic-auth user for the control API.
    pub admin_user: String,
    /// Basic-auth password for the control API.
    pub admin_password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8000,
            admin_user: "admin".to_owned(),
            admin_password: "password".to_owned(),
        }
    }
}

/// Relay output parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// BCM pin number driving the relay.
    pub pin: u8,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { pin: 23 }
    }
}

/// On-disk shape of the `[schedule]` section: a fixed `ring_duration` key
/// plus free-form `cronN` keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ScheduleSection {
    ring_duration: u64,
    #[serde(flatten)]
    entries: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct SettingsFile {
    server: ServerConfig,
    relay: RelayConfig,
    schedule: ScheduleSection,
}

/// Loaded daemon settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// HTTP server parameters.
    pub server: ServerConfig,
    /// Relay output parameters.
    pub relay: RelayConfig,
    /// Raw persisted trigger lines, in `cron0..cronN-1` order.
    pub trigger_lines: Vec<String>,
    /// Ring duration in seconds.
    pub ring_duration: u64,
}

impl Settings {
    /// Load settings from a TOML file. A missing or unparseable file is an
    /// error; the daemon cannot start without its settings.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BellError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let file: SettingsFile = toml::from_str(&content)
            .map_err(|e| BellError::Config(format!("cannot parse {}: {e}", path.display())))?;

        let mut keyed: Vec<(u32, String)> = Vec::new();
        for (key, value) in &file.schedule.entries {
            let Some(suffix) = key.strip_prefix(TRIGGER_KEY_PREFIX) else {
                continue;
            };
            let Ok(ordinal) = suffix.parse::<u32>() else {
                tracing::debug!(%key, "ignoring non-numeric trigger key");
                continue;
            };
            match value.as_str() {
                Some(line) => keyed.push((ordinal, line.to_owned())),
                None => tracing::debug!(%key, "ignoring non-string trigger value"),
            }
        }
        // BTreeMap iteration is lexicographic (cron10 before cron2); the
        // numeric suffix is the authoritative order.
        keyed.sort_by_key(|(ordinal, _)| *ordinal);

        Ok(Self {
            server: file.server,
            relay: file.relay,
            trigger_lines: keyed.into_iter().map(|(_, line)| line).collect(),
            ring_duration: file.schedule.ring_duration,
        })
    }

    /// Rewrite the persisted schedule: all existing `cron*` keys are
    /// removed, `cron0..cronN-1` are written from `lines`, and
    /// `ring_duration` is set. Every other part of the file survives
    /// untouched. Idempotent, last write wins.
    pub fn persist_schedule(path: &Path, lines: &[String], ring_duration: u64) -> Result<()> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BellError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut doc: toml_edit::DocumentMut = content
            .parse()
            .map_err(|e| BellError::Config(format!("cannot parse {}: {e}", path.display())))?;

        if doc.get("schedule").is_none() {
            doc["schedule"] = toml_edit::table();
        }
        let section = doc["schedule"]
            .as_table_mut()
            .ok_or_else(|| BellError::Config("[schedule] is not a table".to_owned()))?;

        let stale: Vec<String> = section
            .iter()
            .map(|(key, _)| key.to_owned())
            .filter(|key| key.starts_with(TRIGGER_KEY_PREFIX))
            .collect();
        for key in stale {
            section.remove(&key);
        }

        // TOML integers are i64; clamp so the written file stays loadable.
        let stored = i64::try_from(ring_duration).unwrap_or_else(|_| {
            tracing::warn!(ring_duration, "ring duration exceeds storable range; clamping");
            i64::MAX
        });
        section.insert("ring_duration", toml_edit::value(stored));
        for (i, line) in lines.iter().enumerate() {
            let key = format!("{TRIGGER_KEY_PREFIX}{i}");
            section.insert(&key, toml_edit::value(line.as_str()));
        }

        std::fs::write(path, doc.to_string()).map_err(|e| {
            BellError::Config(format!("cannot write {}: {e}", path.display()))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    const SAMPLE: &str = r#"
[server]
host = "127.0.0.1"
port = 8123
admin_user = "ops"
admin_password = "secret"

[relay]
pin = 17

[schedule]
ring_duration = 5
cron0 = "0 10 * * *"
cron1 = "10 10 * * *"
cron10 = "55 16 * * 1-5"
cron2 = "0 12 * * *"
"#;

    fn write_sample(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("chime.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        path
    }

    #[test]
    fn load_reads_server_relay_and_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path());

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 8123);
        assert_eq!(settings.server.admin_user, "ops");
        assert_eq!(settings.relay.pin, 17);
        assert_eq!(settings.ring_duration, 5);
    }

    #[test]
    fn trigger_lines_sorted_by_numeric_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path());

        let settings = Settings::load(&path).unwrap();
        assert_eq!(
            settings.trigger_lines,
            vec![
                "0 10 * * *",
                "10 10 * * *",
                "0 12 * * *",
                "55 16 * * 1-5",
            ]
        );
    }

    #[test]
    fn load_missing_file_is_an_error() {
        let result = Settings::load(Path::new("/nonexistent/chime.toml"));
        assert!(matches!(result, Err(BellError::Config(_))));
    }

    #[test]
    fn persist_replaces_cron_keys_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path());

        let lines = vec!["30 14 * * 6".to_owned()];
        Settings::persist_schedule(&path, &lines, 0).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.trigger_lines, vec!["30 14 * * 6"]);
        assert_eq!(settings.ring_duration, 0);
        // Sections outside [schedule] survive the rewrite.
        assert_eq!(settings.server.port, 8123);
        assert_eq!(settings.relay.pin, 17);

        // No stale higher-numbered keys remain in the raw file.
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("cron1"));
        assert!(!raw.contains("cron10"));
    }

    #[test]
    fn persist_clamps_duration_beyond_toml_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path());

        let lines = vec!["30 14 * * 6".to_owned()];
        Settings::persist_schedule(&path, &lines, u64::MAX).unwrap();

        // The written file must stay loadable on the next start.
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.ring_duration, i64::MAX as u64);
        assert_eq!(settings.trigger_lines, vec!["30 14 * * 6"]);
    }

    #[test]
    fn persist_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path());

        let lines = vec!["0 9 * * 0".to_owned(), "15 9 * * 0".to_owned()];
        Settings::persist_schedule(&path, &lines, 3).unwrap();
        Settings::persist_schedule(&path, &lines, 3).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.trigger_lines, lines);
        assert_eq!(settings.ring_duration, 3);
    }

    #[test]
    fn defaults_apply_for_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chime.toml");
        std::fs::write(&path, "[schedule]\nring_duration = 2\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.server.admin_user, "admin");
        assert_eq!(settings.relay.pin, 23);
        assert!(settings.trigger_lines.is_empty());
    }
}
