use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub layout: LayoutConfig,
    pub history: HistoryConfig,
    pub session: SessionConfig,
    pub backend: BackendConfig,
    pub keybindings: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Identity of this client; selects which saved layout record is used.
    pub client_id: String,
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Smallest width/height (px) a pane may be given.
    pub min_pane_size: f32,
    /// Split ratio in percent given to the first pane of a new split.
    pub default_ratio: f32,
    /// `split_pane` is accepted while the layout holds at most this many panes.
    pub max_split_panes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_entries: usize,
    pub max_chars: usize,
    /// 0 disables age-based eviction.
    pub max_age_secs: u64,
    pub key_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cols: u16,
    pub rows: u16,
    pub mode: String,
    pub redirect_delay_ms: u64,
    pub resize_debounce_ms: u64,
    /// Number of trailing buffer lines published to the buffer observer (0 = all).
    pub buffer_snapshot_lines: usize,
    /// Cap (chars) on output held back while the widget is not ready, and on
    /// an unterminated output line.
    pub max_pending_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub socket_path: String,
}

impl Config {
    /// Load config from default path (~/.config/panedeck/config.toml)
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn config_dir() -> PathBuf {
        ProjectDirs::from("", "", "panedeck")
            .map(|d| d.config_dir().to_path_buf())
            .unwrap_or_else(|| dirs_fallback().join(".panedeck"))
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Directory backing the file store (layout + history records).
    pub fn data_dir(&self) -> PathBuf {
        if !self.general.data_dir.is_empty() {
            return PathBuf::from(&self.general.data_dir);
        }
        ProjectDirs::from("", "", "panedeck")
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| dirs_fallback().join(".panedeck").join("data"))
    }

    pub fn socket_path(&self) -> PathBuf {
        if !self.backend.socket_path.is_empty() {
            return PathBuf::from(&self.backend.socket_path);
        }
        Self::config_dir().join("panedeck.sock")
    }

    /// Storage key of the saved layout for this client.
    pub fn layout_key(&self) -> String {
        format!("pane_layout_{}", self.general.client_id)
    }
}

fn dirs_fallback() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            layout: LayoutConfig::default(),
            history: HistoryConfig::default(),
            session: SessionConfig::default(),
            backend: BackendConfig::default(),
            keybindings: default_keybindings(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            client_id: "default".to_string(),
            data_dir: String::new(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_pane_size: 100.0,
            default_ratio: 50.0,
            max_split_panes: 2,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: 5000,
            max_chars: 500_000,
            max_age_secs: 7 * 24 * 60 * 60,
            key_prefix: "terminal_history_".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cols: 80,
            rows: 24,
            mode: "terminal".to_string(),
            redirect_delay_ms: 1500,
            resize_debounce_ms: 100,
            buffer_snapshot_lines: 0,
            max_pending_chars: 500_000,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            socket_path: String::new(),
        }
    }
}

pub fn default_keybindings() -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert("alt+ArrowUp".into(), "focus-up".into());
    m.insert("alt+ArrowDown".into(), "focus-down".into());
    m.insert("alt+ArrowLeft".into(), "focus-left".into());
    m.insert("alt+ArrowRight".into(), "focus-right".into());
    m.insert("ctrl+shift+D".into(), "split-vertical".into());
    m.insert("ctrl+shift+E".into(), "split-horizontal".into());
    m.insert("ctrl+shift+W".into(), "close-pane".into());
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [history]
            max_entries = 10

            [layout]
            min_pane_size = 50.0
            "#,
        )
        .unwrap();
        assert_eq!(config.history.max_entries, 10);
        assert_eq!(config.history.max_chars, 500_000);
        assert!((config.layout.min_pane_size - 50.0).abs() < f32::EPSILON);
        assert_eq!(config.session.cols, 80);
        assert_eq!(config.keybindings.len(), 7);
    }

    #[test]
    fn layout_key_uses_client_id() {
        let mut config = Config::default();
        config.general.client_id = "laptop".into();
        assert_eq!(config.layout_key(), "pane_layout_laptop");
    }

    #[test]
    fn explicit_paths_win() {
        let mut config = Config::default();
        config.general.data_dir = "/tmp/deck".into();
        config.backend.socket_path = "/tmp/deck.sock".into();
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/deck"));
        assert_eq!(config.socket_path(), PathBuf::from("/tmp/deck.sock"));
    }
}
