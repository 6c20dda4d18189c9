//! # Configuration
//!
//! Manages the loading and parsing of the application's configuration file (`config.yaml`).
//! Defines the structs for the chat service, the bridge itself, console transports
//! and the optional marker/presence features.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main application configuration structure.
/// Matches the layout of `data/config.yaml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub services: ServicesConfig,
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub docker: DockerConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub whitelist: WhitelistConfig,
    #[serde(default)]
    pub markers: MarkersConfig,
    #[serde(default)]
    pub status: StatusConfig,
}

/// Configuration for various connected services.
#[derive(Debug, Deserialize, Clone)]
pub struct ServicesConfig {
    pub matrix: MatrixConfig,
}

/// Specific configuration for the Matrix service.
#[derive(Debug, Deserialize, Clone)]
pub struct MatrixConfig {
    pub username: String,
    pub password: String,
    pub homeserver: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    /// Room relayed to and from the in-game chat.
    pub chat_room: String,
    /// Room accepting admin commands.
    pub admin_room: String,
    /// Room accepting marker commands (defaults to the chat room).
    #[serde(default)]
    pub markers_room: Option<String>,
    #[serde(default = "default_container_label")]
    pub container_label: String,
    /// Go style duration, e.g. `1h` or `45m30s`.
    #[serde(default)]
    pub inactivity_timeout: Option<String>,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Users allowed to run admin commands. Empty means anyone in the admin room.
    #[serde(default)]
    pub admins: Vec<String>,
}

impl BridgeConfig {
    pub fn markers_room(&self) -> &str {
        self.markers_room.as_deref().unwrap_or(&self.chat_room)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs.max(1))
    }

    /// Inactivity timeout, falling back to one hour when unset, zero or unparsable.
    pub fn inactivity_timeout(&self) -> Duration {
        match self.inactivity_timeout.as_deref().map(parse_duration) {
            Some(Some(d)) if !d.is_zero() => d,
            _ => {
                tracing::info!("{}", crate::strings::logs::DEFAULT_INACTIVITY);
                DEFAULT_INACTIVITY
            }
        }
    }
}

pub const DEFAULT_INACTIVITY: Duration = Duration::from_secs(60 * 60);

fn default_container_label() -> String {
    "com.mc2discord.is_server".to_string()
}

fn default_read_timeout() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleTransportKind {
    #[default]
    Exec,
    Rcon,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConsoleConfig {
    /// CLI tool invoked inside the container for exec based commands.
    #[serde(default = "default_console_tool")]
    pub tool: String,
    #[serde(default)]
    pub transport: ConsoleTransportKind,
    #[serde(default = "default_read_timeout")]
    pub exec_timeout_secs: u64,
    #[serde(default)]
    pub rcon: Option<RconConfig>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            tool: default_console_tool(),
            transport: ConsoleTransportKind::default(),
            exec_timeout_secs: default_read_timeout(),
            rcon: None,
        }
    }
}

fn default_console_tool() -> String {
    "rcon-cli".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RconConfig {
    /// `host:port` of the remote console.
    pub address: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DockerConfig {
    #[serde(default = "default_docker_socket")]
    pub socket: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            socket: default_docker_socket(),
        }
    }
}

fn default_docker_socket() -> String {
    "/var/run/docker.sock".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfirmationConfig {
    #[serde(default = "default_affirm")]
    pub affirm: String,
    #[serde(default = "default_deny")]
    pub deny: String,
    #[serde(default = "default_quorum")]
    pub quorum: usize,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            affirm: default_affirm(),
            deny: default_deny(),
            quorum: default_quorum(),
            attempts: default_attempts(),
            interval_ms: default_interval_ms(),
        }
    }
}

fn default_affirm() -> String {
    "✅".to_string()
}
fn default_deny() -> String {
    "❌".to_string()
}
fn default_quorum() -> usize {
    2
}
fn default_attempts() -> u32 {
    15
}
fn default_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct WhitelistConfig {
    /// Require a confirmation vote for `add` and `remove`.
    #[serde(default)]
    pub gated: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MarkerStoreKind {
    #[default]
    File,
    Panel,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarkersConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub store: MarkerStoreKind,
    #[serde(default = "default_markers_file")]
    pub file: String,
    #[serde(default)]
    pub panel: Option<PanelConfig>,
    #[serde(default = "default_max_markers")]
    pub max_per_player: usize,
}

impl Default for MarkersConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            store: MarkerStoreKind::default(),
            file: default_markers_file(),
            panel: None,
            max_per_player: default_max_markers(),
        }
    }
}

fn default_markers_file() -> String {
    "/mc/plugins/dynmap/markers.yml".to_string()
}

fn default_max_markers() -> usize {
    5
}

/// Game panel API used to read the marker file remotely.
#[derive(Debug, Deserialize, Clone)]
pub struct PanelConfig {
    pub base_url: String,
    pub api_key: String,
    pub server_id: String,
    #[serde(default = "default_panel_file")]
    pub file: String,
}

fn default_panel_file() -> String {
    "/plugins/dynmap/markers.yml".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatusConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_game_port")]
    pub port: u16,
    #[serde(default = "default_status_interval")]
    pub interval_secs: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: default_game_port(),
            interval_secs: default_status_interval(),
        }
    }
}

fn default_game_port() -> u16 {
    25565
}

fn default_status_interval() -> u64 {
    15
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("{} ({})", crate::strings::logs::CONFIG_READ_ERROR, path.display()))?;
        let mut config: AppConfig =
            serde_yaml::from_str(&content).context(crate::strings::logs::CONFIG_PARSE_ERROR)?;
        config.apply_env();
        Ok(config)
    }

    /// Environment variables win over the file.
    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("INACTIVITY_DURATION") {
            self.bridge.inactivity_timeout = Some(v);
        }
        if let Ok(host) = std::env::var("DOCKER_HOST")
            && let Some(socket) = host.strip_prefix("unix://")
        {
            self.docker.socket = socket.to_string();
        }
    }
}

/// Parses Go style durations (`1h30m`, `90s`, `250ms`, `1.5h`).
pub fn parse_duration(input: &str) -> Option<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    if s == "0" {
        return Some(Duration::ZERO);
    }

    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if num_len == 0 {
            return None;
        }
        let value: f64 = rest[..num_len].parse().ok()?;
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds_per_unit = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total += value * seconds_per_unit;
    }

    Duration::try_from_secs_f64(total).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
services:
  matrix:
    username: bridge
    password: secret
    homeserver: https://matrix.example.org
bridge:
  chat_room: "!chat:example.org"
  admin_room: "!admin:example.org"
"#;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("1h30m"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration("90s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("1.5h"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_duration("0"), Some(Duration::ZERO));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("5d"), None);
        assert_eq!(parse_duration("99999999999999999999h"), None);
    }

    #[test]
    fn test_defaults_applied() {
        let config: AppConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.bridge.container_label, "com.mc2discord.is_server");
        assert_eq!(config.bridge.read_timeout(), Duration::from_secs(5));
        assert_eq!(config.bridge.markers_room(), "!chat:example.org");
        assert_eq!(config.console.tool, "rcon-cli");
        assert_eq!(config.console.transport, ConsoleTransportKind::Exec);
        assert_eq!(config.confirmation.quorum, 2);
        assert_eq!(config.confirmation.attempts, 15);
        assert_eq!(config.confirmation.interval_ms, 1000);
        assert!(!config.whitelist.gated);
        assert_eq!(config.markers.max_per_player, 5);
        assert_eq!(config.docker.socket, "/var/run/docker.sock");
    }

    #[test]
    fn test_inactivity_fallback() {
        let mut config: AppConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.bridge.inactivity_timeout(), DEFAULT_INACTIVITY);

        config.bridge.inactivity_timeout = Some("not a duration".into());
        assert_eq!(config.bridge.inactivity_timeout(), DEFAULT_INACTIVITY);

        config.bridge.inactivity_timeout = Some("0s".into());
        assert_eq!(config.bridge.inactivity_timeout(), DEFAULT_INACTIVITY);

        config.bridge.inactivity_timeout = Some("99999999999999999999h".into());
        assert_eq!(config.bridge.inactivity_timeout(), DEFAULT_INACTIVITY);

        config.bridge.inactivity_timeout = Some("20m".into());
        assert_eq!(config.bridge.inactivity_timeout(), Duration::from_secs(1200));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{MINIMAL}console:\n  transport: rcon\n  rcon:\n    address: 127.0.0.1:25575\n    password: pw\nwhitelist:\n  gated: true\n"
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.console.transport, ConsoleTransportKind::Rcon);
        assert_eq!(config.console.rcon.unwrap().address, "127.0.0.1:25575");
        assert!(config.whitelist.gated);
    }
}
