use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LANGUAGE: &str = "en";
/// Language value selecting the operator's own locale file.
pub const CUSTOM_LANGUAGE: &str = "custom";
pub const DEFAULT_SERVER_NAME: &str = "txAdmin";
pub const DEFAULT_CFG_PATH: &str = "server.cfg";
pub const DEFAULT_ONESYNC: &str = "on";
pub const WHITELIST_DISABLED: &str = "disabled";

/// Read-only, already validated configuration snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub general: GeneralConfig,
    pub server: ServerSection,
    pub game_features: GameFeatures,
    pub banlist: BanlistConfig,
    pub whitelist: WhitelistConfig,
    pub fxserver: FxServerConfig,
}

impl ServerConfig {
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("parse server config JSON")
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read server config: {}", path.display()))?;
        Self::from_json_slice(&bytes)
            .with_context(|| format!("load server config: {}", path.display()))
    }

    pub fn check_player_join(&self) -> bool {
        self.banlist.enabled || self.whitelist.mode != WHITELIST_DISABLED
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneralConfig {
    pub language: Option<String>,
    pub server_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerSection {
    pub data_path: Option<String>,
    pub cfg_path: String,
    pub startup_args: Vec<String>,
    pub onesync: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            data_path: None,
            cfg_path: DEFAULT_CFG_PATH.to_string(),
            startup_args: Vec::new(),
            onesync: DEFAULT_ONESYNC.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameFeatures {
    pub menu_enabled: bool,
    pub menu_align_right: bool,
    pub menu_page_key: String,
    pub player_mode_ptfx: bool,
    pub hide_admin_in_punishments: bool,
    pub hide_admin_in_messages: bool,
    pub hide_default_announcement: bool,
    pub hide_default_direct_message: bool,
    pub hide_default_warning: bool,
    pub hide_default_scheduled_restart_warning: bool,
}

impl Default for GameFeatures {
    fn default() -> Self {
        Self {
            menu_enabled: true,
            menu_align_right: false,
            menu_page_key: "Tab".to_string(),
            player_mode_ptfx: true,
            hide_admin_in_punishments: true,
            hide_admin_in_messages: false,
            hide_default_announcement: false,
            hide_default_direct_message: false,
            hide_default_warning: false,
            hide_default_scheduled_restart_warning: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BanlistConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WhitelistConfig {
    pub mode: String,
}

impl Default for WhitelistConfig {
    fn default() -> Self {
        Self {
            mode: WHITELIST_DISABLED.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSizeOverride {
    pub pool_name: String,
    pub increase: u64,
}

/// Engine knobs. `None` leaves the engine default in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FxServerConfig {
    pub enforce_game_build: Option<String>,
    pub replace_exe_to_switch_builds: Option<bool>,
    pub pure_level: Option<u8>,
    pub enable_networked_sounds: Option<bool>,
    pub enable_networked_phone_explosions: Option<bool>,
    pub enable_networked_script_entity_states: Option<bool>,
    pub experimental_state_bags_handler: Option<bool>,
    pub experimental_onesync_population: Option<bool>,
    pub experimental_net_game_event_handler: Option<bool>,
    pub pool_sizes: Vec<PoolSizeOverride>,
    pub endpoint_privacy: Option<bool>,
    pub http_file_server_proxy_only: Option<bool>,
    pub state_bag_strict_mode: Option<bool>,
    pub protect_server_entities: Option<bool>,
    pub steam_web_api_key: Option<String>,
    pub steam_web_api_domain: Option<String>,
    pub tebex_secret: Option<String>,
    pub players_token: Option<String>,
    pub profile_data_token: Option<String>,
    pub listing_ip_override: Option<String>,
    pub listing_host_override: Option<String>,
    pub endpoints: Option<String>,
    pub onesync_log_file: Option<String>,
    pub onesync_automatic_resend: Option<bool>,
    pub use_accurate_sends: Option<bool>,
    pub blocked_net_game_events: Vec<String>,
}
