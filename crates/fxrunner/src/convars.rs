//! Convars derived from the configuration snapshot.
//!
//! The same list is used twice: as `+set`-style tokens on the command line at
//! boot, and as plain `set` commands sent to a running server when the
//! configuration changes.

use fxrunner_contracts::CONVAR_PREFIX;

use crate::config::{ServerConfig, DEFAULT_LANGUAGE, DEFAULT_SERVER_NAME};
use crate::console::CommandSink;
use crate::console_args::ConsoleArg;
use crate::SupervisorError;

/// Engine convars transmitted under their own name. Everything else is ours
/// and gets [`CONVAR_PREFIX`].
pub const NATIVE_CONVARS: &[&str] = &[
    "sv_enforceGameBuild",
    "sv_replaceExeToSwitchBuilds",
    "sv_pureLevel",
    "sv_enableNetworkedSounds",
    "sv_enableNetworkedPhoneExplosions",
    "sv_enableNetworkedScriptEntityStates",
    "sv_experimentalStateBagsHandler",
    "sv_experimentalOnesyncPopulation",
    "sv_experimentalNetGameEventHandler",
    "sv_endpointPrivacy",
    "sv_httpFileServerProxyOnly",
    "sv_stateBagStrictMode",
    "sv_protectServerEntities",
    "sv_tebexSecret",
    "sv_playersToken",
    "sv_profileDataToken",
    "sv_listingIpOverride",
    "sv_listingHostOverride",
    "sv_endpoints",
    "sv_useAccurateSends",
    "steam_webApiKey",
    "steam_webApiDomain",
    "onesync_logFile",
    "onesync_automaticResend",
    "increase_pool_size",
    "block_net_game_event",
    "locale",
];

/// Configuration paths whose change requires the convars to be recomputed.
pub const CONVAR_CONFIG_DEPENDENCIES: &[&str] = &[
    "general.*",
    "gameFeatures.*",
    "banlist.enabled",
    "whitelist.mode",
    "fxserver.*",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvarNamePolicy {
    prefix: &'static str,
    native: &'static [&'static str],
}

impl Default for ConvarNamePolicy {
    fn default() -> Self {
        Self {
            prefix: CONVAR_PREFIX,
            native: NATIVE_CONVARS,
        }
    }
}

impl ConvarNamePolicy {
    pub fn new(prefix: &'static str, native: &'static [&'static str]) -> Self {
        Self { prefix, native }
    }

    pub fn is_native(&self, name: &str) -> bool {
        self.native.contains(&name)
    }

    pub fn transmitted_name(&self, name: &str) -> String {
        if self.is_native(name) {
            name.to_string()
        } else {
            format!("{}{name}", self.prefix)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setter {
    Set,
    /// Replicated to clients.
    Setr,
    /// Listed in server info.
    Sets,
}

impl Setter {
    pub fn as_str(self) -> &'static str {
        match self {
            Setter::Set => "set",
            Setter::Setr => "setr",
            Setter::Sets => "sets",
        }
    }

    pub fn boot_str(self) -> &'static str {
        match self {
            Setter::Set => "+set",
            Setter::Setr => "+setr",
            Setter::Sets => "+sets",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvarMode {
    /// Console commands for a running server.
    Runtime,
    /// Command-line tokens applied during the server's own startup.
    Boot,
}

/// One convar line, with the name already passed through the naming policy
/// and the value rendered to text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Convar {
    pub setter: Setter,
    pub name: String,
    pub value: String,
}

impl Convar {
    pub fn setter_str(&self, mode: ConvarMode) -> &'static str {
        match mode {
            ConvarMode::Runtime => self.setter.as_str(),
            ConvarMode::Boot => self.setter.boot_str(),
        }
    }

    pub fn to_tuple(&self, mode: ConvarMode) -> [String; 3] {
        [
            self.setter_str(mode).to_string(),
            self.name.clone(),
            self.value.clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RawValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl RawValue {
    fn render(&self) -> String {
        match self {
            RawValue::Bool(b) => b.to_string(),
            RawValue::Int(n) => n.to_string(),
            RawValue::Text(s) => s.clone(),
        }
    }
}

impl From<bool> for RawValue {
    fn from(v: bool) -> Self {
        RawValue::Bool(v)
    }
}

impl From<u8> for RawValue {
    fn from(v: u8) -> Self {
        RawValue::Int(i64::from(v))
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        RawValue::Text(v)
    }
}

impl From<&String> for RawValue {
    fn from(v: &String) -> Self {
        RawValue::Text(v.clone())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConvarPlanner {
    policy: ConvarNamePolicy,
}

impl ConvarPlanner {
    pub fn new(policy: ConvarNamePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ConvarNamePolicy {
        &self.policy
    }

    pub fn plan(&self, cfg: &ServerConfig) -> Vec<Convar> {
        let mut out = ConvarList {
            policy: &self.policy,
            items: Vec::with_capacity(48),
        };
        let gf = &cfg.game_features;
        let fx = &cfg.fxserver;

        out.push(
            Setter::Setr,
            "locale",
            Some(cfg.general.language.as_deref().unwrap_or(DEFAULT_LANGUAGE).to_string()),
        );
        out.push(
            Setter::Set,
            "serverName",
            Some(
                cfg.general
                    .server_name
                    .as_deref()
                    .unwrap_or(DEFAULT_SERVER_NAME)
                    .to_string(),
            ),
        );
        out.push(Setter::Set, "checkPlayerJoin", Some(cfg.check_player_join()));
        out.push(Setter::Set, "menuAlignRight", Some(gf.menu_align_right));
        out.push(Setter::Set, "menuPageKey", Some(&gf.menu_page_key));
        out.push(Setter::Set, "playerModePtfx", Some(gf.player_mode_ptfx));
        out.push(Setter::Set, "hideAdminInPunishments", Some(gf.hide_admin_in_punishments));
        out.push(Setter::Set, "hideAdminInMessages", Some(gf.hide_admin_in_messages));
        out.push(Setter::Set, "hideDefaultAnnouncement", Some(gf.hide_default_announcement));
        out.push(Setter::Set, "hideDefaultDirectMessage", Some(gf.hide_default_direct_message));
        out.push(Setter::Set, "hideDefaultWarning", Some(gf.hide_default_warning));
        out.push(
            Setter::Set,
            "hideDefaultScheduledRestartWarning",
            Some(gf.hide_default_scheduled_restart_warning),
        );

        out.push(Setter::Set, "sv_enforceGameBuild", fx.enforce_game_build.as_ref());
        out.push(Setter::Set, "sv_replaceExeToSwitchBuilds", fx.replace_exe_to_switch_builds);
        out.push(Setter::Set, "sv_pureLevel", fx.pure_level);
        out.push(Setter::Set, "sv_enableNetworkedSounds", fx.enable_networked_sounds);
        out.push(
            Setter::Set,
            "sv_enableNetworkedPhoneExplosions",
            fx.enable_networked_phone_explosions,
        );
        out.push(
            Setter::Set,
            "sv_enableNetworkedScriptEntityStates",
            fx.enable_networked_script_entity_states,
        );
        out.push(
            Setter::Set,
            "sv_experimentalStateBagsHandler",
            fx.experimental_state_bags_handler,
        );
        out.push(
            Setter::Set,
            "sv_experimentalOnesyncPopulation",
            fx.experimental_onesync_population,
        );
        out.push(
            Setter::Set,
            "sv_experimentalNetGameEventHandler",
            fx.experimental_net_game_event_handler,
        );

        // The pool name is quoted: it is a console token of its own.
        for pool in &fx.pool_sizes {
            out.push(
                Setter::Set,
                "increase_pool_size",
                Some(format!("\"{}\" {}", pool.pool_name, pool.increase)),
            );
        }

        out.push(Setter::Set, "sv_endpointPrivacy", fx.endpoint_privacy);
        out.push(Setter::Set, "sv_httpFileServerProxyOnly", fx.http_file_server_proxy_only);
        out.push(Setter::Set, "sv_stateBagStrictMode", fx.state_bag_strict_mode);
        out.push(Setter::Set, "sv_protectServerEntities", fx.protect_server_entities);
        out.push(Setter::Set, "steam_webApiKey", fx.steam_web_api_key.as_ref());
        out.push(Setter::Set, "steam_webApiDomain", fx.steam_web_api_domain.as_ref());
        out.push(Setter::Set, "sv_tebexSecret", fx.tebex_secret.as_ref());
        out.push(Setter::Set, "sv_playersToken", fx.players_token.as_ref());
        out.push(Setter::Set, "sv_profileDataToken", fx.profile_data_token.as_ref());
        out.push(Setter::Set, "sv_listingIpOverride", fx.listing_ip_override.as_ref());
        out.push(Setter::Set, "sv_listingHostOverride", fx.listing_host_override.as_ref());
        out.push(Setter::Set, "sv_endpoints", fx.endpoints.as_ref());
        out.push(Setter::Set, "onesync_logFile", fx.onesync_log_file.as_ref());
        out.push(Setter::Set, "onesync_automaticResend", fx.onesync_automatic_resend);
        out.push(Setter::Set, "sv_useAccurateSends", fx.use_accurate_sends);

        for event in &fx.blocked_net_game_events {
            out.push(Setter::Set, "block_net_game_event", Some(event));
        }

        out.items
    }

    pub fn plan_tuples(&self, cfg: &ServerConfig, mode: ConvarMode) -> Vec<[String; 3]> {
        self.plan(cfg).iter().map(|c| c.to_tuple(mode)).collect()
    }
}

struct ConvarList<'a> {
    policy: &'a ConvarNamePolicy,
    items: Vec<Convar>,
}

impl ConvarList<'_> {
    fn push<V: Into<RawValue>>(&mut self, setter: Setter, name: &str, value: Option<V>) {
        let Some(value) = value else { return };
        self.items.push(Convar {
            setter,
            name: self.policy.transmitted_name(name),
            value: value.into().render(),
        });
    }
}

/// Whether a change at `path` (dotted, e.g. `fxserver.pureLevel`) requires the
/// convars to be recomputed.
pub fn affects_convars(path: &str) -> bool {
    CONVAR_CONFIG_DEPENDENCIES.iter().any(|dep| match dep.strip_suffix(".*") {
        Some(section) => path == section || path.strip_prefix(section).is_some_and(|r| r.starts_with('.')),
        None => path == *dep,
    })
}

/// Entries of `next` that the server has not already received verbatim.
pub fn changed_convars(previous: &[Convar], next: &[Convar]) -> Vec<Convar> {
    next.iter()
        .filter(|c| !previous.contains(c))
        .cloned()
        .collect()
}

/// Sends runtime convars one command each. Stops at the first failure.
pub fn apply_convars<S: CommandSink + ?Sized>(
    sink: &S,
    convars: &[Convar],
    author: &str,
) -> Result<usize, SupervisorError> {
    for convar in convars {
        let args = [
            ConsoleArg::Str(convar.name.clone()),
            ConsoleArg::Str(convar.value.clone()),
        ];
        sink.send_command(convar.setter.as_str(), &args, author)?;
    }
    Ok(convars.len())
}
