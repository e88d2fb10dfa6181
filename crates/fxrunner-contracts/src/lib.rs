//! Shared, version-pinned identifiers for the server control channel.
//!
//! These constants are the single source of truth for names and markers that
//! cross the process boundary: convar naming, console escaping, and the
//! machine-readable output of the `fxrunner` tool.

pub const SPAWN_PLAN_SCHEMA_VERSION: &str = "fxrunner.spawn-plan@0.1.0";

/// Prefix applied to every convar not on the native allow-list.
pub const CONVAR_PREFIX: &str = "txAdmin-";

/// Stand-in for `;`, which the server console treats as a command separator.
pub const SEMICOLON_STANDIN: char = '\u{037e}';

pub const CONVAR_VERSION: &str = "txAdmin-version";
pub const CONVAR_MENU_ENABLED: &str = "txAdmin-menuEnabled";
pub const CONVAR_LUA_COM_HOST: &str = "txAdmin-luaComHost";
pub const CONVAR_LUA_COM_TOKEN: &str = "txAdmin-luaComToken";
pub const CONVAR_SERVER_MODE: &str = "txAdminServerMode";

pub const SYSTEM_AUTHOR: &str = "txAdmin";

pub const ENV_FXS_PATH: &str = "TXHOST_FXS_PATH";
pub const ENV_TXA_PORT: &str = "TXHOST_TXA_PORT";
pub const ENV_NET_INTERFACE: &str = "TXHOST_INTERFACE";
pub const ENV_LUA_COM_TOKEN: &str = "TXHOST_LUA_COM_TOKEN";

pub const DEFAULT_TXA_PORT: u16 = 40120;
pub const DEFAULT_LOOPBACK: &str = "127.0.0.1";
