mod child;
mod config;
mod console;
mod console_args;
mod convars;
mod error;
mod host;
mod report;
mod spawn_plan;

pub use child::{
    spawn_server, validate_child, InvalidHandle, RawProcessHandle, ServerHandle, StdioStream,
    EVENT_CHANNEL_FD,
};
pub use config::{
    BanlistConfig, FxServerConfig, GameFeatures, GeneralConfig, PoolSizeOverride, ServerConfig,
    ServerSection, WhitelistConfig, CUSTOM_LANGUAGE, DEFAULT_CFG_PATH, DEFAULT_LANGUAGE, DEFAULT_ONESYNC,
    DEFAULT_SERVER_NAME, WHITELIST_DISABLED,
};
pub use console::{CommandSink, ConsoleChannel};
pub use console_args::{encode_console_args, ConsoleArg, ConsoleArgEncoder};
pub use convars::{
    affects_convars, apply_convars, changed_convars, Convar, ConvarMode, ConvarNamePolicy,
    ConvarPlanner, Setter, CONVAR_CONFIG_DEPENDENCIES, NATIVE_CONVARS,
};
pub use error::SupervisorError;
pub use host::{HostConfig, SpawnTarget};
pub use report::{
    Freshness, MemoryReportCache, ReportCache, ReportCorrelator, ReportEntry, ReportKind,
    ReportOutcome, ReportResolution, DEFAULT_DEADLINE, DEFAULT_POLL_INTERVAL,
    DEFAULT_RESOURCES_MAX_AGE,
};
pub use spawn_plan::{
    log_spawn_plan, setup_custom_locale_file, SpawnPlan, SpawnPlanner, REDACTED, SECRET_CONVARS,
};
