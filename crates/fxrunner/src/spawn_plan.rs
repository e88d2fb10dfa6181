use std::path::{Component, Path, PathBuf};

use anyhow::Context as _;
use fxrunner_contracts::{
    CONVAR_LUA_COM_HOST, CONVAR_LUA_COM_TOKEN, CONVAR_MENU_ENABLED, CONVAR_SERVER_MODE,
    CONVAR_VERSION,
};
use serde::Serialize;

use crate::config::{ServerConfig, CUSTOM_LANGUAGE, DEFAULT_SERVER_NAME};
use crate::convars::{ConvarMode, ConvarPlanner};
use crate::host::{HostConfig, SpawnTarget};
use crate::SupervisorError;

pub const REDACTED: &str = "[REDACTED]";

/// Convars whose value must never reach a log.
pub const SECRET_CONVARS: &[&str] = &[
    CONVAR_LUA_COM_TOKEN,
    "sv_tebexSecret",
    "steam_webApiKey",
    "sv_playersToken",
    "sv_profileDataToken",
    "rcon_password",
    "sv_licenseKey",
];

const WINDOWS_EXE: &str = "FXServer.exe";
const MUSL_LOADER_REL: &str = "opt/cfx-server/ld-musl-x86_64.so.1";
const LINUX_BIN_REL: &str = "opt/cfx-server/FXServer";
const CITIZEN_DIR_REL: &str = "opt/cfx-server/citizen/";
const LIBRARY_DIRS_REL: &[&str] = &["usr/lib/v8/", "lib/", "usr/lib/"];
const RUNTIME_DIR: &str = ".runtime";
const RUNTIME_LOCALE_FILE: &str = "locale.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpawnPlan {
    pub executable: String,
    pub argv: Vec<String>,
    pub data_path: String,
    pub cfg_path: String,
    pub server_name: String,
}

impl SpawnPlan {
    /// argv with the value following each secret convar replaced.
    pub fn redacted_argv(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.argv.len());
        let mut iter = self.argv.iter().peekable();
        while let Some(arg) = iter.next() {
            out.push(arg.clone());
            if SECRET_CONVARS.contains(&arg.as_str()) && iter.next().is_some() {
                out.push(REDACTED.to_string());
            }
        }
        out
    }

    /// Redacted argv split into rows, a new row at every `+command`.
    pub fn arg_table(&self) -> Vec<Vec<String>> {
        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut current: Option<Vec<String>> = None;
        for arg in self.redacted_argv() {
            if arg.starts_with('+') {
                if let Some(row) = current.take() {
                    rows.push(row);
                }
                current = Some(vec![arg]);
            } else {
                current.get_or_insert_with(Vec::new).push(arg);
            }
        }
        rows.extend(current);
        rows
    }
}

#[derive(Debug, Clone)]
pub struct SpawnPlanner {
    convars: ConvarPlanner,
    span: tracing::Span,
}

impl Default for SpawnPlanner {
    fn default() -> Self {
        Self::new(ConvarPlanner::default())
    }
}

impl SpawnPlanner {
    pub fn new(convars: ConvarPlanner) -> Self {
        Self {
            convars,
            span: tracing::Span::none(),
        }
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn plan(&self, cfg: &ServerConfig, host: &HostConfig) -> Result<SpawnPlan, SupervisorError> {
        let _enter = self.span.enter();
        let data_path = match cfg.server.data_path.as_deref() {
            Some(p) if !p.trim().is_empty() => p.to_string(),
            _ => {
                return Err(SupervisorError::Precondition(
                    "missing server data path".to_string(),
                ))
            }
        };

        let (executable, mut argv) = os_spawn_prefix(host)?;

        for convar in self.convars.plan(cfg) {
            argv.extend(convar.to_tuple(ConvarMode::Boot));
        }
        argv.extend(cfg.server.startup_args.iter().cloned());

        let lua_com_host = host.lua_com_host();
        let menu_enabled = if cfg.game_features.menu_enabled { "true" } else { "false" };
        let fixed: [[&str; 3]; 6] = [
            ["+set", "onesync", cfg.server.onesync.as_str()],
            ["+sets", CONVAR_VERSION, host.txa_version.as_str()],
            ["+setr", CONVAR_MENU_ENABLED, menu_enabled],
            ["+set", CONVAR_LUA_COM_HOST, lua_com_host.as_str()],
            ["+set", CONVAR_LUA_COM_TOKEN, host.lua_com_token.as_str()],
            // Kept for compatibility with the server's own checks.
            ["+set", CONVAR_SERVER_MODE, "true"],
        ];
        argv.extend(fixed.iter().flatten().map(|s| s.to_string()));
        argv.push("+exec".to_string());
        argv.push(cfg.server.cfg_path.clone());

        let plan = SpawnPlan {
            executable,
            argv,
            data_path,
            cfg_path: cfg.server.cfg_path.clone(),
            server_name: cfg
                .general
                .server_name
                .clone()
                .unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string()),
        };
        tracing::debug!(target_os = %host.target, argc = plan.argv.len(), "spawn plan ready");
        Ok(plan)
    }
}

fn os_spawn_prefix(host: &HostConfig) -> Result<(String, Vec<String>), SupervisorError> {
    match host.target {
        SpawnTarget::Windows => Ok((
            format!("{}/{WINDOWS_EXE}", path_str(&host.fxs_path)),
            Vec::new(),
        )),
        SpawnTarget::Linux => {
            let alpine = normalize_abs_path(&host.fxs_path.join("../.."))?;
            let alpine = path_str(&alpine);
            let alpine = alpine.trim_end_matches('/');
            let library_path = LIBRARY_DIRS_REL
                .iter()
                .map(|rel| format!("{alpine}/{rel}"))
                .collect::<Vec<_>>()
                .join(":");
            Ok((
                format!("{alpine}/{MUSL_LOADER_REL}"),
                vec![
                    "--library-path".to_string(),
                    library_path,
                    "--".to_string(),
                    format!("{alpine}/{LINUX_BIN_REL}"),
                    "+set".to_string(),
                    "citizen_dir".to_string(),
                    format!("{alpine}/{CITIZEN_DIR_REL}"),
                ],
            ))
        }
    }
}

fn path_str(p: &Path) -> String {
    p.to_string_lossy().replace('\\', "/")
}

fn normalize_abs_path(p: &Path) -> Result<PathBuf, SupervisorError> {
    if !p.is_absolute() {
        return Err(SupervisorError::Precondition(format!(
            "server binaries path must be absolute, got {}",
            p.display()
        )));
    }

    let mut out = PathBuf::from("/");
    for comp in p.components() {
        match comp {
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(c) => out.push(c),
            Component::Prefix(_) => {
                return Err(SupervisorError::Precondition(format!(
                    "unexpected Windows prefix in path {}",
                    p.display()
                )))
            }
        }
    }
    Ok(out)
}

/// Debug dump of the plan. Secrets are redacted.
pub fn log_spawn_plan(plan: &SpawnPlan) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    tracing::debug!(executable = %plan.executable, "spawn executable");
    for row in plan.arg_table() {
        tracing::debug!(args = %row.join(" "), "spawn args");
    }
}

/// Boot step for the `custom` language: copies the operator's locale file to
/// `<txa_path>/.runtime/locale.json`, where the in-server resource reads it.
/// A failed copy is logged and the boot goes on. Returns the written file.
pub fn setup_custom_locale_file(cfg: &ServerConfig, host: &HostConfig) -> Option<PathBuf> {
    if cfg.general.language.as_deref() != Some(CUSTOM_LANGUAGE) {
        return None;
    }
    match copy_custom_locale(host) {
        Ok(dest) => {
            tracing::debug!(dest = %dest.display(), "custom locale file copied");
            Some(dest)
        }
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "failed to copy custom locale file");
            None
        }
    }
}

fn copy_custom_locale(host: &HostConfig) -> anyhow::Result<PathBuf> {
    let src = host
        .custom_locale_path
        .as_deref()
        .context("no custom locale file configured")?;
    let txa_path = host
        .txa_path
        .as_deref()
        .context("no supervisor install path configured")?;
    let runtime_dir = txa_path.join(RUNTIME_DIR);
    std::fs::create_dir_all(&runtime_dir)
        .with_context(|| format!("create runtime dir: {}", runtime_dir.display()))?;
    let dest = runtime_dir.join(RUNTIME_LOCALE_FILE);
    std::fs::copy(src, &dest)
        .with_context(|| format!("copy {} to {}", src.display(), dest.display()))?;
    Ok(dest)
}
