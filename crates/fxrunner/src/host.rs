use std::path::PathBuf;

use anyhow::{Context, Result};
use fxrunner_contracts::{
    DEFAULT_LOOPBACK, DEFAULT_TXA_PORT, ENV_FXS_PATH, ENV_LUA_COM_TOKEN, ENV_NET_INTERFACE,
    ENV_TXA_PORT,
};
use serde::{Deserialize, Serialize};

/// How the server binary has to be launched on the host OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpawnTarget {
    /// Native executable inside the server installation.
    Windows,
    /// Bundled binary started through the shipped musl dynamic loader.
    Linux,
}

impl SpawnTarget {
    pub fn host() -> Self {
        if cfg!(windows) {
            SpawnTarget::Windows
        } else {
            SpawnTarget::Linux
        }
    }
}

impl std::fmt::Display for SpawnTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpawnTarget::Windows => f.write_str("windows"),
            SpawnTarget::Linux => f.write_str("linux"),
        }
    }
}

impl std::str::FromStr for SpawnTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "windows" | "win32" => Ok(SpawnTarget::Windows),
            "linux" => Ok(SpawnTarget::Linux),
            other => anyhow::bail!("invalid spawn target {other:?} (expected one of: windows, linux)"),
        }
    }
}

/// Host-level values the spawn plan depends on. Injected, never read from
/// globals by the planners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    pub target: SpawnTarget,
    pub fxs_path: PathBuf,
    pub txa_version: String,
    pub txa_port: u16,
    pub net_interface: Option<String>,
    pub lua_com_token: String,
    /// Supervisor install directory; runtime files for the server go under it.
    pub txa_path: Option<PathBuf>,
    /// Operator-provided locale used when the language is `custom`.
    pub custom_locale_path: Option<PathBuf>,
}

impl HostConfig {
    pub fn new(fxs_path: impl Into<PathBuf>, lua_com_token: impl Into<String>) -> Self {
        Self {
            target: SpawnTarget::host(),
            fxs_path: fxs_path.into(),
            txa_version: env!("CARGO_PKG_VERSION").to_string(),
            txa_port: DEFAULT_TXA_PORT,
            net_interface: None,
            lua_com_token: lua_com_token.into(),
            txa_path: None,
            custom_locale_path: None,
        }
    }

    pub fn with_target(mut self, target: SpawnTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.txa_version = version.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.txa_port = port;
        self
    }

    pub fn with_net_interface(mut self, iface: impl Into<String>) -> Self {
        self.net_interface = Some(iface.into());
        self
    }

    pub fn with_txa_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.txa_path = Some(path.into());
        self
    }

    pub fn with_custom_locale_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.custom_locale_path = Some(path.into());
        self
    }

    pub fn from_env() -> Result<Self> {
        let fxs_path = std::env::var_os(ENV_FXS_PATH)
            .map(PathBuf::from)
            .with_context(|| format!("missing {ENV_FXS_PATH}"))?;
        let token = std::env::var(ENV_LUA_COM_TOKEN).unwrap_or_default();
        let mut host = HostConfig::new(fxs_path, token);

        if let Ok(raw) = std::env::var(ENV_TXA_PORT) {
            host.txa_port = parse_port_env(ENV_TXA_PORT, &raw)?;
        }
        if let Ok(raw) = std::env::var(ENV_NET_INTERFACE) {
            let raw = raw.trim();
            if !raw.is_empty() {
                host.net_interface = Some(raw.to_string());
            }
        }
        Ok(host)
    }

    /// Address the child calls back into.
    pub fn lua_com_host(&self) -> String {
        let iface = self.net_interface.as_deref().unwrap_or(DEFAULT_LOOPBACK);
        format!("{iface}:{}", self.txa_port)
    }
}

fn parse_port_env(name: &str, raw: &str) -> Result<u16> {
    match raw.trim().parse::<u16>() {
        Ok(0) | Err(_) => anyhow::bail!("invalid {name}={raw:?} (expected a port in 1..=65535)"),
        Ok(port) => Ok(port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lua_com_host_defaults_to_loopback() {
        let host = HostConfig::new("/opt/fx", "tok").with_port(40125);
        assert_eq!(host.lua_com_host(), "127.0.0.1:40125");
        let host = host.with_net_interface("10.0.0.4");
        assert_eq!(host.lua_com_host(), "10.0.0.4:40125");
    }

    #[test]
    fn spawn_target_parse() {
        assert_eq!("Linux".parse::<SpawnTarget>().unwrap(), SpawnTarget::Linux);
        assert_eq!("win32".parse::<SpawnTarget>().unwrap(), SpawnTarget::Windows);
        assert!("darwin".parse::<SpawnTarget>().is_err());
    }

    #[test]
    fn port_env_rejects_zero_and_garbage() {
        assert_eq!(parse_port_env(ENV_TXA_PORT, " 40120 ").unwrap(), 40120);
        assert!(parse_port_env(ENV_TXA_PORT, "0").is_err());
        assert!(parse_port_env(ENV_TXA_PORT, "http").is_err());
    }
}
