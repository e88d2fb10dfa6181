#![cfg(unix)]

use fxrunner::{
    ConvarMode, ConvarPlanner, HostConfig, PoolSizeOverride, ServerConfig, SpawnPlanner,
    SpawnTarget,
};
use fxrunner_contracts::{CONVAR_LUA_COM_HOST, CONVAR_LUA_COM_TOKEN, CONVAR_SERVER_MODE};

const FXS_PATH: &str = "/opt/fx/alpine/opt/cfx-server";

fn sample_config() -> ServerConfig {
    let mut cfg = ServerConfig::from_json_slice(
        br#"{
          "general": { "language": "pt-BR", "serverName": "Example RP" },
          "server": {
            "dataPath": "/srv/txData/default",
            "cfgPath": "configs/server.cfg",
            "startupArgs": ["+set", "sv_maxclients", "48"]
          },
          "banlist": { "enabled": true },
          "fxserver": { "pureLevel": 2, "tebexSecret": "tbx" }
        }"#,
    )
    .expect("parse sample config");
    cfg.fxserver.pool_sizes.push(PoolSizeOverride {
        pool_name: "TxdStore".to_string(),
        increase: 60000,
    });
    cfg
}

fn linux_host() -> HostConfig {
    HostConfig::new(FXS_PATH, "secret-token")
        .with_target(SpawnTarget::Linux)
        .with_version("8.0.1")
        .with_port(40125)
}

#[test]
fn exec_is_always_last() {
    let cfg = sample_config();
    for host in [
        linux_host(),
        linux_host().with_target(SpawnTarget::Windows),
    ] {
        let plan = SpawnPlanner::default().plan(&cfg, &host).expect("plan");
        let n = plan.argv.len();
        assert_eq!(plan.argv[n - 2], "+exec");
        assert_eq!(plan.argv[n - 1], "configs/server.cfg");
        assert_eq!(plan.argv.iter().filter(|a| *a == "+exec").count(), 1);
        assert_eq!(plan.cfg_path, "configs/server.cfg");
        assert_eq!(plan.data_path, "/srv/txData/default");
        assert_eq!(plan.server_name, "Example RP");
    }
}

#[test]
fn linux_loader_separator_comes_right_after_library_path() {
    let plan = SpawnPlanner::default()
        .plan(&sample_config(), &linux_host())
        .expect("plan");

    assert_eq!(plan.executable, "/opt/fx/alpine/opt/cfx-server/ld-musl-x86_64.so.1");
    assert_eq!(plan.argv[0], "--library-path");
    assert_eq!(
        plan.argv[1],
        "/opt/fx/alpine/usr/lib/v8/:/opt/fx/alpine/lib/:/opt/fx/alpine/usr/lib/"
    );
    let seps: Vec<usize> = plan
        .argv
        .iter()
        .enumerate()
        .filter(|(_, a)| *a == "--")
        .map(|(i, _)| i)
        .collect();
    assert_eq!(seps, vec![2]);
    assert_eq!(plan.argv[3], "/opt/fx/alpine/opt/cfx-server/FXServer");
    assert_eq!(
        &plan.argv[4..7],
        &["+set", "citizen_dir", "/opt/fx/alpine/opt/cfx-server/citizen/"]
    );
}

#[test]
fn boot_convars_then_user_args_then_fixed_block() {
    let cfg = sample_config();
    let plan = SpawnPlanner::default().plan(&cfg, &linux_host()).expect("plan");

    let boot: Vec<String> = ConvarPlanner::default()
        .plan_tuples(&cfg, ConvarMode::Boot)
        .into_iter()
        .flatten()
        .collect();
    let start = 7;
    assert_eq!(&plan.argv[start..start + boot.len()], boot.as_slice());

    let user_at = start + boot.len();
    assert_eq!(&plan.argv[user_at..user_at + 3], &["+set", "sv_maxclients", "48"]);

    let fixed = &plan.argv[user_at + 3..];
    assert_eq!(&fixed[0..3], &["+set", "onesync", "on"]);
    assert_eq!(&fixed[3..6], &["+sets", "txAdmin-version", "8.0.1"]);
    assert_eq!(&fixed[6..9], &["+setr", "txAdmin-menuEnabled", "true"]);
    assert_eq!(&fixed[9..12], &["+set", CONVAR_LUA_COM_HOST, "127.0.0.1:40125"]);
    assert_eq!(&fixed[12..15], &["+set", CONVAR_LUA_COM_TOKEN, "secret-token"]);
    assert_eq!(&fixed[15..18], &["+set", CONVAR_SERVER_MODE, "true"]);
    assert_eq!(fixed.len(), 20);
}

#[test]
fn pure_level_and_pool_size_reach_the_command_line() {
    let plan = SpawnPlanner::default()
        .plan(&sample_config(), &linux_host())
        .expect("plan");
    let has_triplet = |a: &str, b: &str, c: &str| {
        plan.argv
            .windows(3)
            .any(|w| w[0] == a && w[1] == b && w[2] == c)
    };
    assert!(has_triplet("+set", "sv_pureLevel", "2"));
    assert!(has_triplet("+set", "increase_pool_size", "\"TxdStore\" 60000"));
    assert!(has_triplet("+setr", "locale", "pt-BR"));
    assert!(has_triplet("+set", "txAdmin-checkPlayerJoin", "true"));
}

#[test]
fn planning_is_idempotent() {
    let cfg = sample_config();
    let host = linux_host();
    let planner = SpawnPlanner::default();
    assert_eq!(planner.plan(&cfg, &host).unwrap(), planner.plan(&cfg, &host).unwrap());
    assert_eq!(
        ConvarPlanner::default().plan(&cfg),
        ConvarPlanner::default().plan(&cfg)
    );
}

#[test]
fn plan_serializes_for_tooling() {
    let plan = SpawnPlanner::default()
        .plan(&sample_config(), &linux_host())
        .expect("plan");
    let v = serde_json::to_value(&plan).expect("serialize plan");
    assert!(v["argv"].as_array().unwrap().iter().all(|a| a.is_string()));
    assert_eq!(v["cfg_path"], "configs/server.cfg");
}

#[test]
fn redacted_table_never_leaks_secrets() {
    let plan = SpawnPlanner::default()
        .plan(&sample_config(), &linux_host())
        .expect("plan");
    let flat: Vec<String> = plan.arg_table().into_iter().flatten().collect();
    assert!(!flat.iter().any(|a| a == "secret-token" || a == "tbx"));
    assert_eq!(flat.len(), plan.argv.len());
}
