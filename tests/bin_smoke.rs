use inklink::{
    app::{AppConfig, LogLevel},
    cli::{Command, RunOptions},
    config::{Config, LinkDetect},
};
use std::{
    env, fs,
    path::Path,
    sync::{Mutex, OnceLock},
    time::Duration,
};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn with_temp_home<F: FnOnce(&Path)>(f: F) {
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let original_home = env::var_os("HOME");
    let home = tempfile::tempdir().expect("failed to create temp HOME");
    env::set_var("HOME", home.path());
    f(home.path());
    if let Some(val) = original_home {
        env::set_var("HOME", val);
    } else {
        env::remove_var("HOME");
    }
}

fn write_config(home: &Path, contents: &str) {
    let cfg_dir = home.join(".inklink");
    fs::create_dir_all(&cfg_dir).expect("failed to create config dir");
    fs::write(cfg_dir.join("config.toml"), contents).expect("failed to write config");
}

#[test]
fn prints_version() {
    let args = vec!["--version".to_string()];
    let cmd = Command::parse(&args).unwrap();
    assert!(matches!(cmd, Command::ShowVersion));
    assert!(!env!("CARGO_PKG_VERSION").is_empty());
}

#[test]
fn help_lists_core_flags() {
    let help = Command::help();
    for flag in ["--device", "--baud", "--width", "--height", "--demo", "preview", "--size"] {
        assert!(help.contains(flag), "help output missing {flag}: {help}");
    }
}

#[test]
fn missing_config_is_created_with_defaults() {
    with_temp_home(|home| {
        let cfg = Config::load_or_default().expect("config load failed");
        assert_eq!(cfg, Config::default());
        let written = fs::read_to_string(home.join(".inklink/config.toml")).unwrap();
        assert!(written.contains("transfer_timeout = \"25s\""));
        assert!(written.contains("link_detect = \"open\""));
    });
}

#[test]
fn config_file_feeds_app_config() {
    with_temp_home(|home| {
        write_config(
            home,
            r#"
device = "/dev/rfcomm0"
baud = 115200
link_detect = "dcd"
display_width = 296
display_height = 128
transfer_timeout = "30s"
        "#,
        );
        let cfg = Config::load_or_default().expect("config load failed");
        let merged = AppConfig::from_sources(cfg, RunOptions::default()).unwrap();
        assert_eq!(merged.device, "/dev/rfcomm0");
        assert_eq!(merged.baud, 115_200);
        assert_eq!(merged.link_detect, LinkDetect::Dcd);
        assert_eq!((merged.display_width, merged.display_height), (296, 128));
        assert_eq!(merged.transfer_timeout, Duration::from_secs(30));
        assert_eq!(merged.log_level, LogLevel::Info);
    });
}

#[test]
fn cli_overrides_config_device_and_baud() {
    with_temp_home(|home| {
        write_config(
            home,
            r#"
device = "/dev/ttyAMA0"
baud = 9600
        "#,
        );
        let cfg = Config::load_or_default().expect("config load failed");
        let opts = RunOptions {
            device: Some("/dev/ttyS1".into()),
            baud: Some(19_200),
            ..RunOptions::default()
        };
        let merged = AppConfig::from_sources(cfg, opts).unwrap();
        assert_eq!(merged.device, "/dev/ttyS1");
        assert_eq!(merged.baud, 19_200);
    });
}

#[test]
fn config_rejects_out_of_range_timeout() {
    with_temp_home(|home| {
        write_config(home, "transfer_timeout = \"5s\"\n");
        let err = Config::load_or_default().unwrap_err();
        assert!(format!("{err}").contains("transfer_timeout"), "{err}");
    });
}

#[test]
fn config_rejects_unknown_keys() {
    with_temp_home(|home| {
        write_config(home, "cols = 20\n");
        let err = Config::load_or_default().unwrap_err();
        assert!(format!("{err}").contains("unknown config key 'cols'"), "{err}");
    });
}
