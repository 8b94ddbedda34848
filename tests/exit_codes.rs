use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

fn hubreport_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_hubreport"));
    cmd.env("HOME", home);
    cmd.current_dir(home);
    cmd.env_remove("HUBREPORT_CONFIG");
    cmd.env_remove("HUBREPORT_AWS_REGION");
    cmd.env_remove("HUBREPORT_AWS_PROFILE");
    cmd.env_remove("HUBREPORT_AWS_MAX_ATTEMPTS");
    cmd.env_remove("HUBREPORT_STANDARD_ID");
    cmd.env_remove("HUBREPORT_OUTPUT_DIR");
    cmd.env_remove("HUBREPORT_PAGE_DELAY_MS");
    cmd.env_remove("HUBREPORT_CHECKS_SOURCE");
    cmd
}

fn run(home: &Path, args: &[&str]) -> Output {
    hubreport_cmd(home).args(args).output().expect("run hubreport")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home = std::env::temp_dir().join(format!(
        "hubreport-exit-test-{}-{seq}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn no_report_written(home: &Path) -> bool {
    std::fs::read_dir(home)
        .expect("read home")
        .filter_map(|e| e.ok())
        .all(|e| !e.file_name().to_string_lossy().starts_with("output_"))
}

#[test]
fn completion_unknown_shell_exits_2() {
    let home = make_temp_home();
    let out = run(&home, &["completion", "nope"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn completion_bash_succeeds() {
    let home = make_temp_home();
    let out = run(&home, &["completion", "bash"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("hubreport"));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn completion_needs_neither_home_nor_a_valid_config() {
    let home = make_temp_home();
    let cfg = home.join(".config/hubreport/config.toml");
    std::fs::create_dir_all(cfg.parent().expect("parent")).expect("mkdirs");
    std::fs::write(&cfg, "[report\n").expect("write");

    let out = run(&home, &["completion", "zsh"]);
    assert!(
        out.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );

    let out = hubreport_cmd(&home)
        .env_remove("HOME")
        .env("HUBREPORT_CONFIG", &cfg)
        .args(["completion", "fish"])
        .output()
        .expect("run hubreport");
    assert!(
        out.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert!(!out.stdout.is_empty());
    let _ = std::fs::remove_dir_all(&home);
}

#[cfg(target_os = "linux")]
#[test]
fn stdout_write_failure_exits_30() {
    let home = make_temp_home();
    let full = std::fs::OpenOptions::new()
        .write(true)
        .open("/dev/full")
        .expect("open /dev/full");
    let out = hubreport_cmd(&home)
        .args(["config", "--show", "--json"])
        .stdout(full)
        .output()
        .expect("run hubreport");
    assert_eq!(out.status.code(), Some(30));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("failed to write to stdout"), "stderr={stderr}");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn unknown_flag_exits_2() {
    let home = make_temp_home();
    let out = run(&home, &["--no-such-flag"]);
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn missing_explicit_config_exits_2() {
    let home = make_temp_home();
    let out = run(&home, &["--config", "does-not-exist.toml", "count"]);
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("config file not found"), "stderr={stderr}");
    assert!(no_report_written(&home));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn malformed_config_exits_2() {
    let home = make_temp_home();
    let cfg = home.join(".config/hubreport/config.toml");
    std::fs::create_dir_all(cfg.parent().expect("parent")).expect("mkdirs");
    std::fs::write(&cfg, "[report\ncount_page_size = 10\n").expect("write");

    let out = run(&home, &["count"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(no_report_written(&home));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn out_of_range_page_size_exits_2() {
    let home = make_temp_home();
    let cfg = home.join("cfg.toml");
    std::fs::write(&cfg, "[report]\nseverity_page_size = 500\n").expect("write");

    let out = hubreport_cmd(&home)
        .arg("--config")
        .arg(&cfg)
        .arg("severity")
        .output()
        .expect("run hubreport");
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("report.severity_page_size"), "stderr={stderr}");
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn bad_env_override_exits_2() {
    let home = make_temp_home();
    let out = hubreport_cmd(&home)
        .env("HUBREPORT_CHECKS_SOURCE", "carrier-pigeon")
        .arg("standards")
        .output()
        .expect("run hubreport");
    assert_eq!(out.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn blank_standard_flag_exits_2() {
    let home = make_temp_home();
    let out = run(&home, &["--standard", " ", "count"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(no_report_written(&home));
    let _ = std::fs::remove_dir_all(&home);
}
