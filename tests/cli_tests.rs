use assert_cmd::Command;

fn driver() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_bench_driver"));
    for key in [
        "OPTIBENCH_ENV",
        "OPTIBENCH_FILTER",
        "OPTIBENCH_RESULT_DIR",
        "OPTIBENCH_REPORT",
        "OPTIBENCH_BUDGET",
        "OPTIBENCH_PASSES",
        "OPTIBENCH_PROFILE",
        "OPTIBENCH_STALL_TIMEOUT",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn test_cli_exits_with_success_on_help() {
    let output = driver().arg("--help").output().expect("run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("OPTIBENCH_ENV=production"));
}

#[test]
fn test_cli_lists_workloads() {
    let output = driver().arg("--list").output().expect("run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let names: Vec<&str> = stdout.lines().collect();
    assert_eq!(names, vec!["sort-u64", "hash-map-build", "async-sleep"]);
}

#[test]
fn test_cli_refuses_without_production_marker() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = driver()
        .env("OPTIBENCH_RESULT_DIR", dir.path())
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("production mode required"));
}

#[test]
fn test_cli_rejects_bad_pass_count() {
    let output = driver()
        .env("OPTIBENCH_ENV", "production")
        .env("OPTIBENCH_PASSES", "zero")
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_runs_filtered_workload_and_writes_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let report = dir.path().join("report.json");
    let mut cmd = driver();
    cmd.env("OPTIBENCH_ENV", "production")
        .env("OPTIBENCH_FILTER", "async-sleep")
        .env("OPTIBENCH_RESULT_DIR", dir.path().join("results"))
        .env("OPTIBENCH_REPORT", &report)
        .env("OPTIBENCH_BUDGET", "0.02")
        .env("OPTIBENCH_PASSES", "1");
    cmd.assert().success();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).expect("report")).expect("json");
    assert_eq!(value["suite_name"], "optibench");
    let tests = value["tests"].as_object().expect("tests");
    assert_eq!(tests.keys().collect::<Vec<_>>(), vec!["async-sleep"]);
}
