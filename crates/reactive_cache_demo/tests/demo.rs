use std::fs::read_to_string;

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::tempdir;

#[test]
fn test_observers_share_one_fetch() -> Result<(), anyhow::Error> {
    // given
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_reactive_cache_demo"));

    // when
    cmd.args(["--observers", "4", "--delay-ms", "20", "--refreshes", "0"])
        // then
        .assert()
        .success()
        .stdout(contains("fetches: 1"))
        .stdout(contains("DataService.posts, populated: true, version: 1"))
        .stdout(contains("observer 1 received 1 value(s)"))
        .stdout(contains("observer 4 received 1 value(s)"));

    Ok(())
}

#[test]
fn test_refreshes_reach_every_observer() -> Result<(), anyhow::Error> {
    // given
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_reactive_cache_demo"));

    // when
    cmd.args(["--observers", "2", "--delay-ms", "10", "--refreshes", "2"])
        // then
        .assert()
        .success()
        .stdout(contains("fetches: 3"))
        .stdout(contains("observer 1 received 3 value(s)"))
        .stdout(contains("observer 2 received 3 value(s)"));

    Ok(())
}

#[test]
fn test_failed_first_fetch_is_retried_explicitly() -> Result<(), anyhow::Error> {
    // given
    let temp_dir = tempdir()?;
    let trace_path = temp_dir.path().join("trace.log");
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_reactive_cache_demo"));

    // when
    cmd.args(["--observers", "2", "--delay-ms", "10", "--refreshes", "0", "--fail-first"])
        .arg("--trace")
        .arg(&trace_path)
        // then
        .assert()
        .success()
        .stdout(contains("fetches: 2"))
        .stdout(contains("observer 2 received 1 value(s)"));

    // and
    let trace_content = read_to_string(&trace_path)?;
    assert!(trace_content.contains("Simulated network failure"));
    assert!(trace_content.contains("Initial fetch failed"));

    Ok(())
}
