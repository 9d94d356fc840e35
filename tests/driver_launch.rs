// tests/driver_launch.rs

use std::error::Error;
use std::time::{Duration, Instant};

use promptdrive::driver::{DriverConfig, ProcessSpec, TriggerRule, run};
use promptdrive::types::TerminationReason;
use promptdrive_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn missing_executable_is_a_launch_failure() -> TestResult {
    init_tracing();

    let config = DriverConfig::builder(
        ProcessSpec::new("promptdrive-definitely-not-installed").arg("--version"),
        Duration::from_secs(30),
    )
    .rule(TriggerRule::new(["?"], "y"))
    .build()?;

    let started = Instant::now();
    let result = with_timeout(run(config)).await;

    assert_eq!(result.termination_reason, TerminationReason::LaunchFailed);
    assert_eq!(result.exit_code, None);
    assert!(result.captured_output_lines.is_empty());
    assert!(result.responses.is_empty());
    let error = result.error.expect("launch error is reported");
    assert!(error.contains("promptdrive-definitely-not-installed"));
    // No timer is left waiting on the 30s deadline.
    assert!(started.elapsed() < Duration::from_secs(5));

    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn missing_working_directory_is_a_launch_failure() -> TestResult {
    init_tracing();

    let dir = tempfile::tempdir()?;
    let config = DriverConfig::builder(
        ProcessSpec::new("sh")
            .args(["-c", "exit 0"])
            .current_dir(dir.path().join("does-not-exist")),
        Duration::from_secs(5),
    )
    .build()?;

    let result = with_timeout(run(config)).await;
    assert_eq!(result.termination_reason, TerminationReason::LaunchFailed);
    assert!(result.error.is_some());

    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn environment_overrides_reach_the_child() -> TestResult {
    init_tracing();

    let config = DriverConfig::builder(
        ProcessSpec::new("sh")
            .args(["-c", "echo \"token=$EXPO_TOKEN\""])
            .env("EXPO_TOKEN", "from-caller"),
        Duration::from_secs(5),
    )
    .build()?;

    let result = with_timeout(run(config)).await;
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.captured_output_lines, vec!["token=from-caller"]);

    Ok(())
}
