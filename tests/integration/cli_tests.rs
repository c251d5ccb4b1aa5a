use std::process::Command;

/// The binary exits with an error code when the database cannot be reached
#[test]
fn test_application_exits_on_connection_failure() {
    let output = Command::new(env!("CARGO_BIN_EXE_turf-rating"))
        .env(
            "CONNECTION_STRING",
            "host=invalid_host port=5432 user=postgres password=wrong dbname=nonexistent connect_timeout=2"
        )
        .env("RUST_LOG", "error")
        .output()
        .expect("Failed to execute turf-rating");

    assert!(!output.status.success(), "Process should fail with invalid connection");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Failed to connect to database"),
        "Should log connection error, got: {stderr}"
    );
}

/// The connection string is mandatory
#[test]
fn test_application_exits_on_missing_connection_string() {
    let output = Command::new(env!("CARGO_BIN_EXE_turf-rating"))
        .env_remove("CONNECTION_STRING")
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute turf-rating");

    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--connection-string"), "got: {stderr}");
}
