use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn masterski(state_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_masterski"))
        .env_remove("SUPABASE_URL")
        .env_remove("SUPABASE_ANON_KEY")
        .env_remove("RUST_LOG")
        .arg("--state-dir")
        .arg(state_dir)
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn failure_is_reported_once() {
    let dir = tempfile::tempdir().unwrap();

    let output = masterski(dir.path(), &["stats"]);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert_eq!(stderr.matches("missing backend URL").count(), 1, "{stderr}");
}

#[test]
fn logout_without_backend_clears_the_session_file() {
    let dir = tempfile::tempdir().unwrap();
    let session = dir.path().join("session.json");
    fs::write(
        &session,
        r#"{
            "user_id": "6f1c2a9e-3b4d-4c5e-8f70-112233445566",
            "access_token": "access",
            "refresh_token": "refresh",
            "expires_at": "2025-02-03T11:00:00Z"
        }"#,
    )
    .unwrap();

    let output = masterski(dir.path(), &["logout"]);

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "Signed out");
    assert!(!session.exists());
}
