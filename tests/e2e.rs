mod harness;

use harness::{CLIENT_ID, CLIENT_SECRET, MockGoogle, REFRESH_TOKEN};
use serde_json::json;
use std::{
    io::Write,
    path::PathBuf,
    process::{Command, Output, Stdio},
};
use tokio::task::spawn_blocking;
use wiremock::{
    Mock, ResponseTemplate,
    matchers::{body_string_contains, method, path},
};

#[test]
fn help() {
    let output = Command::new(get_binary_path())
        .arg("help")
        .output()
        .expect("Failed to run gbp-reviews help");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"), "Expected 'Usage:' in output");
    assert!(stdout.contains("login"));
    assert!(stdout.contains("reviews"));
}

#[test]
fn missing_credentials_fail_with_exit_code() {
    let output = bare_command()
        .arg("reviews")
        .output()
        .expect("Failed to run gbp-reviews");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("GBP_CLIENT_ID"), "stderr: {stderr}");
}

#[tokio::test(flavor = "multi_thread")]
async fn reviews_end_to_end() {
    let mock = MockGoogle::start().await;
    mock.grant_refresh().await;
    mock.accounts(json!([{"name": "accounts/7", "accountName": "Bakery"}]))
        .await;
    mock.locations("accounts/7", json!([{"name": "locations/70", "title": "Harbor"}]))
        .await;
    mock.reviews("accounts/7", "locations/70", 12).await;

    let output = run(&mock, &["--reviews-per-location", "5"], None).await;

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("Account 1: Bakery"));
    assert!(stdout.contains("--- REVIEWS FOR Harbor ---\nFound 12 reviews:"));
    assert!(stdout.contains("Review 5:"));
    assert!(!stdout.contains("Review 6:"));
    assert!(!stdout.contains(harness::ACCESS_TOKEN));
}

#[tokio::test(flavor = "multi_thread")]
async fn reviews_with_rejected_refresh_token() {
    let mock = MockGoogle::start().await;
    mock.token_status(
        400,
        json!({"error": "invalid_grant", "error_description": "Token has been expired or revoked."}),
    )
    .await;

    let output = run(&mock, &["reviews"], None).await;

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error: invalid_grant"), "stderr: {stderr}");
    assert!(stderr.contains("Error Description: Token has been expired or revoked."));
}

#[tokio::test(flavor = "multi_thread")]
async fn login_end_to_end() {
    let mock = MockGoogle::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=pasted-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "short-lived",
            "token_type": "Bearer",
            "expires_in": 3599,
            "refresh_token": "1//long-lived"
        })))
        .mount(&mock.server)
        .await;

    let output = run(
        &mock,
        &["login", "--no-browser"],
        Some("http://localhost:8080/callback?code=pasted-code&scope=business.manage\n"),
    )
    .await;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stderr: {stderr}");
    assert!(stderr.contains("access_type=offline"));
    assert!(stdout.contains("Refresh Token: 1//long-lived"));
    assert!(!stdout.contains("short-lived"));
}

/// Runs the binary against `mock` on a blocking thread, feeding `stdin` if given.
async fn run(mock: &MockGoogle, args: &[&str], stdin: Option<&str>) -> Output {
    let base = mock.uri();
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let stdin = stdin.map(str::to_string);

    spawn_blocking(move || {
        let mut child = bare_command()
            .args(&args)
            .env("GBP_CLIENT_ID", CLIENT_ID)
            .env("GBP_CLIENT_SECRET", CLIENT_SECRET)
            .env("GBP_REFRESH_TOKEN", REFRESH_TOKEN)
            .env("GBP_REDIRECT_URI", "http://localhost:8080/callback")
            .env("GBP_AUTH_URL", format!("{base}/o/oauth2/auth"))
            .env("GBP_TOKEN_URL", format!("{base}/token"))
            .env("GBP_ACCOUNTS_BASE_URL", &base)
            .env("GBP_LOCATIONS_BASE_URL", &base)
            .env("GBP_REVIEWS_BASE_URL", &base)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to spawn gbp-reviews");

        if let Some(mut pipe) = child.stdin.take() {
            if let Some(input) = stdin {
                pipe.write_all(input.as_bytes())
                    .expect("Failed to write to child stdin");
            }
        }

        child
            .wait_with_output()
            .expect("Failed to wait for gbp-reviews")
    })
    .await
    .expect("blocking task panicked")
}

/// Command with every `GBP_*` variable of the surrounding environment removed.
fn bare_command() -> Command {
    let mut cmd = Command::new(get_binary_path());
    for (key, _) in std::env::vars() {
        if key.starts_with("GBP_") {
            cmd.env_remove(key);
        }
    }
    cmd.env("RUST_LOG", "off");
    cmd
}

fn get_binary_path() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_BIN_EXE_gbp-reviews"));
    if cfg!(windows) {
        path.set_extension("exe");
    }
    path
}
