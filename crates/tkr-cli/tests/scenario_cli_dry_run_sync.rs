//! Dry-run sync against a mocked directory. Requires TKR_DATABASE_URL;
//! skipped otherwise. Nothing is written in dry-run mode.

use assert_cmd::prelude::*;
use httpmock::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn dry_run_sync_reports_without_writing() {
    let url = match std::env::var("TKR_DATABASE_URL") {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: TKR_DATABASE_URL not set");
            return;
        }
    };

    let server = MockServer::start();
    let dir_mock = server.mock(|when, then| {
        when.method(GET).path("/company_tickers.json");
        then.status(200).header("content-type", "application/json").body(
            r#"{"0":{"cik_str":9900000001,"ticker":"DRYA","title":"Dry Run Alpha"},
                "1":{"cik_str":9900000002,"ticker":"DRYB","title":"Dry Run Beta"}}"#,
        );
    });

    let dir = tempfile::tempdir().unwrap();
    let yaml = format!(
        "edgar:\n  user_agent: \"Ops ops@example.com\"\n  directory_url: \"{}\"\n  data_base_url: \"{}\"\n",
        server.url("/company_tickers.json"),
        server.base_url()
    );
    std::fs::write(dir.path().join("cfg.yaml"), yaml).unwrap();

    Command::cargo_bin("tkr")
        .unwrap()
        .current_dir(dir.path())
        .env("TKR_DATABASE_URL", &url)
        .args(["db", "migrate"])
        .assert()
        .success();

    let before = count_events(&url, dir.path());

    Command::cargo_bin("tkr")
        .unwrap()
        .current_dir(dir.path())
        .env("TKR_DATABASE_URL", &url)
        .args(["sync", "--config", "cfg.yaml", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dry_run=true").and(predicate::str::contains("symbol=DRYA")));

    dir_mock.assert();
    assert_eq!(before, count_events(&url, dir.path()));
}

fn count_events(url: &str, cwd: &std::path::Path) -> String {
    let out = Command::cargo_bin("tkr")
        .unwrap()
        .current_dir(cwd)
        .env("TKR_DATABASE_URL", url)
        .args(["db", "status"])
        .output()
        .unwrap();
    assert!(out.status.success());
    String::from_utf8_lossy(&out.stdout)
        .split_whitespace()
        .find(|t| t.starts_with("event_count="))
        .expect("event_count field")
        .to_string()
}
