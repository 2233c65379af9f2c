#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::io::Write;
use std::time::Duration;

use roam_cli::app::{read_log_lines, replay_lines, run_with_args};
use roam_cli::config::Config;
use roam_cli::render::ConsoleView;

fn rendered(view: ConsoleView<Vec<u8>>) -> Vec<String> {
    String::from_utf8(view.into_inner())
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect()
}

#[tokio::test(start_paused = true)]
async fn replay_renders_records_and_progress() {
    let lines = vec![
        "[MC]: Starting minecraft server version 1.20.4".to_owned(),
        "[Sync]: STATUS: Downloading...".to_owned(),
        "[Sync]: Transferred: 5 / 10, 50%".to_owned(),
        "ERROR: could not bind port".to_owned(),
    ];

    let view = replay_lines(
        &Config::default(),
        lines,
        Duration::from_millis(10),
        ConsoleView::new(Vec::new()),
    )
    .await
    .unwrap();
    let out = rendered(view);

    let records: Vec<&String> = out.iter().filter(|l| !l.starts_with('~')).collect();
    assert_eq!(records.len(), 4);
    assert!(records[0].ends_with(" game    [MC]: Starting minecraft server version 1.20.4"));
    assert!(records[1].ends_with(" sync    [Sync]: STATUS: Downloading..."));
    assert!(records[3].ends_with(" error   ERROR: could not bind port"));

    assert!(out.contains(&"~ sync: Downloading...".to_owned()));
    assert!(out.contains(&"~ sync: Overall: 5 / 10, 50% [50%]".to_owned()));
}

#[test]
fn log_file_lines_are_decoded_lossily() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"[MC]: ok\r\n[MC]: bad \xfe\n").unwrap();
    let lines = read_log_lines(file.path()).unwrap();
    assert_eq!(lines, vec!["[MC]: ok", "[MC]: bad \u{fffd}"]);
}

#[test]
fn usage_errors_exit_with_two() {
    assert_eq!(run_with_args(["roam", "run"]), 2);
    assert_eq!(run_with_args(["roam", "bogus"]), 2);
}

#[test]
fn runtime_errors_exit_with_one() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.log");
    let config = dir.path().join("config.yaml");
    std::fs::write(&config, "logging:\n  level: error\n").unwrap();
    assert_eq!(
        run_with_args([
            "roam".to_owned(),
            "--config".to_owned(),
            config.display().to_string(),
            "replay".to_owned(),
            missing.display().to_string(),
        ]),
        1
    );
}
