//! End-to-end tests for `run_tasks`, using local fixture files and a mock
//! HTTP server in place of the object store. All runs use `--dry-run` so no
//! warehouse credentials are needed.

use std::io::Write;

use clap::Parser;
use httptest::{matchers::*, responders::*, Expectation, Server};

use measurement_etl::{run_tasks, Config};

fn fixture(lines: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    file.write_all(lines.as_bytes()).expect("write fixture");
    file
}

fn dry_run_config(filenames: &[&str]) -> Config {
    let mut args = vec!["measurement_etl"];
    args.extend_from_slice(filenames);
    args.extend_from_slice(&["--dry-run", "--buffer-size", "2"]);
    Config::parse_from(args)
}

#[tokio::test]
async fn test_run_tasks_processes_local_files() {
    let file = fixture("{\"mbps\": 1}\n{\"mbps\": 2}\n{\"mbps\": 3}\n");
    let config = dry_run_config(&[file.path().to_str().unwrap()]);

    let report = run_tasks(config).await.expect("run succeeds");
    assert_eq!(report.tasks, 1);
    assert_eq!(report.failed_tasks, 0);
    assert_eq!(report.rows_inserted, 3);
    assert_eq!(report.rows_accepted, 3);
    assert_eq!(report.rows_dropped, 0);
    assert_eq!(report.parse_errors, 0);
}

#[tokio::test]
async fn test_run_tasks_counts_parse_errors_without_failing_the_task() {
    let file = fixture("{\"mbps\": 1}\nnot json at all\n{\"mbps\": 2}\n");
    let config = dry_run_config(&[file.path().to_str().unwrap()]);

    let report = run_tasks(config).await.expect("run succeeds");
    assert_eq!(report.failed_tasks, 0);
    assert_eq!(report.rows_inserted, 2);
    assert_eq!(report.rows_accepted, 2);
    assert_eq!(report.parse_errors, 1);
}

#[tokio::test]
async fn test_run_tasks_reports_unreadable_files_as_failed() {
    let good = fixture("{\"mbps\": 1}\n");
    let config = dry_run_config(&[good.path().to_str().unwrap(), "/nonexistent/task.ndjson"]);

    let report = run_tasks(config).await.expect("run itself succeeds");
    assert_eq!(report.tasks, 2);
    assert_eq!(report.failed_tasks, 1);
    assert_eq!(report.rows_accepted, 1);
}

#[tokio::test]
async fn test_run_tasks_downloads_http_task_files() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/archive/task.ndjson"))
            .respond_with(status_code(200).body("{\"mbps\": 1}\n{\"mbps\": 2}\n")),
    );

    let url = server.url_str("/archive/task.ndjson");
    let config = dry_run_config(&[url.as_str()]);

    let report = run_tasks(config).await.expect("run succeeds");
    assert_eq!(report.failed_tasks, 0);
    assert_eq!(report.rows_accepted, 2);
}

#[tokio::test]
async fn test_run_tasks_shares_one_inserter_per_destination() {
    // Two copies of the same archive day for one data type route to the same
    // partitioned table, so acceptance counters are not double-counted.
    let first = fixture("{\"mbps\": 1}\n{\"mbps\": 2}\n");
    let second = fixture("{\"mbps\": 3}\n");
    let config = dry_run_config(&[
        first.path().to_str().unwrap(),
        second.path().to_str().unwrap(),
    ]);

    let report = run_tasks(config).await.expect("run succeeds");
    assert_eq!(report.tasks, 2);
    assert_eq!(report.rows_inserted, 3);
    assert_eq!(report.rows_accepted, 3);
}
