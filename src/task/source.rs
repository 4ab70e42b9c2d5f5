//! Task file access.
//!
//! A task file may live in the object store (`gs://`, fetched through the
//! public HTTPS endpoint), behind a plain http(s) URL, or on local disk.
//! All three open into a buffered line reader.

use std::io::Cursor;

use tokio::fs::File;
use tokio::io::{AsyncBufRead, BufReader};

use crate::config::OBJECT_STORE_ENDPOINT;
use crate::error_handling::TaskError;

/// A readable, line-buffered task file.
pub type TaskReader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Opens a task file by name.
pub async fn open(filename: &str) -> Result<TaskReader, TaskError> {
    if let Some(path) = filename.strip_prefix("gs://") {
        let url = format!("{}/{}", OBJECT_STORE_ENDPOINT, path);
        download(&url).await
    } else if filename.starts_with("http://") || filename.starts_with("https://") {
        download(filename).await
    } else {
        let file = File::open(filename).await?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Downloads a task file into memory.
///
/// Measurement task files are modest (a few MB) so buffering the whole
/// body is fine; rows are streamed out of the buffer line by line.
async fn download(url: &str) -> Result<TaskReader, TaskError> {
    log::debug!("Downloading task file from {}", url);
    let response = reqwest::get(url).await?.error_for_status()?;
    let body = response.bytes().await?;
    Ok(Box::new(BufReader::new(Cursor::new(body.to_vec()))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use tokio::io::AsyncBufReadExt;

    #[tokio::test]
    async fn test_open_local_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("task.ndjson");
        std::fs::write(&path, "{\"a\": 1}\n{\"a\": 2}\n").expect("write fixture");

        let reader = open(path.to_str().unwrap()).await.expect("open");
        let mut lines = reader.lines();
        let mut count = 0;
        while let Some(_line) = lines.next_line().await.expect("read line") {
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_open_missing_local_file() {
        let err = open("/nonexistent/task.ndjson").await.err();
        assert!(matches!(err, Some(TaskError::Io(_))));
    }

    #[tokio::test]
    async fn test_open_http_url() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/archive/task.ndjson"))
                .respond_with(status_code(200).body("{\"a\": 1}\n")),
        );

        let url = server.url_str("/archive/task.ndjson");
        let reader = open(&url).await.expect("open");
        let mut lines = reader.lines();
        assert_eq!(
            lines.next_line().await.expect("read line").as_deref(),
            Some("{\"a\": 1}")
        );
    }

    #[tokio::test]
    async fn test_open_http_error_status() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/archive/missing.ndjson"))
                .respond_with(status_code(404)),
        );

        let url = server.url_str("/archive/missing.ndjson");
        let err = open(&url).await.err();
        assert!(matches!(err, Some(TaskError::Download(_))));
    }
}
