//! CSV upload handler: log the file's lines, then archive it to object storage.

use axum::extract::{Multipart, State};
use bytes::Bytes;

use crate::AppState;
use crate::errors::{Error, Result};
use crate::storage::LifecyclePolicy;

/// Fixed confirmation returned on success
const CONFIRMATION: &str = "CSV file processed and uploaded to S3.";

/// Handle `POST /process_csv`.
///
/// Accepts a multipart form with a `csv_file` field, buffers the whole
/// payload into memory once, dumps its lines to the log, then uploads the
/// raw bytes under the original filename and requests the configured
/// storage-class transition. The lifecycle call is only attempted after the
/// upload succeeds.
///
/// The object key is the client-supplied filename, unsanitized; uploading
/// the same filename twice overwrites the prior object.
pub async fn process_csv(State(state): State<AppState>, mut multipart: Multipart) -> Result<&'static str> {
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Failed to parse multipart data: {}", e),
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "csv_file" => {
                let filename = field.file_name().map(|s| s.to_string()).ok_or_else(|| Error::BadRequest {
                    message: "Field 'csv_file' is missing a file name".to_string(),
                })?;

                // Buffer the payload once. The same byte sequence feeds both
                // the line dump and the storage upload, so there is no
                // second read of an already-exhausted stream.
                let data = field.bytes().await.map_err(|e| Error::BadRequest {
                    message: format!("Failed to read file: {}", e),
                })?;

                upload = Some((filename, data));
            }
            _ => {
                // Ignore unknown fields (forward compatibility)
            }
        }
    }

    let (filename, data) = upload.ok_or_else(|| Error::BadRequest {
        message: "Missing required field: 'csv_file'".to_string(),
    })?;

    // Decode before touching storage: a non-UTF-8 payload must fail the
    // request without uploading anything.
    let content = std::str::from_utf8(&data).map_err(|_| Error::BadRequest {
        message: "File must be valid UTF-8 text".to_string(),
    })?;

    let line_count = log_csv_lines(&filename, content);

    tracing::info!(
        filename = %filename,
        size_bytes = data.len(),
        line_count = line_count,
        "Processed CSV upload"
    );

    let policy = LifecyclePolicy::from(&state.config.storage);
    state.store.put_object(&filename, data.clone()).await?;
    state.store.apply_lifecycle(&filename, &policy).await?;

    Ok(CONFIRMATION)
}

/// Dump every newline-delimited segment of the file to the log, returning
/// the segment count. A trailing newline produces a trailing empty segment,
/// and an empty file counts as one empty segment.
fn log_csv_lines(filename: &str, content: &str) -> usize {
    let mut count = 0;
    for line in content.split('\n') {
        tracing::info!(filename = %filename, line = %line, "CSV line");
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetStorageClass;
    use crate::test_utils::{InMemoryStore, create_test_app};
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};

    fn csv_form(filename: &str, content: &[u8]) -> MultipartForm {
        let part = Part::bytes(content.to_vec()).file_name(filename);
        MultipartForm::new().add_part("csv_file", part)
    }

    #[test_log::test(tokio::test)]
    async fn test_upload_stores_exact_bytes_and_lifecycle() {
        let store = InMemoryStore::new();
        let (server, config) = create_test_app(store.clone());

        let response = server.post("/process_csv").multipart(csv_form("data.csv", b"a,b\n1,2\n")).await;

        response.assert_status(StatusCode::OK);
        assert_eq!(response.text(), "CSV file processed and uploaded to S3.");

        let stored = store.object("data.csv").expect("object should be stored");
        assert_eq!(&stored[..], b"a,b\n1,2\n");

        let policy = store.policy("data.csv").expect("lifecycle policy should be applied");
        assert_eq!(policy.transition_days, config.storage.transition_days);
        assert_eq!(policy.target_class, TargetStorageClass::Glacier);
    }

    #[tokio::test]
    async fn test_missing_field_returns_bad_request() {
        let store = InMemoryStore::new();
        let (server, _config) = create_test_app(store.clone());

        let form = MultipartForm::new().add_text("unrelated", "value");
        let response = server.post("/process_csv").multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(store.object_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_filename_returns_bad_request() {
        let store = InMemoryStore::new();
        let (server, _config) = create_test_app(store.clone());

        let form = MultipartForm::new().add_part("csv_file", Part::bytes(b"a,b\n".to_vec()));
        let response = server.post("/process_csv").multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(store.object_count(), 0);
    }

    #[tokio::test]
    async fn test_non_utf8_payload_rejected_before_upload() {
        let store = InMemoryStore::new();
        let (server, _config) = create_test_app(store.clone());

        let response = server
            .post("/process_csv")
            .multipart(csv_form("data.csv", &[0xff, 0xfe, 0x00, 0x61]))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(store.object_count(), 0, "decode failure must not reach storage");
    }

    #[tokio::test]
    async fn test_empty_file_stores_empty_object() {
        let store = InMemoryStore::new();
        let (server, _config) = create_test_app(store.clone());

        let response = server.post("/process_csv").multipart(csv_form("empty.csv", b"")).await;

        response.assert_status(StatusCode::OK);
        let stored = store.object("empty.csv").expect("empty object should be stored");
        assert!(stored.is_empty());
        assert!(store.policy("empty.csv").is_some());
    }

    #[tokio::test]
    async fn test_reupload_overwrites_prior_object() {
        let store = InMemoryStore::new();
        let (server, _config) = create_test_app(store.clone());

        server.post("/process_csv").multipart(csv_form("data.csv", b"old\n")).await;
        let response = server.post("/process_csv").multipart(csv_form("data.csv", b"new\n")).await;

        response.assert_status(StatusCode::OK);
        assert_eq!(store.object_count(), 1);
        assert_eq!(&store.object("data.csv").unwrap()[..], b"new\n");
    }

    #[tokio::test]
    async fn test_upload_failure_skips_lifecycle_call() {
        let store = InMemoryStore::new();
        store.set_fail_uploads(true);
        let (server, _config) = create_test_app(store.clone());

        let response = server.post("/process_csv").multipart(csv_form("data.csv", b"a,b\n")).await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert!(store.policy("data.csv").is_none(), "lifecycle must not fire after a failed upload");
    }

    #[tokio::test]
    async fn test_lifecycle_failure_after_upload_is_an_error() {
        let store = InMemoryStore::new();
        store.set_fail_lifecycle(true);
        let (server, _config) = create_test_app(store.clone());

        let response = server.post("/process_csv").multipart(csv_form("data.csv", b"a,b\n")).await;

        // The object is stored but untransitioned; the request still fails
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert!(store.object("data.csv").is_some());
    }

    #[test]
    fn test_line_count_includes_trailing_empty_segment() {
        assert_eq!(log_csv_lines("t.csv", "a,b\n1,2\n"), 3);
        assert_eq!(log_csv_lines("t.csv", "a,b\n1,2"), 2);
        assert_eq!(log_csv_lines("t.csv", ""), 1);
    }
}
