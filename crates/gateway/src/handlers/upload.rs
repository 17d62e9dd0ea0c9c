//! Paper upload handler
//!
//! Stores the file first, then inserts the metadata row. The two writes are
//! independent: an insert failure leaves the stored object in place.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::AppState;
use papervault_common::{
    db::NewPaper,
    errors::{AppError, Result},
    metrics,
    storage,
};

/// Response after a successful upload
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub file_url: String,
}

/// File part of the upload form
#[derive(Debug)]
struct UploadedFile {
    filename: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// Fields collected from the multipart body
#[derive(Debug, Default)]
struct UploadForm {
    title: Option<String>,
    authors: Option<String>,
    department: Option<String>,
    publication_date: Option<String>,
    journal: Option<String>,
    keywords: Option<String>,
    file: Option<UploadedFile>,
}

fn require<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| AppError::MissingField {
        field: field.to_string(),
    })
}

/// A text field sent empty or as whitespace counts as missing
fn require_text(value: Option<String>, field: &str) -> Result<String> {
    require(value.filter(|v| !v.trim().is_empty()), field)
}

impl UploadForm {
    /// Drain the multipart stream; unknown fields are ignored
    async fn read(multipart: &mut Multipart, limit: usize) -> Result<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, limit))?
        {
            let name = field.name().unwrap_or_default().to_string();
            tracing::debug!(field = %name, "Processing form field");

            if name == "file" {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, limit))?
                    .to_vec();

                form.file = Some(UploadedFile {
                    filename,
                    content_type,
                    bytes,
                });
                continue;
            }

            let slot = match name.as_str() {
                "title" => &mut form.title,
                "authors" => &mut form.authors,
                "department" => &mut form.department,
                "publication_date" => &mut form.publication_date,
                "journal" => &mut form.journal,
                "keywords" => &mut form.keywords,
                _ => continue,
            };

            *slot = Some(field.text().await.map_err(|e| multipart_error(e, limit))?);
        }

        Ok(form)
    }
}

fn multipart_error(e: MultipartError, limit: usize) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit }
    } else {
        AppError::InvalidFormat {
            message: e.body_text(),
        }
    }
}

fn parse_publication_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| AppError::InvalidFormat {
        message: format!("publication_date '{}' is not a YYYY-MM-DD date", value),
    })
}

/// Upload a paper file and record its metadata
pub async fn upload_paper(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let form = UploadForm::read(&mut multipart, state.config.server.max_upload_bytes).await?;

    let title = require_text(form.title, "title")?;
    let authors = require_text(form.authors, "authors")?;
    let department = require_text(form.department, "department")?;
    let publication_date = require_text(form.publication_date, "publication_date")?;
    let journal = require_text(form.journal, "journal")?;
    let keywords = require_text(form.keywords, "keywords")?;
    let file = require(form.file, "file")?;

    let publication_date = parse_publication_date(&publication_date)?;

    let path = storage::object_path(&file.filename);
    let size = file.bytes.len();

    tracing::info!(
        filename = %file.filename,
        path = %path,
        size,
        content_type = ?file.content_type,
        "File received"
    );

    if let Err(e) = state
        .storage
        .upload(&path, file.bytes, file.content_type.as_deref())
        .await
    {
        metrics::record_upload(size, false);
        return Err(e);
    }

    let file_url = format!(
        "{}{}",
        state.config.public_origin(),
        state.storage.public_url(&path)
    );

    let record = NewPaper {
        title,
        authors,
        department,
        publication_date,
        journal,
        keywords,
        file_url: file_url.clone(),
    };

    let paper = match state.metadata.insert(record).await {
        Ok(paper) => paper,
        Err(e) => {
            // No rollback: the object stays in the bucket without a metadata row
            tracing::warn!(
                bucket = %state.storage.bucket(),
                path = %path,
                error = %e,
                "Metadata insert failed, stored object is orphaned"
            );
            metrics::record_upload(size, false);
            return Err(e);
        }
    };

    metrics::record_upload(size, true);

    tracing::info!(
        paper_id = paper.id,
        file_url = %file_url,
        "Paper uploaded"
    );

    Ok(Json(UploadResponse {
        message: "Upload successful".to_string(),
        file_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{json_body, router_with, send, test_app, ORIGIN};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use papervault_common::db::{models::Paper, MemoryMetadataStore, MetadataStore, PaperQuery};
    use papervault_common::storage::{MemoryObjectStore, ObjectStore};
    use std::sync::Arc;

    const BOUNDARY: &str = "papervault-test-boundary";

    const FIELDS: [(&str, &str); 6] = [
        ("title", "Attention Is All You Need"),
        ("authors", "Vaswani et al."),
        ("department", "Computer Science"),
        ("publication_date", "2017-06-12"),
        ("journal", "NeurIPS"),
        ("keywords", "transformers, attention"),
    ];

    fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((filename, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                    BOUNDARY, filename
                )
                .as_bytes(),
            );
            body.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> Request<Body> {
        Request::post("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn pdf(filename: &'static str, bytes: &'static [u8]) -> Option<(&'static str, &'static [u8])> {
        Some((filename, bytes))
    }

    /// Metadata backend that rejects every insert
    struct RejectingStore;

    #[async_trait]
    impl MetadataStore for RejectingStore {
        async fn insert(&self, _paper: NewPaper) -> Result<Paper> {
            Err(AppError::DatabaseConnection {
                message: "insert refused".into(),
            })
        }
        async fn search(&self, _query: &PaperQuery) -> Result<Vec<Paper>> {
            Ok(Vec::new())
        }
        async fn list(&self, _offset: u64, _limit: u64) -> Result<Vec<Paper>> {
            Ok(Vec::new())
        }
        async fn find_by_id(&self, _id: i64) -> Result<Option<Paper>> {
            Ok(None)
        }
        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    /// Object store that refuses every write
    struct RefusingStorage;

    #[async_trait]
    impl ObjectStore for RefusingStorage {
        async fn upload(
            &self,
            _path: &str,
            _bytes: Vec<u8>,
            _content_type: Option<&str>,
        ) -> Result<()> {
            Err(AppError::Storage {
                message: "bucket not found".into(),
            })
        }
        fn public_url(&self, path: &str) -> String {
            storage::public_object_path("research-papers", path)
        }
        fn bucket(&self) -> &str {
            "research-papers"
        }
    }

    #[test]
    fn test_parse_publication_date() {
        assert_eq!(
            parse_publication_date(" 2023-02-28 ").unwrap(),
            NaiveDate::from_ymd_opt(2023, 2, 28).unwrap()
        );
        assert!(matches!(
            parse_publication_date("28/02/2023"),
            Err(AppError::InvalidFormat { .. })
        ));
        assert!(parse_publication_date("2023-02-30").is_err());
    }

    #[test]
    fn test_require_text_rejects_blank() {
        assert_eq!(require_text(Some("Title".into()), "title").unwrap(), "Title");
        assert!(matches!(
            require_text(Some("   ".into()), "title"),
            Err(AppError::MissingField { field }) if field == "title"
        ));
        assert!(require_text(None, "title").is_err());
    }

    #[tokio::test]
    async fn test_upload_stores_file_and_record() {
        let app = test_app();
        let body = multipart_body(&FIELDS, pdf("paper.pdf", b"%PDF-1.7 body"));

        let response = send(&app.router, upload_request(body)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["message"], "Upload successful");

        let file_url = body["file_url"].as_str().unwrap();
        assert!(file_url.starts_with(ORIGIN));
        assert!(file_url.contains("paper.pdf"));
        assert!(file_url.contains("/storage/v1/object/public/research-papers/"));

        let paths = app.storage.paths().await;
        assert_eq!(paths.len(), 1);
        let object = app.storage.get(&paths[0]).await.unwrap();
        assert_eq!(object.bytes, b"%PDF-1.7 body");
        assert_eq!(object.content_type.as_deref(), Some("application/pdf"));

        let paper = app.metadata.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(paper.title, "Attention Is All You Need");
        assert_eq!(
            paper.publication_date,
            NaiveDate::from_ymd_opt(2017, 6, 12).unwrap()
        );
        assert_eq!(paper.file_url, file_url);
    }

    #[tokio::test]
    async fn test_file_url_encodes_reserved_filename_characters() {
        let app = test_app();
        let body = multipart_body(&FIELDS, pdf("paper #2?.pdf", b"data"));

        let response = send(&app.router, upload_request(body)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let file_url = json_body(response).await["file_url"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(file_url.ends_with("_paper%20%232%3F.pdf"), "{}", file_url);
        assert!(!file_url.contains(['#', '?', ' ']));

        // The stored object keeps the raw name
        let paths = app.storage.paths().await;
        assert!(paths[0].ends_with("_paper #2?.pdf"));
    }

    #[tokio::test]
    async fn test_same_filename_uploads_do_not_collide() {
        let app = test_app();
        let first_body = multipart_body(&FIELDS, pdf("paper.pdf", b"one"));
        let second_body = multipart_body(&FIELDS, pdf("paper.pdf", b"two"));

        let (first, second) = tokio::join!(
            send(&app.router, upload_request(first_body)),
            send(&app.router, upload_request(second_body)),
        );
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);

        let first_url = json_body(first).await["file_url"].to_string();
        let second_url = json_body(second).await["file_url"].to_string();
        assert_ne!(first_url, second_url);

        assert_eq!(app.storage.paths().await.len(), 2);
        assert_eq!(app.metadata.len().await, 2);
    }

    #[tokio::test]
    async fn test_missing_field_rejected() {
        let app = test_app();
        let body = multipart_body(&FIELDS[..5], pdf("paper.pdf", b"data"));

        let response = send(&app.router, upload_request(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "MISSING_FIELD");
        assert_eq!(body["error"]["field"], "keywords");
        assert!(app.storage.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_field_rejected() {
        let app = test_app();
        let mut fields = FIELDS;
        fields[0] = ("title", "");

        let body = multipart_body(&fields, pdf("paper.pdf", b"data"));
        let response = send(&app.router, upload_request(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "MISSING_FIELD");
        assert_eq!(body["error"]["field"], "title");
        assert!(app.storage.paths().await.is_empty());
        assert!(app.metadata.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_file_rejected() {
        let app = test_app();
        let body = multipart_body(&FIELDS, None);

        let response = send(&app.router, upload_request(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["field"], "file");
        assert!(app.metadata.is_empty().await);
    }

    #[tokio::test]
    async fn test_bad_publication_date_rejected() {
        let app = test_app();
        let mut fields = FIELDS;
        fields[3] = ("publication_date", "June 2017");

        let body = multipart_body(&fields, pdf("p.pdf", b"x"));
        let response = send(&app.router, upload_request(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "INVALID_FORMAT");
        assert!(app.storage.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected() {
        let app = test_app();
        let big = vec![b'a'; 128 * 1024];
        let body = multipart_body(&FIELDS, Some(("big.pdf", big.as_slice())));

        let response = send(&app.router, upload_request(body)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(app.storage.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let metadata = Arc::new(MemoryMetadataStore::new());
        let router = router_with(metadata.clone(), Arc::new(RefusingStorage));

        let body = multipart_body(&FIELDS, pdf("paper.pdf", b"data"));
        let response = send(&router, upload_request(body)).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(response).await["error"]["code"], "STORAGE_ERROR");
        assert!(metadata.is_empty().await);
    }

    #[tokio::test]
    async fn test_insert_failure_leaves_stored_object() {
        let storage = Arc::new(MemoryObjectStore::new("research-papers"));
        let router = router_with(Arc::new(RejectingStore), storage.clone());

        let body = multipart_body(&FIELDS, pdf("paper.pdf", b"data"));
        let response = send(&router, upload_request(body)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(storage.paths().await.len(), 1);
    }
}
