//! Upload and retrieval of GeoJSON documents.
//!
//! Upload runs a fixed pipeline: intake → size guard → file-type guard
//! (multipart only) → decode → validate → persist. A failure at any phase ends
//! the request; nothing is written unless every earlier phase passed.

use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{multipart::MultipartError, FromRequest, Multipart, Path, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use futures_util::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use common::types::GEOJSON_MEDIA_TYPE;
use service::errors::ServiceError;
use service::geojson::{self, Document};
use service::storage::{DocumentId, DocumentReader};

use super::{ServerState, MULTIPART_ENVELOPE_BYTES};
use crate::{errors::ApiError, metrics};

/// Multipart part that carries the document.
pub const FILE_FIELD: &str = "file";

const ACCEPTED_MEDIA_TYPES: [&str; 2] = [GEOJSON_MEDIA_TYPE, "application/json"];
const ACCEPTED_SUFFIXES: [&str; 2] = [".geojson", ".json"];
const CACHE_CONTROL_VALUE: &str = "public, max-age=300";
const READ_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: String,
    pub url: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Intake,
    SizeGuard,
    FileType,
    Decode,
    Validate,
    Persist,
}

impl Phase {
    fn as_str(&self) -> &'static str {
        match self {
            Phase::Intake => "intake",
            Phase::SizeGuard => "size_guard",
            Phase::FileType => "file_type",
            Phase::Decode => "decode",
            Phase::Validate => "validate",
            Phase::Persist => "persist",
        }
    }
}

struct Rejection {
    phase: Phase,
    error: ApiError,
    /// Body bytes read before the pipeline stopped, when known.
    received: Option<usize>,
}

impl Rejection {
    fn new(phase: Phase, error: ApiError) -> Self {
        Self { phase, error, received: None }
    }

    fn too_large(limit: usize) -> Self {
        Self::new(Phase::SizeGuard, ApiError::PayloadTooLarge { limit })
    }

    fn received(mut self, bytes: usize) -> Self {
        self.received = Some(bytes);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intake {
    Json,
    Multipart,
}

/// Lower-cased media type without parameters (`text/plain; charset=x` → `text/plain`).
fn media_essence(value: &str) -> String {
    value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

fn classify(headers: &HeaderMap) -> Option<Intake> {
    let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    match media_essence(content_type).as_str() {
        "multipart/form-data" => Some(Intake::Multipart),
        m if ACCEPTED_MEDIA_TYPES.contains(&m) => Some(Intake::Json),
        _ => None,
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers.get(header::CONTENT_LENGTH)?.to_str().ok()?.parse().ok()
}

fn is_geojson_part(content_type: Option<&str>, file_name: Option<&str>) -> bool {
    let type_ok = content_type
        .map(media_essence)
        .is_some_and(|m| ACCEPTED_MEDIA_TYPES.contains(&m.as_str()));
    let name_ok = file_name
        .map(str::to_ascii_lowercase)
        .is_some_and(|n| ACCEPTED_SUFFIXES.iter().any(|s| n.ends_with(s)));
    type_ok || name_ok
}

/// Chunked body over a stored record; the record is never held in memory whole.
fn record_stream(reader: DocumentReader) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    stream::try_unfold(reader, |mut reader| async move {
        let mut buf = vec![0u8; READ_CHUNK_BYTES];
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok::<_, std::io::Error>(Some((Bytes::from(buf), reader)))
    })
}

/// Format as an IMF-fixdate for `Last-Modified`.
fn http_date(t: DateTime<Utc>) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

async fn read_json_body(body: Body, limit: usize) -> Result<Vec<u8>, Rejection> {
    let mut stream = body.into_data_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            Rejection::new(Phase::Intake, ApiError::bad_request(format!("failed to read request body: {e}")))
        })?;
        if buf.len() + chunk.len() > limit {
            return Err(Rejection::too_large(limit).received(buf.len() + chunk.len()));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

fn multipart_failure(e: MultipartError, limit: usize) -> Rejection {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Rejection::too_large(limit)
    } else {
        Rejection::new(Phase::Intake, ApiError::bad_request(e.body_text()))
    }
}

async fn read_multipart_file(state: &ServerState, req: Request, limit: usize) -> Result<Vec<u8>, Rejection> {
    let mut multipart = Multipart::from_request(req, state)
        .await
        .map_err(|e| Rejection::new(Phase::Intake, ApiError::bad_request(e.body_text())))?;

    let mut file: Option<Vec<u8>> = None;
    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(multipart_failure(e, limit)),
        };
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        if file.is_some() {
            return Err(Rejection::new(
                Phase::Intake,
                ApiError::bad_request(format!("exactly one \"{FILE_FIELD}\" part is accepted")),
            ));
        }
        if !is_geojson_part(field.content_type(), field.file_name()) {
            return Err(Rejection::new(
                Phase::FileType,
                ApiError::bad_request("Only .geojson or .json files are accepted"),
            ));
        }

        let mut buf = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_failure(e, limit))? {
            if buf.len() + chunk.len() > limit {
                return Err(Rejection::too_large(limit).received(buf.len() + chunk.len()));
            }
            buf.extend_from_slice(&chunk);
        }
        file = Some(buf);
    }

    file.ok_or_else(|| {
        Rejection::new(Phase::Intake, ApiError::bad_request(format!("missing \"{FILE_FIELD}\" part")))
    })
}

/// Intake, guards, decode and validate. Returns the document and the received size.
async fn accept(state: &ServerState, req: Request) -> Result<(Document, usize), Rejection> {
    let limit = state.limits.max_bytes;
    let headers = req.headers();

    let intake = classify(headers).ok_or_else(|| {
        Rejection::new(
            Phase::Intake,
            ApiError::bad_request("Expected multipart/form-data with a \"file\" part or an application/json body"),
        )
    })?;

    if let Some(declared) = declared_length(headers) {
        let ceiling = match intake {
            Intake::Json => limit,
            Intake::Multipart => limit.saturating_add(MULTIPART_ENVELOPE_BYTES),
        };
        if declared > ceiling {
            return Err(Rejection::too_large(limit));
        }
    }

    let raw = match intake {
        Intake::Json => read_json_body(req.into_body(), limit).await?,
        Intake::Multipart => read_multipart_file(state, req, limit).await?,
    };

    let value: serde_json::Value = serde_json::from_slice(&raw).map_err(|e| {
        Rejection::new(Phase::Decode, ApiError::bad_request(format!("Invalid JSON: {e}"))).received(raw.len())
    })?;

    let document = geojson::validate(value)
        .map_err(|e| Rejection::new(Phase::Validate, e.into()).received(raw.len()))?;
    Ok((document, raw.len()))
}

#[utoipa::path(
    post, path = "/api/geojson", tag = "geojson",
    responses(
        (status = 201, description = "Stored", body = crate::openapi::UploadResponseDoc),
        (status = 400, description = "Bad content type, invalid JSON or invalid GeoJSON", body = crate::openapi::ErrorResponseDoc),
        (status = 413, description = "Payload too large", body = crate::openapi::ErrorResponseDoc),
        (status = 500, description = "Internal Server Error", body = crate::openapi::ErrorResponseDoc)
    )
)]
pub async fn upload(State(state): State<ServerState>, req: Request) -> Result<Response, ApiError> {
    let started = Instant::now();
    let declared = declared_length(req.headers());

    let outcome = match accept(&state, req).await {
        Ok((document, received)) => match state.store.put(&document).await {
            Ok(receipt) => Ok((document, received, receipt)),
            Err(e) => Err(Rejection::new(Phase::Persist, e.into()).received(received)),
        },
        Err(rejection) => Err(rejection),
    };

    match outcome {
        Ok((document, received, receipt)) => {
            metrics::UPLOADS_STORED_TOTAL.inc();
            metrics::STORED_BYTES_TOTAL.inc_by(receipt.bytes);
            info!(
                phase = "respond",
                id = %receipt.id,
                kind = %document.kind(),
                features = document.feature_count(),
                received,
                bytes = receipt.bytes,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "geojson stored"
            );
            let url = format!("/api/geojson/{}", receipt.id);
            let body = UploadResponse { id: receipt.id.to_string(), url: url.clone(), bytes: receipt.bytes };
            Ok((StatusCode::CREATED, [(header::LOCATION, url)], Json(body)).into_response())
        }
        Err(Rejection { phase, error, received }) => {
            metrics::UPLOADS_REJECTED_TOTAL.with_label_values(&[phase.as_str()]).inc();
            let violations = match &error {
                ApiError::BadRequest { details: Some(v), .. } => v.len(),
                _ => 0,
            };
            warn!(
                phase = phase.as_str(),
                status = error.status().as_u16(),
                violations,
                declared,
                received,
                limit = state.limits.max_bytes,
                error = %error,
                "upload rejected"
            );
            Err(error)
        }
    }
}

#[utoipa::path(
    get, path = "/api/geojson/{id}", tag = "geojson",
    params(("id" = String, Path, description = "Identifier returned by the upload")),
    responses(
        (status = 200, description = "Stored document served as application/geo+json"),
        (status = 400, description = "Malformed identifier", body = crate::openapi::ErrorResponseDoc),
        (status = 404, description = "Not found", body = crate::openapi::ErrorResponseDoc)
    )
)]
pub async fn retrieve(State(state): State<ServerState>, Path(raw_id): Path<String>) -> Result<Response, ApiError> {
    let id = DocumentId::parse(&raw_id).map_err(|e| {
        warn!(phase = "lookup", id_len = raw_id.len(), "malformed identifier");
        ApiError::from(e)
    })?;

    let stored = match state.store.get(&id).await {
        Ok(stored) => stored,
        Err(ServiceError::NotFound(_)) => {
            metrics::RETRIEVALS_NOT_FOUND_TOTAL.inc();
            info!(phase = "lookup", %id, "geojson not found");
            return Err(ApiError::NotFound);
        }
        Err(e) => return Err(e.into()),
    };

    metrics::RETRIEVALS_TOTAL.inc();
    info!(phase = "lookup", %id, bytes = stored.size, "geojson served");

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(GEOJSON_MEDIA_TYPE));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_VALUE));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(stored.size));
    if let Ok(v) = HeaderValue::from_str(&http_date(stored.modified)) {
        headers.insert(header::LAST_MODIFIED, v);
    }
    Ok((StatusCode::OK, headers, Body::from_stream(record_stream(stored.reader))).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn headers_with(content_type: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        h
    }

    #[test]
    fn classifies_content_types() {
        assert_eq!(classify(&headers_with("application/json")), Some(Intake::Json));
        assert_eq!(classify(&headers_with("application/geo+json; charset=utf-8")), Some(Intake::Json));
        assert_eq!(classify(&headers_with("Application/JSON")), Some(Intake::Json));
        assert_eq!(classify(&headers_with("multipart/form-data; boundary=xyz")), Some(Intake::Multipart));
        assert_eq!(classify(&headers_with("text/plain")), None);
        assert_eq!(classify(&HeaderMap::new()), None);
    }

    #[test]
    fn file_type_guard_accepts_media_type_or_suffix() {
        assert!(is_geojson_part(Some("application/geo+json"), None));
        assert!(is_geojson_part(Some("application/octet-stream"), Some("roads.GeoJSON")));
        assert!(is_geojson_part(None, Some("points.json")));
        assert!(!is_geojson_part(Some("text/csv"), Some("points.csv")));
        assert!(!is_geojson_part(None, None));
    }

    #[test]
    fn last_modified_is_imf_fixdate() {
        let t = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(http_date(t), "Tue, 05 Mar 2024 07:08:09 GMT");
    }

    #[tokio::test]
    async fn json_body_is_capped_while_streaming() {
        let body = Body::from(vec![b' '; 100]);
        let res = read_json_body(body, 99).await;
        assert!(matches!(res, Err(Rejection { phase: Phase::SizeGuard, received: Some(100), .. })));

        let body = Body::from(vec![b' '; 99]);
        assert_eq!(read_json_body(body, 99).await.ok().map(|b| b.len()), Some(99));
    }

    #[tokio::test]
    async fn oversize_rejection_counts_bytes_across_chunks() {
        let chunks = (0..3).map(|_| Ok::<_, std::io::Error>(Bytes::from(vec![b' '; 40])));
        let body = Body::from_stream(stream::iter(chunks));
        match read_json_body(body, 100).await {
            Err(rejection) => {
                assert_eq!(rejection.phase, Phase::SizeGuard);
                assert_eq!(rejection.received, Some(120));
                assert_eq!(rejection.error.status(), StatusCode::PAYLOAD_TOO_LARGE);
            }
            Ok(_) => panic!("expected a size guard rejection"),
        }
    }

    #[tokio::test]
    async fn record_stream_yields_bounded_chunks() {
        let content: Vec<u8> = (0..150_000u32).map(|i| (i % 251) as u8).collect();
        let reader: DocumentReader = Box::pin(std::io::Cursor::new(content.clone()));

        let chunks: Vec<Bytes> = record_stream(reader).map(|c| c.unwrap()).collect().await;
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= READ_CHUNK_BYTES));
        assert_eq!(chunks.concat(), content);
    }
}
