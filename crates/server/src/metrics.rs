use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec, TextEncoder};

// Prometheus metrics (default registry)
pub static UPLOADS_STORED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("geodrop_uploads_stored_total", "Total documents accepted and stored")
        .expect("register uploads_stored_total")
});

pub static UPLOADS_REJECTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "geodrop_uploads_rejected_total",
        "Total uploads rejected, by pipeline phase",
        &["phase"]
    )
    .expect("register uploads_rejected_total")
});

pub static STORED_BYTES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("geodrop_stored_bytes_total", "Total bytes written to document storage")
        .expect("register stored_bytes_total")
});

pub static RETRIEVALS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("geodrop_retrievals_total", "Total documents served")
        .expect("register retrievals_total")
});

pub static RETRIEVALS_NOT_FOUND_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("geodrop_retrievals_not_found_total", "Total lookups of unknown identifiers")
        .expect("register retrievals_not_found_total")
});

/// Touch every metric so they are exported before their first increment.
pub fn register_all() {
    Lazy::force(&UPLOADS_STORED_TOTAL);
    Lazy::force(&UPLOADS_REJECTED_TOTAL);
    Lazy::force(&STORED_BYTES_TOTAL);
    Lazy::force(&RETRIEVALS_TOTAL);
    Lazy::force(&RETRIEVALS_NOT_FOUND_TOTAL);
}

pub fn encode_metrics() -> (StatusCode, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("metrics encode error: {e}"));
    }
    (StatusCode::OK, String::from_utf8(buffer).unwrap_or_default())
}

pub async fn metrics_handler() -> Response {
    register_all();
    let (status, body) = encode_metrics();
    (status, [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response()
}
