use utoipa::OpenApi;
use utoipa::ToSchema;

#[derive(ToSchema)]
pub struct HealthResponse { pub ok: bool }

#[derive(ToSchema)]
pub struct UploadResponseDoc {
    /// Identifier of the stored document.
    pub id: String,
    /// Path that resolves the document, `/api/geojson/{id}`.
    pub url: String,
    /// Size of the stored (pretty-printed) document.
    pub bytes: u64,
}

#[derive(ToSchema)]
pub struct ViolationDoc { pub path: String, pub message: String }

#[derive(ToSchema)]
pub struct ErrorResponseDoc {
    pub error: String,
    pub details: Option<Vec<ViolationDoc>>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::geojson::upload,
        crate::routes::geojson::retrieve,
    ),
    components(
        schemas(
            HealthResponse,
            UploadResponseDoc,
            ViolationDoc,
            ErrorResponseDoc,
        )
    ),
    tags(
        (name = "health"),
        (name = "geojson")
    )
)]
pub struct ApiDoc;
