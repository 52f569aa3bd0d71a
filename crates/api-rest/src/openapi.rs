//! OpenAPI document for the REST surface.

use utoipa::{OpenApi, ToSchema};

use crate::handlers;
use crate::health::HealthRes;

/// Multipart form accepted by the upload endpoints
#[derive(ToSchema)]
pub struct UploadForm {
    /// File content; on `POST` its multipart filename becomes the stored filename
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::upload,
        handlers::replace,
        handlers::delete_entry,
        handlers::delete_folder,
        handlers::fetch,
        handlers::count,
    ),
    components(schemas(HealthRes, UploadForm))
)]
pub struct ApiDoc;
