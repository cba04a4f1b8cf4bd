use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::uploads::UploadForm,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Upload,
    response::ApiResponse,
    services::upload_service::{self, IncomingFile},
    state::AppState,
};

/// Multipart framing on top of the file itself.
pub const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(upload_file).layer(DefaultBodyLimit::max(max_upload_bytes + MULTIPART_OVERHEAD)),
        )
        .route("/{id}", get(serve_file))
}

async fn read_file_field(mut multipart: Multipart) -> AppResult<IncomingFile> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        return Ok(IncomingFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Err(AppError::BadRequest("multipart field `file` is required".into()))
}

#[utoipa::path(
    post,
    path = "/api/uploads",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Stored image", body = ApiResponse<Upload>),
        (status = 400, description = "Not an image or too large"),
        (status = 403, description = "Farmers and admins only")
    ),
    security(("bearer_auth" = [])),
    tag = "Uploads"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<Upload>>)> {
    let file = read_file_field(multipart).await?;
    let resp = upload_service::upload_file(&state, &user, file).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/uploads/{id}",
    params(("id" = Uuid, Path, description = "Upload ID")),
    responses(
        (status = 200, description = "Raw image bytes"),
        (status = 404, description = "Not found")
    ),
    tag = "Uploads"
)]
pub async fn serve_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let file = upload_service::fetch_file(&state, id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        file.bytes,
    ))
}
