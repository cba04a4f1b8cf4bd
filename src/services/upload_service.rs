use std::path::{Component, Path, PathBuf};

use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, EntityTrait, Set};
use uuid::Uuid;

use crate::{
    audit,
    config::UploadStorage,
    entity::{enums::Role, uploads::ActiveModel as UploadActive, uploads::Entity as Uploads},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_role},
    models::Upload,
    response::{ApiResponse, Meta},
    state::AppState,
};

/// A file pulled out of the multipart body.
#[derive(Debug)]
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct StoredFile {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Accepted image types and the extension used on disk.
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .next_back()
        .unwrap_or("upload");
    base.chars().take(200).collect()
}

pub async fn upload_file(
    state: &AppState,
    user: &AuthUser,
    file: IncomingFile,
) -> AppResult<ApiResponse<Upload>> {
    ensure_role(user, &[Role::Farmer, Role::Admin])?;

    let ext = image_extension(&file.content_type).ok_or_else(|| {
        AppError::BadRequest("Only JPEG, PNG, WebP or GIF images are accepted".into())
    })?;
    if file.bytes.is_empty() {
        return Err(AppError::BadRequest("file is empty".into()));
    }
    if file.bytes.len() > state.config.max_upload_bytes {
        return Err(AppError::BadRequest(format!(
            "file exceeds the {} byte limit",
            state.config.max_upload_bytes
        )));
    }

    let id = Uuid::new_v4();
    let size_bytes = file.bytes.len() as i64;
    let storage = state.config.upload_storage;

    let (path, data) = match storage {
        UploadStorage::Disk => {
            let dir = PathBuf::from(&state.config.upload_dir);
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| AppError::Internal(e.into()))?;
            let path = dir.join(format!("{id}.{ext}"));
            tokio::fs::write(&path, &file.bytes)
                .await
                .map_err(|e| AppError::Internal(e.into()))?;
            (Some(path.to_string_lossy().into_owned()), None)
        }
        UploadStorage::Database => (None, Some(file.bytes)),
    };

    let record = UploadActive {
        id: Set(id),
        owner_id: Set(user.user_id),
        file_name: Set(sanitize_file_name(&file.file_name)),
        content_type: Set(file.content_type),
        size_bytes: Set(size_bytes),
        storage: Set(storage.as_str().to_string()),
        path: Set(path),
        data: Set(data),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(upload_id = %record.id, size_bytes, storage = storage.as_str(), "file uploaded");
    audit::record(
        &state.pool,
        user.user_id,
        "file_upload",
        "uploads",
        serde_json::json!({ "upload_id": record.id, "size_bytes": size_bytes }),
    )
    .await;

    Ok(ApiResponse::success("Uploaded", Upload::from(record), Some(Meta::empty())))
}

pub async fn fetch_file(state: &AppState, id: Uuid) -> AppResult<StoredFile> {
    let record = Uploads::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let bytes = match (record.data, record.path) {
        (Some(bytes), _) => bytes,
        (None, Some(path)) => match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(upload_id = %id, path, "upload missing on disk");
                return Err(AppError::NotFound);
            }
            Err(err) => return Err(AppError::Internal(err.into())),
        },
        (None, None) => return Err(AppError::NotFound),
    };

    Ok(StoredFile {
        content_type: record.content_type,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_images_are_accepted() {
        assert_eq!(image_extension("image/png"), Some("png"));
        assert_eq!(image_extension("image/jpeg"), Some("jpg"));
        assert_eq!(image_extension("application/pdf"), None);
        assert_eq!(image_extension("image/svg+xml"), None);
    }

    #[test]
    fn file_names_lose_their_directories() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("carrots.png"), "carrots.png");
        assert_eq!(sanitize_file_name(""), "upload");
    }
}
