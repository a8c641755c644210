use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tokio::sync::MutexGuard;

use super::auth::AdminIdentity;
use super::{ApiError, ApiResult, AppState};
use crate::domain::aggregates::{BlogPost, ContactInquiry, InquiryStatus};
use crate::ports::UploadFile;
use crate::services::{AdminConsole, BlogEditor, EditableFields, SaveOutcome};

#[derive(Debug, Deserialize)]
pub(super) struct FilePayload {
    file_name: String,
    content_type: String,
    /// Base64 file contents.
    data: String,
}

impl FilePayload {
    fn decode(self) -> ApiResult<UploadFile> {
        let bytes = STANDARD
            .decode(self.data.trim())
            .map_err(|e| ApiError::bad_request(format!("{}: invalid base64 data: {e}", self.file_name)))?;
        if !self.content_type.starts_with("image/") {
            return Err(ApiError::bad_request(format!("{}: only images can be uploaded", self.file_name)));
        }
        Ok(UploadFile::new(self.file_name, self.content_type, bytes))
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct PendingImagePayload {
    placeholder: String,
    #[serde(flatten)]
    file: FilePayload,
}

/// Editor state sent on save: the fields, the images still pending under
/// their placeholders and an optional new cover.
#[derive(Debug, Deserialize)]
pub(super) struct SavePostRequest {
    #[serde(flatten)]
    fields: EditableFields,
    #[serde(default)]
    publish: bool,
    #[serde(default)]
    images: Vec<PendingImagePayload>,
    cover: Option<FilePayload>,
    #[serde(default)]
    clear_cover: bool,
}

async fn save_with(mut editor: BlogEditor, request: SavePostRequest, admin: &AdminIdentity) -> ApiResult<SaveOutcome> {
    let images = request
        .images
        .into_iter()
        .map(|image| Ok((image.placeholder, image.file.decode()?)))
        .collect::<ApiResult<Vec<_>>>()?;
    let cover = request.cover.map(FilePayload::decode).transpose()?;

    editor.set_fields(request.fields);
    for (placeholder, file) in images {
        editor.attach_image(&placeholder, file)?;
    }
    if request.clear_cover {
        editor.clear_cover();
    }
    if let Some(cover) = cover {
        editor.set_cover(cover);
    }
    tracing::info!(admin = admin.email.as_deref().unwrap_or("-"), pending = editor.pending_images(), "saving blog post");
    Ok(editor.save(request.publish).await?)
}

impl AdminIdentity {
    fn editor(&self, state: &AppState) -> BlogEditor {
        BlogEditor::new(self.gateway.blog.clone(), self.gateway.storage.clone(), state.saves.clone())
    }

    async fn open_editor(&self, state: &AppState, id: &str) -> ApiResult<BlogEditor> {
        let blog = self.gateway.blog.clone();
        Ok(BlogEditor::open(blog, self.gateway.storage.clone(), state.saves.clone(), id).await?)
    }

    /// The shared console, switched to this admin's repositories for the duration of the lock.
    async fn console<'a>(&self, state: &'a AppState) -> MutexGuard<'a, AdminConsole> {
        let mut console = state.admin.lock().await;
        console.use_repositories(self.gateway.blog.clone(), self.gateway.inquiries.clone());
        console
    }
}

pub(super) async fn list_posts(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
) -> ApiResult<Json<Vec<BlogPost>>> {
    let mut console = admin.console(&state).await;
    Ok(Json(console.refresh_posts().await?.to_vec()))
}

pub(super) async fn get_post(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Path(id): Path<String>,
) -> ApiResult<Json<BlogPost>> {
    let editor = admin.open_editor(&state, &id).await?;
    Ok(Json(editor.post().clone()))
}

pub(super) async fn create_post(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Json(request): Json<SavePostRequest>,
) -> ApiResult<(StatusCode, Json<SaveOutcome>)> {
    let outcome = save_with(admin.editor(&state), request, &admin).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub(super) async fn update_post(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Path(id): Path<String>,
    Json(request): Json<SavePostRequest>,
) -> ApiResult<Json<SaveOutcome>> {
    let editor = admin.open_editor(&state, &id).await?;
    Ok(Json(save_with(editor, request, &admin).await?))
}

#[derive(Debug, Serialize)]
pub(super) struct FeaturedResponse {
    id: String,
    is_featured: bool,
}

pub(super) async fn toggle_featured(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Path(id): Path<String>,
) -> ApiResult<Json<FeaturedResponse>> {
    let is_featured = admin.console(&state).await.toggle_featured(&id).await?;
    Ok(Json(FeaturedResponse { id, is_featured }))
}

pub(super) async fn unpublish(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    admin.console(&state).await.set_published(&id, false).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn delete_post(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    admin.console(&state).await.delete_post(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn list_inquiries(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
) -> ApiResult<Json<Vec<ContactInquiry>>> {
    let mut console = admin.console(&state).await;
    Ok(Json(console.refresh_inquiries().await?.to_vec()))
}

#[derive(Debug, Serialize)]
pub(super) struct StatusResponse {
    id: String,
    status: InquiryStatus,
}

pub(super) async fn toggle_inquiry_status(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let status = admin.console(&state).await.toggle_inquiry_status(&id).await?;
    Ok(Json(StatusResponse { id, status }))
}

pub(super) async fn delete_inquiry(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    admin.console(&state).await.delete_inquiry(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
