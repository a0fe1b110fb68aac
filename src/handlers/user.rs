//! User-related API handlers

use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
};

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::models::{ApiResponse, RegisterUserRequest, UserResponse};
use crate::state::AppState;
use crate::storage::{StagedFile, Staging};
use crate::users::RegistrationUploads;

/// POST /api/v1/users/register - Create an account from a multipart form
pub async fn register_user(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<UserResponse>, ApiError> {
    let (req, attachments) = read_registration_form(&state.staging, multipart?).await?;

    let user = state.user_service.register(req, attachments).await?;

    Ok(ApiResponse::new(
        StatusCode::CREATED,
        user,
        "User registered successfully",
    ))
}

/// GET /api/v1/users/current-user - Profile of the authenticated account
pub async fn get_current_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<ApiResponse<UserResponse>, ApiError> {
    let profile = state.user_service.current_user(user.user_id).await?;

    Ok(ApiResponse::new(
        StatusCode::OK,
        profile,
        "Current user fetched successfully",
    ))
}

/// Split a registration form into text fields and staged attachments.
/// Anything staged is removed again if the form cannot be read to the end.
async fn read_registration_form(
    staging: &Staging,
    mut multipart: Multipart,
) -> Result<(RegisterUserRequest, RegistrationUploads), ApiError> {
    let mut req = RegisterUserRequest::default();
    let mut attachments = RegistrationUploads::default();

    match collect_fields(staging, &mut multipart, &mut req, &mut attachments).await {
        Ok(()) => Ok((req, attachments)),
        Err(e) => {
            attachments.discard().await;
            Err(e)
        }
    }
}

async fn collect_fields(
    staging: &Staging,
    multipart: &mut Multipart,
    req: &mut RegisterUserRequest,
    attachments: &mut RegistrationUploads,
) -> Result<(), ApiError> {
    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "fullName" => req.full_name = field.text().await?,
            "username" => req.username = field.text().await?,
            "email" => req.email = field.text().await?,
            "password" => req.password = field.text().await?,
            "avatar" | "coverImage" => {
                let Some(staged) = stage_field(staging, &mut field).await? else {
                    continue;
                };
                let slot = if name == "avatar" {
                    &mut attachments.avatar
                } else {
                    &mut attachments.cover_image
                };
                // last part wins
                if let Some(previous) = slot.replace(staged) {
                    previous.discard().await;
                }
            }
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(())
}

/// Stream one file part to the staging directory. An empty part counts as absent.
async fn stage_field(
    staging: &Staging,
    field: &mut Field<'_>,
) -> Result<Option<StagedFile>, ApiError> {
    let mut writer = staging.begin(field.file_name()).await.map_err(staging_failed)?;
    let mut written = 0usize;

    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if let Err(e) = writer.write(&chunk).await {
                    writer.abort().await;
                    return Err(staging_failed(e));
                }
                written += chunk.len();
            }
            Ok(None) => break,
            Err(e) => {
                writer.abort().await;
                return Err(e.into());
            }
        }
    }

    if written == 0 {
        writer.abort().await;
        return Ok(None);
    }

    writer.finish().await.map(Some).map_err(staging_failed)
}

fn staging_failed(e: std::io::Error) -> ApiError {
    tracing::error!(error = %e, "Failed to stage uploaded file");
    ApiError::Upload("Failed to store uploaded file".to_string())
}
