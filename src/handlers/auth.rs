use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};

use crate::{
    auth::PasswordService,
    errors::{AppError, Result},
    handlers::AppState,
    models::{AuthResponse, CredentialsRequest},
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

fn credentials(payload: std::result::Result<Json<CredentialsRequest>, JsonRejection>) -> Result<CredentialsRequest> {
    payload
        .map(|Json(request)| request)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let request = credentials(payload)?;
    let email = request.email.trim().to_string();

    PasswordService::validate_credentials(&email, &request.password)?;

    if state.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("User already exists".to_string()));
    }

    // bcrypt runs on the blocking pool
    let cost = state.config.bcrypt_cost;
    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || PasswordService::hash_password(&password, cost))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

    let user = state.users.create_user(&email, &password_hash).await?;
    let token = state.jwt.generate_token(user.id, &user.email)?;

    tracing::info!(user_id = %user.id, "user registered");

    Ok((StatusCode::CREATED, Json(AuthResponse { token })))
}

pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>> {
    let request = credentials(payload)?;
    let email = request.email.trim().to_string();

    let user = state.users.find_by_email(&email).await?;

    // unknown emails still pay for a bcrypt check
    let password = request.password;
    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    let decoy = state.password_decoy.clone();
    let valid = tokio::task::spawn_blocking(move || {
        PasswordService::verify_or_decoy(&password, stored_hash.as_deref(), &decoy)
    })
    .await
    .map_err(|e| AppError::Internal(e.into()))??;

    let user = match user {
        Some(user) if valid => user,
        Some(user) => {
            tracing::debug!(user_id = %user.id, "login rejected: wrong password");
            return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
        }
        None => {
            tracing::debug!("login rejected: unknown email");
            return Err(AppError::Auth(INVALID_CREDENTIALS.to_string()));
        }
    };

    let token = state.jwt.generate_token(user.id, &user.email)?;
    Ok(Json(AuthResponse { token }))
}
