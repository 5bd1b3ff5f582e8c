use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
    routing::{get, post},
};
use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::config::Config;
use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::{CreateUser, LoginUser, TokenResponse, User, UserResponse};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(get_me))
}

async fn register(
    State(state): State<AppState>,
    Json(input): Json<CreateUser>,
) -> AppResult<impl IntoResponse> {
    let username = input.username.trim();
    let email = input.email.trim().to_lowercase();
    if username.is_empty() || email.is_empty() || input.password.is_empty() {
        return Err(AppError::BadRequest(
            "Username, email and password are required".to_string(),
        ));
    }

    let mut conn = state.pool.acquire().await?;
    if db::username_or_email_taken(&mut conn, username, &email).await? {
        return Err(AppError::Conflict(
            "Username or email already registered".to_string(),
        ));
    }

    let hashed = hash(&input.password, state.config.bcrypt_cost)
        .map_err(|e| AppError::Internal(e.into()))?;

    let display_name = input
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(username);

    let user = db::insert_user(
        &mut conn,
        username,
        &email,
        &hashed,
        Some(display_name),
        Utc::now(),
    )
    .await?;
    tracing::info!(user_id = user.id, "user registered");

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginUser>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.pool.acquire().await?;
    let user = db::load_user_by_email(&mut conn, &input.email.trim().to_lowercase())
        .await?
        .ok_or(AppError::Unauthorized("Incorrect email or password"))?;

    let valid = verify(&input.password, &user.hashed_password)
        .map_err(|e| AppError::Internal(e.into()))?;
    if !valid {
        return Err(AppError::Unauthorized("Incorrect email or password"));
    }

    let token = generate_jwt(&state.config, user.id)?;
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
    }))
}

async fn get_me(State(state): State<AppState>, headers: HeaderMap) -> AppResult<impl IntoResponse> {
    let user = extract_current_user(&state, &headers).await?;
    Ok(Json(UserResponse::from(user)))
}

fn bearer_user_id(config: &Config, headers: &HeaderMap) -> AppResult<i64> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized("Missing authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized("Invalid authorization header"))?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret_key.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Invalid token"))?;

    token_data
        .claims
        .sub
        .parse()
        .map_err(|_| AppError::Unauthorized("Invalid token"))
}

pub async fn extract_current_user(state: &AppState, headers: &HeaderMap) -> AppResult<User> {
    let user_id = bearer_user_id(&state.config, headers)?;
    let mut conn = state.pool.acquire().await?;
    db::load_user(&mut conn, user_id)
        .await?
        .ok_or(AppError::Unauthorized("User not found"))
}

/// Like [`extract_current_user`], but anonymous requests and bad tokens yield `None`.
pub async fn extract_optional_user(state: &AppState, headers: &HeaderMap) -> AppResult<Option<User>> {
    let Ok(user_id) = bearer_user_id(&state.config, headers) else {
        return Ok(None);
    };
    let mut conn = state.pool.acquire().await?;
    Ok(db::load_user(&mut conn, user_id).await?)
}

pub fn generate_jwt(config: &Config, user_id: i64) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(chrono::Duration::hours(config.token_ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("token expiry out of range")))?
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret_key.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.into()))
}
