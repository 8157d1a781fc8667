//! Admin authentication: password login issuing an HS256 JWT, and a bearer
//! middleware enforcing the admin role on back-office routes.

use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

/// Issued tokens are valid for 24 hours.
const TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

const ROLE_ADMIN: &str = "admin";

/// Credentials and signing secret for the admin back-office.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub admin_username: String,
    pub admin_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: i64,
}

pub fn issue_token(config: &AuthConfig, username: &str) -> Result<String, ApiError> {
    let claims = Claims {
        sub: username.to_string(),
        role: ROLE_ADMIN.to_string(),
        exp: chrono::Utc::now().timestamp() + TOKEN_TTL_SECS,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("Failed to sign token: {e}")))
}

pub fn verify_token(config: &AuthConfig, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// `POST /api/admin/login` — no detail about which credential failed.
pub async fn handle_login(
    State(state): State<AppState>,
    Json(login): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    if login.username != state.auth.admin_username
        || login.password != state.auth.admin_password
    {
        warn!("Rejected admin login attempt");
        return Err(ApiError::Unauthorized);
    }

    let token = issue_token(&state.auth, &login.username)?;
    Ok(Json(json!({ "success": true, "token": token })).into_response())
}

/// Middleware guarding every admin route except login.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = token else {
        return ApiError::Unauthorized.into_response();
    };

    match verify_token(&state.auth, token) {
        Ok(claims) if claims.role == ROLE_ADMIN => next.run(request).await,
        Ok(_) => ApiError::Forbidden.into_response(),
        Err(_) => ApiError::Unauthorized.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret".to_string(),
            admin_username: "admin".to_string(),
            admin_password: "hunter2".to_string(),
        }
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let cfg = config();
        let token = issue_token(&cfg, "admin").unwrap();
        let claims = verify_token(&cfg, &token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.role, ROLE_ADMIN);
        assert!(claims.exp > chrono::Utc::now().timestamp());
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let cfg = config();
        let token = issue_token(&cfg, "admin").unwrap();
        let other = AuthConfig {
            jwt_secret: "other-secret".to_string(),
            ..cfg
        };
        assert!(verify_token(&other, &token).is_err());
    }

    #[test]
    fn test_verify_rejects_garbage_token() {
        assert!(verify_token(&config(), "not-a-token").is_err());
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let app = crate::test_util::test_app();

        let result = handle_login(
            State(app.state.clone()),
            Json(LoginRequest {
                username: "admin".to_string(),
                password: "wrong".to_string(),
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_login_issues_verifiable_token() {
        let app = crate::test_util::test_app();

        let result = handle_login(
            State(app.state.clone()),
            Json(LoginRequest {
                username: "admin".to_string(),
                password: "hunter2".to_string(),
            }),
        )
        .await;

        assert!(result.is_ok());
    }
}
