use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const DEFAULT_AVATAR: &str = "https://i.postimg.cc/Y0JPMM7V/image.png";

/// Account row
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Account as returned to clients (never carries the password hash)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub avatar: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            avatar: user.avatar,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Signup request. Missing fields deserialize as empty and are rejected by validation.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

/// Identity asserted by the upstream OAuth provider
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleAuthRequest {
    pub name: String,
    pub email: String,
    pub photo: Option<String>,
}

/// Everything needed to insert a provisioned account
#[derive(Debug, Clone, PartialEq)]
pub struct AccountDraft {
    pub username: String,
    pub email: String,
    pub secret: String,
    pub avatar: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub avatar: Option<String>,
}

/// Current authenticated user (extracted from the session cookie)
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub email: String,
}

/// JWT claims; `sub` is the account id
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub jti: String,
    pub exp: usize,
    pub iat: usize,
}
