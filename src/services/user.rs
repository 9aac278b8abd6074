use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{UpdateProfileRequest, User, UserResponse};
use crate::services::auth::map_unique_violation;

/// User service
pub struct UserService;

impl UserService {
    /// Get user by ID
    pub async fn get_user(db: &Database, user_id: &str) -> Result<User> {
        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound("User not found!".to_string()))?;

        Ok(user)
    }

    /// Get user profile
    pub async fn get_profile(db: &Database, user_id: &str) -> Result<UserResponse> {
        let user = Self::get_user(db, user_id).await?;
        Ok(UserResponse::from(user))
    }

    /// Update username and/or avatar
    pub async fn update_profile(
        db: &Database,
        user_id: &str,
        req: UpdateProfileRequest,
    ) -> Result<UserResponse> {
        let user = Self::get_user(db, user_id).await?;

        let username = match req.username.as_deref().map(str::trim) {
            Some("") => {
                return Err(AppError::Validation("Username cannot be empty".to_string()));
            }
            Some(name) if name.len() > 50 => {
                return Err(AppError::Validation(
                    "Username must be at most 50 characters".to_string(),
                ));
            }
            Some(name) => name.to_string(),
            None => user.username,
        };
        let avatar = match req.avatar.as_deref().map(str::trim) {
            Some("") => {
                return Err(AppError::Validation("Avatar cannot be empty".to_string()));
            }
            Some(url) => url.to_string(),
            None => user.avatar,
        };

        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query("UPDATE users SET username = ?, avatar = ?, updated_at = ? WHERE id = ?")
            .bind(&username)
            .bind(&avatar)
            .bind(&now)
            .bind(user_id)
            .execute(db.pool())
            .await
            .map_err(map_unique_violation)?;

        Self::get_profile(db, user_id).await
    }
}
