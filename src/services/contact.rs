use chrono::Utc;
use uuid::Uuid;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{ContactMessage, ContactRequest};
use crate::services::auth::is_valid_email;

/// Contact form service
pub struct ContactService;

impl ContactService {
    /// Store a message from the contact form as unread
    pub async fn submit(db: &Database, req: ContactRequest) -> Result<ContactMessage> {
        let name = req.name.trim();
        let email = req.email.trim();
        let message = req.message.trim();
        if name.is_empty() || email.is_empty() || message.is_empty() {
            return Err(AppError::Validation("All fields are required!".to_string()));
        }
        if !is_valid_email(email) {
            return Err(AppError::Validation("Invalid email format!".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO messages (id, name, email, message, is_read, created_at) VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(email)
        .bind(message)
        .bind(Utc::now().to_rfc3339())
        .execute(db.pool())
        .await?;

        let stored: ContactMessage = sqlx::query_as("SELECT * FROM messages WHERE id = ?")
            .bind(&id)
            .fetch_one(db.pool())
            .await?;

        tracing::info!("Contact message {} received from {}", stored.id, stored.email);
        Ok(stored)
    }
}
