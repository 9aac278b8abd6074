use crate::db::Database;
use crate::error::Result;
use crate::models::DashboardStats;

/// Dashboard service
pub struct DashboardService;

impl DashboardService {
    /// Collection counts, queried concurrently
    pub async fn stats(db: &Database) -> Result<DashboardStats> {
        let (total_media, total_users, unread_messages) = tokio::try_join!(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM media").fetch_one(db.pool()),
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users").fetch_one(db.pool()),
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages WHERE is_read = 0")
                .fetch_one(db.pool()),
        )?;

        Ok(DashboardStats {
            total_media,
            total_users,
            unread_messages,
        })
    }
}
