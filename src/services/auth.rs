use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, Rng};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;
use uuid::Uuid;

use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{
    AccountDraft, Claims, GoogleAuthRequest, SigninRequest, SignupRequest, User, DEFAULT_AVATAR,
};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Authentication service
pub struct AuthService;

impl AuthService {
    /// Register a new account
    pub async fn signup(db: &Database, config: &Config, req: SignupRequest) -> Result<User> {
        let username = req.username.trim();
        let email = req.email.trim();
        if username.is_empty() || email.is_empty() || req.password.trim().is_empty() {
            return Err(AppError::Validation("All fields are required!".to_string()));
        }

        if !is_valid_email(email) {
            return Err(AppError::Validation("Invalid email format!".to_string()));
        }

        if Self::find_by_email(db, email).await?.is_some() {
            return Err(AppError::Conflict("Email already exists!".to_string()));
        }

        let username_taken: Option<String> =
            sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(db.pool())
                .await?;
        if username_taken.is_some() {
            return Err(AppError::Conflict("Username already exists!".to_string()));
        }

        let password_hash = hash_password(&req.password, config.auth.bcrypt_cost).await?;
        let user = Self::insert_user(db, username, email, &password_hash, DEFAULT_AVATAR).await?;

        tracing::info!("Created account {} ({})", user.id, user.username);
        Ok(user)
    }

    /// Verify email/password and issue a session token
    pub async fn signin(
        db: &Database,
        config: &Config,
        req: SigninRequest,
    ) -> Result<(User, String)> {
        let email = req.email.trim();
        if email.is_empty() || req.password.is_empty() {
            return Err(AppError::Validation("All fields are required!".to_string()));
        }

        let user = Self::find_by_email(db, email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found!".to_string()))?;

        if !verify_password(&req.password, &user.password_hash).await? {
            return Err(AppError::Unauthorized("Wrong credentials!".to_string()));
        }

        let token = Self::issue_token(&user.id, config)?;
        Ok((user, token))
    }

    /// Federated login: trust the asserted identity, provisioning the account on first sight
    pub async fn google(
        db: &Database,
        config: &Config,
        assertion: GoogleAuthRequest,
    ) -> Result<(User, String)> {
        let email = assertion.email.trim();
        if email.is_empty() || !is_valid_email(email) {
            return Err(AppError::Validation("A valid email is required!".to_string()));
        }

        let user = match Self::find_by_email(db, email).await? {
            Some(user) => user,
            None => {
                let draft = provision_account(&assertion);
                let password_hash = hash_password(&draft.secret, config.auth.bcrypt_cost).await?;
                match Self::insert_user(db, &draft.username, &draft.email, &password_hash, &draft.avatar)
                    .await
                {
                    Ok(user) => {
                        tracing::info!("Provisioned federated account {} ({})", user.id, user.username);
                        user
                    }
                    // A concurrent first login for the same email won the insert
                    Err(AppError::Conflict(_)) => Self::find_by_email(db, &draft.email)
                        .await?
                        .ok_or_else(|| AppError::Conflict("Username already exists!".to_string()))?,
                    Err(e) => return Err(e),
                }
            }
        };

        let token = Self::issue_token(&user.id, config)?;
        Ok((user, token))
    }

    pub async fn find_by_email(db: &Database, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(db.pool())
            .await?;
        Ok(user)
    }

    async fn insert_user(
        db: &Database,
        username: &str,
        email: &str,
        password_hash: &str,
        avatar: &str,
    ) -> Result<User> {
        let user_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, avatar, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user_id)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(avatar)
        .bind(&now)
        .bind(&now)
        .execute(db.pool())
        .await
        .map_err(map_unique_violation)?;

        let user: User = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(&user_id)
            .fetch_one(db.pool())
            .await?;
        Ok(user)
    }

    /// Sign a session token bound to the account id
    pub fn issue_token(user_id: &str, config: &Config) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(config.session_ttl_secs());

        let claims = Claims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt.secret.as_bytes()),
        )?;

        Ok(token)
    }

    /// Validate a session token against the current and previous secrets
    pub fn validate_token(token: &str, config: &Config) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let keys = std::iter::once(config.jwt.secret.as_str())
            .chain(config.jwt.previous_secrets.iter().map(|s| s.as_str()));

        for secret in keys {
            if let Ok(token_data) = decode::<Claims>(
                token,
                &DecodingKey::from_secret(secret.as_bytes()),
                &validation,
            ) {
                return Ok(token_data.claims);
            }
        }

        Err(AppError::Unauthorized("Invalid or expired session".to_string()))
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Translate a store-level unique violation into the matching conflict
pub fn map_unique_violation(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let message = db_err.message();
            if message.contains("email") {
                return AppError::Conflict("Email already exists!".to_string());
            }
            if message.contains("username") {
                return AppError::Conflict("Username already exists!".to_string());
            }
            return AppError::Conflict("Record already exists!".to_string());
        }
    }
    AppError::Database(err)
}

/// Build the account for a first federated login.
/// The username depends only on the asserted name and email, so it is stable across retries.
pub fn provision_account(assertion: &GoogleAuthRequest) -> AccountDraft {
    let email = assertion.email.trim().to_string();
    let source = if assertion.name.trim().is_empty() {
        email.split('@').next().unwrap_or_default().to_string()
    } else {
        assertion.name.clone()
    };

    let mut slug: String = source
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if slug.is_empty() {
        slug = "user".to_string();
    }

    let digest = hex::encode(Sha256::digest(email.to_lowercase().as_bytes()));
    let username = format!("{}-{}", slug, &digest[..8]);

    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();

    let avatar = assertion
        .photo
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_AVATAR)
        .to_string();

    AccountDraft {
        username,
        email,
        secret,
        avatar,
    }
}

/// Hash password using bcrypt on the blocking pool
pub async fn hash_password(password: &str, cost: u32) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(AppError::from)
}

/// Verify password against hash
pub async fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
        .map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assertion(name: &str, email: &str) -> GoogleAuthRequest {
        GoogleAuthRequest {
            name: name.to_string(),
            email: email.to_string(),
            photo: None,
        }
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("ana@x.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("ana@x"));
        assert!(!is_valid_email("ana x@x.com"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email("ana.x.com"));
    }

    #[test]
    fn provisioning_is_stable_per_email() {
        let a = provision_account(&assertion("Ana María Pérez", "Ana@X.com"));
        let b = provision_account(&assertion("Ana María Pérez", "ana@x.com"));
        assert_eq!(a.username, b.username);
        assert!(a.username.starts_with("anamaraprez-"));
        assert_eq!(a.username.len(), "anamaraprez-".len() + 8);
        assert_eq!(a.email, "Ana@X.com");
        assert_eq!(a.avatar, DEFAULT_AVATAR);
        assert_eq!(a.secret.len(), 32);
        assert_ne!(a.secret, b.secret);
    }

    #[test]
    fn provisioning_falls_back_to_email_local_part() {
        let draft = provision_account(&assertion("  ", "bob.smith@x.com"));
        assert!(draft.username.starts_with("bobsmith-"));

        let draft = provision_account(&assertion("李雷", "li@x.com"));
        assert!(draft.username.starts_with("user-"));
    }

    #[test]
    fn provisioning_keeps_photo() {
        let mut req = assertion("Ana", "ana@x.com");
        req.photo = Some("https://photos.example/ana.png".to_string());
        assert_eq!(provision_account(&req).avatar, "https://photos.example/ana.png");
    }

    #[tokio::test]
    async fn password_hash_round_trip() {
        let hash = hash_password("secret1", 4).await.unwrap();
        assert_ne!(hash, "secret1");
        assert!(verify_password("secret1", &hash).await.unwrap());
        assert!(!verify_password("secret2", &hash).await.unwrap());
    }

    #[test]
    fn tokens_validate_with_rotated_secret() {
        let mut config = Config::default();
        config.jwt.secret = "old-secret".to_string();
        let token = AuthService::issue_token("user-1", &config).unwrap();

        config.jwt.secret = "new-secret".to_string();
        assert!(AuthService::validate_token(&token, &config).is_err());

        config.jwt.previous_secrets = vec!["old-secret".to_string()];
        let claims = AuthService::validate_token(&token, &config).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn oversized_lifetime_does_not_panic() {
        let mut config = Config::default();
        config.jwt.secret = "s".to_string();
        config.jwt.access_token_expire_minutes = u64::MAX;
        let token = AuthService::issue_token("user-1", &config).unwrap();
        let claims = AuthService::validate_token(&token, &config).unwrap();
        assert_eq!(
            (claims.exp - claims.iat) as u64,
            crate::config::MAX_SESSION_MINUTES * 60
        );
    }
}
