//! Bearer token authentication
//!
//! Every `/api/*` request carries `Authorization: Bearer <token>`. Tokens are
//! 64 hex characters drawn from the thread RNG; only their SHA-256 digest is
//! stored, in `api_tokens`.

use chrono::Utc;
use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

// ========================================
// Error Types
// ========================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiAuthError {
    /// No Authorization header
    MissingCredentials,

    /// Header present but not `Bearer <token>`
    MalformedHeader,

    /// Token hash not found
    UnknownToken,

    /// Database error during lookup
    DatabaseError(String),
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::MissingCredentials => write!(f, "Missing authorization header"),
            ApiAuthError::MalformedHeader => {
                write!(f, "Authorization header must be 'Bearer <token>'")
            }
            ApiAuthError::UnknownToken => write!(f, "Invalid or expired token"),
            ApiAuthError::DatabaseError(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for ApiAuthError {}

/// Caller identity attached to authenticated requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
}

// ========================================
// Token Handling
// ========================================

/// Generate a fresh 256-bit token as lowercase hex
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// SHA-256 of the token, as 64 lowercase hex characters
///
/// # Examples
///
/// ```
/// use mediscan_common::api::auth::hash_token;
///
/// let hash = hash_token("secret");
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, hash_token("secret"));
/// ```
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Extract the token from an Authorization header value
pub fn parse_bearer(header_value: Option<&str>) -> Result<&str, ApiAuthError> {
    let value = header_value.ok_or(ApiAuthError::MissingCredentials)?;
    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(ApiAuthError::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ApiAuthError::MalformedHeader);
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(ApiAuthError::MalformedHeader);
    }
    Ok(token)
}

// ========================================
// Database Operations
// ========================================

/// Resolve a bearer token to its user and stamp `last_used_at`
pub async fn authenticate(db: &SqlitePool, token: &str) -> Result<AuthenticatedUser, ApiAuthError> {
    let token_hash = hash_token(token);

    let row = sqlx::query(
        r#"
        SELECT u.id, u.email
        FROM api_tokens t
        JOIN users u ON u.id = t.user_id
        WHERE t.token_hash = ?
        "#,
    )
    .bind(&token_hash)
    .fetch_optional(db)
    .await
    .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?
    .ok_or(ApiAuthError::UnknownToken)?;

    let id: String = row.get("id");
    let user_id = Uuid::parse_str(&id)
        .map_err(|e| ApiAuthError::DatabaseError(format!("bad user id {}: {}", id, e)))?;

    sqlx::query("UPDATE api_tokens SET last_used_at = ? WHERE token_hash = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(&token_hash)
        .execute(db)
        .await
        .map_err(|e| ApiAuthError::DatabaseError(e.to_string()))?;

    Ok(AuthenticatedUser {
        user_id,
        email: row.get("email"),
    })
}

/// Create the user if needed and issue a new token for them
///
/// Returns the caller identity and the plaintext token. The plaintext is not
/// recoverable afterwards.
pub async fn issue_token(db: &SqlitePool, email: &str) -> crate::Result<(AuthenticatedUser, String)> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(crate::Error::InvalidInput(format!("Invalid email address: {:?}", email)));
    }

    let now = Utc::now().to_rfc3339();

    sqlx::query("INSERT OR IGNORE INTO users (id, email, created_at) VALUES (?, ?, ?)")
        .bind(Uuid::new_v4().to_string())
        .bind(email)
        .bind(&now)
        .execute(db)
        .await?;

    let id: String = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(db)
        .await?;
    let user_id = Uuid::parse_str(&id)
        .map_err(|e| crate::Error::Internal(format!("bad user id {}: {}", id, e)))?;

    let token = generate_token();
    sqlx::query("INSERT INTO api_tokens (token_hash, user_id, created_at) VALUES (?, ?, ?)")
        .bind(hash_token(&token))
        .bind(&id)
        .bind(&now)
        .execute(db)
        .await?;

    Ok((
        AuthenticatedUser {
            user_id,
            email: email.to_string(),
        },
        token,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
        // Known SHA-256 of "abc"
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_generate_token_shape() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer(Some("Bearer abc123")), Ok("abc123"));
        assert_eq!(parse_bearer(Some("bearer  abc123 ")), Ok("abc123"));
        assert_eq!(parse_bearer(None), Err(ApiAuthError::MissingCredentials));
        assert_eq!(parse_bearer(Some("Basic xyz")), Err(ApiAuthError::MalformedHeader));
        assert_eq!(parse_bearer(Some("Bearer")), Err(ApiAuthError::MalformedHeader));
        assert_eq!(parse_bearer(Some("Bearer ")), Err(ApiAuthError::MalformedHeader));
    }
}
