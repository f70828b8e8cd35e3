use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::repository::{NewUser, Repository};

pub const MAX_USERNAME_LEN: usize = 150;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Letters, digits and `@ . + - _`, at most 150 characters.
pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() {
        return Err(CoreError::InvalidUsername("username must not be empty".into()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(CoreError::InvalidUsername(format!(
            "username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    if let Some(bad) = username
        .chars()
        .find(|c| !(c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')))
    {
        return Err(CoreError::InvalidUsername(format!(
            "'{bad}' is not allowed; use letters, digits and @/./+/-/_ only"
        )));
    }
    Ok(())
}

pub fn issue_token() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn hash_token(token: &str) -> String {
    blake3::hash(token.as_bytes()).to_hex().to_string()
}

/// Creates a user and returns it with its token. Only the token hash is stored.
pub async fn create_user<R>(repo: &R, username: &str) -> Result<(User, String)>
where
    R: Repository + ?Sized,
{
    let username = username.trim();
    validate_username(username)?;

    let token = issue_token();
    let user = repo
        .insert_user(NewUser {
            username: username.to_string(),
            token_hash: hash_token(&token),
        })
        .await?;

    info!(user_id = user.id, username = %user.username, "created user");
    Ok((user, token))
}

pub async fn authenticate<R>(repo: &R, token: &str) -> Result<Option<User>>
where
    R: Repository + ?Sized,
{
    let token = token.trim();
    if token.is_empty() {
        return Ok(None);
    }
    repo.find_user_by_token(&hash_token(token)).await
}
