// src/auth.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::{Request, State};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, error, warn};

use crate::core::Database;
use crate::types::{CallerContext, Role};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub exp: usize,
    pub iat: usize,
}

pub struct AuthConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthConfig {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue_token(&self, user_id: &str, valid_for: Duration, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: (now + valid_for).timestamp().max(0) as usize,
            iat: now.timestamp().max(0) as usize,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).context("Failed to sign token")
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}

/// Role and student/company id for a user, or `None` when the user is unknown.
pub async fn resolve_caller(pool: &SqlitePool, user_id: &str) -> Result<Option<CallerContext>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT role FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to load user")?;

    let Some((role,)) = row else {
        return Ok(None);
    };
    let role: Role = role.parse()?;

    let scope_table = match role {
        Role::Student => Some("students"),
        Role::Company => Some("companies"),
        Role::Admin => None,
    };

    let scope_id = match scope_table {
        Some(table) => {
            let sql = format!("SELECT id FROM {} WHERE user_id = ?", table);
            let found: Option<(String,)> = sqlx::query_as(&sql)
                .bind(user_id)
                .fetch_optional(pool)
                .await
                .with_context(|| format!("Failed to load {} profile", role))?;
            found.map(|(id,)| id)
        }
        None => None,
    };

    Ok(Some(CallerContext {
        user_id: user_id.to_string(),
        role,
        scope_id,
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    TokenVerificationFailed,
    UnknownUser,
    DatabaseError,
}

impl AuthError {
    pub fn message(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "Authorization token required",
            AuthError::InvalidToken => "Invalid authorization token format",
            AuthError::TokenVerificationFailed => "Token verification failed",
            AuthError::UnknownUser => "User not found",
            AuthError::DatabaseError => "Database error occurred",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            AuthError::UnknownUser => Status::NotFound,
            AuthError::DatabaseError => Status::InternalServerError,
            _ => Status::Unauthorized,
        }
    }
}

/// Last guard failure for the request, read back by the error catchers.
#[derive(Debug, Default)]
pub struct AuthFailure(pub Option<AuthError>);

fn fail<T>(req: &Request<'_>, err: AuthError) -> Outcome<T, AuthError> {
    req.local_cache(|| AuthFailure(Some(err)));
    Outcome::Error((err.status(), err))
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CallerContext {
    type Error = AuthError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let auth_config = match req.guard::<&State<AuthConfig>>().await {
            Outcome::Success(config) => config,
            Outcome::Error(_) => return fail(req, AuthError::DatabaseError),
            Outcome::Forward(f) => return Outcome::Forward(f),
        };

        let database = match req.guard::<&State<Database>>().await {
            Outcome::Success(db) => db,
            Outcome::Error(_) => return fail(req, AuthError::DatabaseError),
            Outcome::Forward(f) => return Outcome::Forward(f),
        };

        let token = match req.headers().get_one("Authorization") {
            Some(header) => match header.strip_prefix("Bearer ") {
                Some(token) => token.trim(),
                None => {
                    warn!("Invalid Authorization header format");
                    return fail(req, AuthError::InvalidToken);
                }
            },
            None => {
                debug!("Missing Authorization header");
                return fail(req, AuthError::MissingToken);
            }
        };

        let claims = match auth_config.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!("Token verification failed: {}", e);
                return fail(req, AuthError::TokenVerificationFailed);
            }
        };

        match resolve_caller(database.pool(), &claims.sub).await {
            Ok(Some(caller)) => {
                debug!("Authenticated {} as {}", caller.user_id, caller.role);
                Outcome::Success(caller)
            }
            Ok(None) => {
                warn!("Token subject {} has no user row", claims.sub);
                fail(req, AuthError::UnknownUser)
            }
            Err(e) => {
                error!("Failed to resolve caller {}: {:#}", claims.sub, e);
                fail(req, AuthError::DatabaseError)
            }
        }
    }
}
