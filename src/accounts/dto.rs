use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::accounts::repo_types::Account;

/// Request body for registration. Fields are optional at the serde level so
/// that a missing field is reported by validation, not by the JSON parser.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(required, length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(required, email, length(max = 255))]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(required, length(min = 1, max = 255))]
    pub password: Option<String>,
}

impl RegisterRequest {
    /// Trims, lower-cases the email and drops a blank phone.
    pub fn normalize(mut self) -> Self {
        self.name = self.name.map(|n| n.trim().to_string());
        self.email = self.email.map(|e| e.trim().to_lowercase());
        self.phone = self
            .phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        self
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(required, email, length(max = 255))]
    pub email: Option<String>,
    #[validate(required, length(min = 1, max = 255))]
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn normalize(mut self) -> Self {
        self.email = self.email.map(|e| e.trim().to_lowercase());
        self
    }
}

/// Public projection of an account. Never carries the hash or the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Account> for AccountView {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            name: a.name,
            email: a.email,
            phone: a.phone,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Response for `GET /users/:id`.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub caller_id: Uuid,
    pub user: AccountView,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Flattens validator output into "email: email, name: required" form, sorted
/// by field so the message is stable.
pub fn describe(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let codes: Vec<String> = errs.iter().map(|e| e.code.to_string()).collect();
            format!("{field}: {}", codes.join("/"))
        })
        .collect();
    parts.sort();
    format!("invalid fields: {}", parts.join(", "))
}
