use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Account record in the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, never exposed
    #[serde(skip_serializing)]
    pub token: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Column that tripped a unique constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Id,
    Email,
    Phone,
    Token,
}

impl UniqueField {
    /// Maps the constraint names declared in the migrations.
    pub fn from_constraint(name: &str) -> Option<Self> {
        match name {
            "users_pkey" => Some(Self::Id),
            "users_email_key" => Some(Self::Email),
            "users_phone_key" => Some(Self::Phone),
            "users_token_key" => Some(Self::Token),
            _ => None,
        }
    }
}

impl std::fmt::Display for UniqueField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Id => "id",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Token => "token",
        })
    }
}
