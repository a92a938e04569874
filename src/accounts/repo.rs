use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

use crate::accounts::repo_types::{Account, UniqueField};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("{0} already exists")]
    Duplicate(UniqueField),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            return Self::NotFound;
        }
        let duplicate = err
            .as_database_error()
            .filter(|db| db.is_unique_violation())
            .and_then(|db| db.constraint())
            .and_then(UniqueField::from_constraint);
        match duplicate {
            Some(field) => Self::Duplicate(field),
            None => Self::Database(err),
        }
    }
}

/// Data access for accounts. Every call runs inside a transaction obtained
/// from [`AccountStore::begin`]; dropping that transaction without passing it
/// to [`AccountStore::commit`] rolls it back.
#[async_trait]
pub trait AccountStore: Send + Sync + 'static {
    type Tx: Send;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError>;

    async fn create(&self, tx: &mut Self::Tx, account: &Account) -> Result<(), StoreError>;
    async fn find_by_email(&self, tx: &mut Self::Tx, email: &str) -> Result<Account, StoreError>;
    async fn find_by_token(&self, tx: &mut Self::Tx, token: &str) -> Result<Account, StoreError>;
    async fn find_by_id(&self, tx: &mut Self::Tx, id: Uuid) -> Result<Account, StoreError>;
    /// Full-row upsert keyed by id.
    async fn update(&self, tx: &mut Self::Tx, account: &Account) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgAccountStore {
    db: PgPool,
}

impl PgAccountStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const SELECT_ACCOUNT: &str = r#"
    SELECT id, name, email, phone, password_hash, token, created_at, updated_at
    FROM users
"#;

#[async_trait]
impl AccountStore for PgAccountStore {
    type Tx = Transaction<'static, Postgres>;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        Ok(self.db.begin().await?)
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError> {
        Ok(tx.commit().await?)
    }

    async fn create(&self, tx: &mut Self::Tx, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, phone, password_hash, token, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(account.id)
        .bind(&account.name)
        .bind(&account.email)
        .bind(&account.phone)
        .bind(&account.password_hash)
        .bind(&account.token)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn find_by_email(&self, tx: &mut Self::Tx, email: &str) -> Result<Account, StoreError> {
        let sql = format!("{SELECT_ACCOUNT} WHERE email = $1");
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(email)
            .fetch_optional(&mut **tx)
            .await?;
        account.ok_or(StoreError::NotFound)
    }

    async fn find_by_token(&self, tx: &mut Self::Tx, token: &str) -> Result<Account, StoreError> {
        let sql = format!("{SELECT_ACCOUNT} WHERE token = $1");
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(token)
            .fetch_optional(&mut **tx)
            .await?;
        account.ok_or(StoreError::NotFound)
    }

    async fn find_by_id(&self, tx: &mut Self::Tx, id: Uuid) -> Result<Account, StoreError> {
        let sql = format!("{SELECT_ACCOUNT} WHERE id = $1");
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        account.ok_or(StoreError::NotFound)
    }

    async fn update(&self, tx: &mut Self::Tx, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, phone, password_hash, token, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                email = EXCLUDED.email,
                phone = EXCLUDED.phone,
                password_hash = EXCLUDED.password_hash,
                token = EXCLUDED.token,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(account.id)
        .bind(&account.name)
        .bind(&account.email)
        .bind(&account.phone)
        .bind(&account.password_hash)
        .bind(&account.token)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}
