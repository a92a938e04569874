use std::{future::Future, time::Duration};

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::accounts::{
    dto::{describe, AccountView, LoginRequest, RegisterRequest},
    password::Argon2Hasher,
    repo::{AccountStore, StoreError},
    repo_types::{Account, UniqueField},
    token::generate_token,
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid credentials")]
    Unauthorized,
    #[error("email already registered")]
    DuplicateEmail,
    #[error("phone already registered")]
    DuplicatePhone,
    #[error("account not found")]
    NotFound,
    #[error("operation exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),
    #[error("password hashing failed: {0}")]
    Hashing(#[source] anyhow::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Registration, login and token lookup. Each public operation runs in its
/// own store transaction under a deadline; any early return drops the
/// transaction uncommitted, which rolls it back.
pub struct AccountService<S: AccountStore> {
    store: S,
    hasher: Argon2Hasher,
    timeout: Duration,
}

impl<S: AccountStore> AccountService<S> {
    pub fn new(store: S, hasher: Argon2Hasher, timeout: Duration) -> Self {
        Self {
            store,
            hasher,
            timeout,
        }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[cfg(test)]
    pub fn hasher(&self) -> &Argon2Hasher {
        &self.hasher
    }

    async fn with_deadline<T, F>(&self, op: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => result,
            Err(_) => {
                error!(timeout = ?self.timeout, "deadline elapsed; transaction rolled back");
                Err(ServiceError::DeadlineExceeded(self.timeout))
            }
        }
    }

    #[instrument(skip_all)]
    pub async fn register(&self, req: RegisterRequest) -> Result<AccountView, ServiceError> {
        let req = req.normalize();
        if let Err(e) = req.validate() {
            let msg = describe(&e);
            warn!(%msg, "registration rejected");
            return Err(ServiceError::InvalidInput(msg));
        }
        let (Some(name), Some(email), Some(password)) = (req.name, req.email, req.password)
        else {
            return Err(ServiceError::InvalidInput("missing required field".into()));
        };
        let phone = req.phone;

        self.with_deadline(async move {
            let mut tx = self.store.begin().await?;

            let password_hash = self
                .hasher
                .hash_password(&password)
                .map_err(ServiceError::Hashing)?;

            let now = OffsetDateTime::now_utc();
            let account = Account {
                id: Uuid::new_v4(),
                name,
                email,
                phone,
                password_hash,
                token: None,
                created_at: now,
                updated_at: now,
            };

            self.store
                .create(&mut tx, &account)
                .await
                .map_err(duplicate_or_store)?;
            self.store.commit(tx).await.map_err(duplicate_or_store)?;

            info!(user_id = %account.id, email = %account.email, "user registered");
            Ok(AccountView::from(account))
        })
        .await
    }

    /// Returns a fresh token. Unknown email and wrong password both yield
    /// [`ServiceError::Unauthorized`].
    #[instrument(skip_all)]
    pub async fn login(&self, req: LoginRequest) -> Result<String, ServiceError> {
        let req = req.normalize();
        if let Err(e) = req.validate() {
            let msg = describe(&e);
            warn!(%msg, "login rejected");
            return Err(ServiceError::InvalidInput(msg));
        }
        let (Some(email), Some(password)) = (req.email, req.password) else {
            return Err(ServiceError::InvalidInput("missing required field".into()));
        };

        self.with_deadline(async move {
            let mut tx = self.store.begin().await?;

            let mut account = match self.store.find_by_email(&mut tx, &email).await {
                Ok(a) => a,
                Err(StoreError::NotFound) => {
                    self.hasher.verify_dummy(&password);
                    warn!(%email, "login unknown email");
                    return Err(ServiceError::Unauthorized);
                }
                Err(e) => return Err(e.into()),
            };

            let ok = self
                .hasher
                .verify_password(&password, &account.password_hash)
                .map_err(ServiceError::Hashing)?;
            if !ok {
                warn!(%email, user_id = %account.id, "login invalid password");
                return Err(ServiceError::Unauthorized);
            }

            let token = generate_token();
            account.token = Some(token.clone());
            account.updated_at = OffsetDateTime::now_utc();
            self.store.update(&mut tx, &account).await?;
            self.store.commit(tx).await?;

            info!(user_id = %account.id, "user logged in");
            Ok(token)
        })
        .await
    }

    /// Resolves a bearer token to the owning account id.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, token: &str) -> Result<Uuid, ServiceError> {
        self.with_deadline(async {
            let mut tx = self.store.begin().await?;
            let account = match self.store.find_by_token(&mut tx, token).await {
                Ok(a) => a,
                Err(StoreError::NotFound) => return Err(ServiceError::Unauthorized),
                Err(e) => return Err(e.into()),
            };
            self.store.commit(tx).await?;
            debug!(user_id = %account.id, "token accepted");
            Ok(account.id)
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn get_account(&self, id: Uuid) -> Result<AccountView, ServiceError> {
        self.with_deadline(async {
            let mut tx = self.store.begin().await?;
            let account = match self.store.find_by_id(&mut tx, id).await {
                Ok(a) => a,
                Err(StoreError::NotFound) => return Err(ServiceError::NotFound),
                Err(e) => return Err(e.into()),
            };
            self.store.commit(tx).await?;
            Ok(AccountView::from(account))
        })
        .await
    }
}

fn duplicate_or_store(err: StoreError) -> ServiceError {
    match err {
        StoreError::Duplicate(UniqueField::Email) => ServiceError::DuplicateEmail,
        StoreError::Duplicate(UniqueField::Phone) => ServiceError::DuplicatePhone,
        other => ServiceError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{memory::MemoryAccountStore, password::test_hasher};

    fn service() -> AccountService<MemoryAccountStore> {
        AccountService::new(
            MemoryAccountStore::default(),
            test_hasher(),
            Duration::from_secs(5),
        )
    }

    fn register_req(email: &str, phone: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            name: Some("Ada Lovelace".into()),
            email: Some(email.into()),
            phone: phone.map(Into::into),
            password: Some("analytical-engine".into()),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    #[tokio::test]
    async fn register_returns_projection() {
        let svc = service();
        let view = svc
            .register(register_req("ada@example.com", Some("555-0100")))
            .await
            .expect("register");
        assert_eq!(view.email, "ada@example.com");
        assert_eq!(view.phone.as_deref(), Some("555-0100"));
        assert_eq!(view.created_at, view.updated_at);
        assert_eq!(svc.store().len(), 1);

        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("analytical-engine"));
        assert!(!json.contains("password"));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_and_writes_one_row() {
        let svc = service();
        svc.register(register_req("ada@example.com", None)).await.unwrap();
        let err = svc
            .register(register_req("ADA@example.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateEmail));
        assert_eq!(svc.store().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_phone_is_rejected() {
        let svc = service();
        svc.register(register_req("a@example.com", Some("555"))).await.unwrap();
        let err = svc
            .register(register_req("b@example.com", Some("555")))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicatePhone));
        assert_eq!(svc.store().len(), 1);
    }

    #[tokio::test]
    async fn accounts_without_phone_do_not_collide() {
        let svc = service();
        svc.register(register_req("a@example.com", None)).await.unwrap();
        svc.register(register_req("b@example.com", Some(" "))).await.unwrap();
        assert_eq!(svc.store().len(), 2);
    }

    #[tokio::test]
    async fn malformed_email_writes_nothing() {
        let svc = service();
        let err = svc
            .register(register_req("not-an-email", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert_eq!(svc.store().len(), 0);
    }

    #[tokio::test]
    async fn failed_commit_leaves_no_rows() {
        let svc = service();
        svc.store().fail_commits(true);
        let err = svc
            .register(register_req("ada@example.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::Database(_))));
        assert_eq!(svc.store().len(), 0);
    }

    #[tokio::test]
    async fn deadline_rolls_back() {
        let svc = AccountService::new(
            MemoryAccountStore::default(),
            test_hasher(),
            Duration::from_millis(20),
        );
        svc.store().delay_commits(Duration::from_millis(500));
        let err = svc
            .register(register_req("ada@example.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DeadlineExceeded(_)));
        assert_eq!(svc.store().len(), 0);
    }

    #[tokio::test]
    async fn login_rotates_token() {
        let svc = service();
        let view = svc.register(register_req("ada@example.com", None)).await.unwrap();

        let first = svc
            .login(login_req("ada@example.com", "analytical-engine"))
            .await
            .expect("first login");
        assert!(!first.is_empty());
        assert_eq!(svc.authenticate(&first).await.unwrap(), view.id);

        let second = svc
            .login(login_req("ada@example.com", "analytical-engine"))
            .await
            .expect("second login");
        assert_ne!(first, second);
        assert!(matches!(
            svc.authenticate(&first).await.unwrap_err(),
            ServiceError::Unauthorized
        ));
        assert_eq!(svc.authenticate(&second).await.unwrap(), view.id);

        let refreshed = svc.get_account(view.id).await.unwrap();
        assert_eq!(refreshed.created_at, view.created_at);
        assert!(refreshed.updated_at >= view.updated_at);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let svc = service();
        svc.register(register_req("ada@example.com", None)).await.unwrap();

        let wrong = svc
            .login(login_req("ada@example.com", "nope"))
            .await
            .unwrap_err();
        let unknown = svc
            .login(login_req("bob@example.com", "analytical-engine"))
            .await
            .unwrap_err();
        assert!(matches!(wrong, ServiceError::Unauthorized));
        assert!(matches!(unknown, ServiceError::Unauthorized));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn unknown_email_still_runs_a_verification() {
        let svc = service();
        let before = svc.hasher().verifications();
        let err = svc
            .login(login_req("nobody@example.com", "analytical-engine"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized));
        assert_eq!(svc.hasher().verifications(), before + 1);
    }

    async fn stored_token(svc: &AccountService<MemoryAccountStore>, email: &str) -> Option<String> {
        let store = svc.store();
        let mut tx = store.begin().await.unwrap();
        store.find_by_email(&mut tx, email).await.unwrap().token
    }

    #[tokio::test]
    async fn failed_login_commit_keeps_previous_token() {
        let svc = service();
        let view = svc.register(register_req("ada@example.com", None)).await.unwrap();
        let first = svc
            .login(login_req("ada@example.com", "analytical-engine"))
            .await
            .expect("first login");

        svc.store().fail_commits(true);
        let err = svc
            .login(login_req("ada@example.com", "analytical-engine"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::Database(_))));

        svc.store().fail_commits(false);
        assert_eq!(stored_token(&svc, "ada@example.com").await, Some(first.clone()));
        assert_eq!(svc.authenticate(&first).await.unwrap(), view.id);
    }

    #[tokio::test]
    async fn login_past_deadline_keeps_previous_token() {
        let svc = AccountService::new(
            MemoryAccountStore::default(),
            test_hasher(),
            Duration::from_millis(200),
        );
        let view = svc.register(register_req("ada@example.com", None)).await.unwrap();
        let first = svc
            .login(login_req("ada@example.com", "analytical-engine"))
            .await
            .expect("first login");

        svc.store().delay_commits(Duration::from_secs(2));
        let err = svc
            .login(login_req("ada@example.com", "analytical-engine"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DeadlineExceeded(_)));

        svc.store().delay_commits(Duration::ZERO);
        assert_eq!(stored_token(&svc, "ada@example.com").await, Some(first.clone()));
        assert_eq!(svc.authenticate(&first).await.unwrap(), view.id);
    }

    #[tokio::test]
    async fn login_with_malformed_email_is_invalid_input() {
        let svc = service();
        let err = svc.login(login_req("nope", "pw")).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn repeated_reads_are_identical() {
        let svc = service();
        svc.register(register_req("ada@example.com", None)).await.unwrap();

        let store = svc.store();
        let mut tx = store.begin().await.unwrap();
        let a = store.find_by_email(&mut tx, "ada@example.com").await.unwrap();
        let b = store.find_by_email(&mut tx, "ada@example.com").await.unwrap();
        assert_eq!(AccountView::from(a), AccountView::from(b));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let svc = service();
        let err = svc.get_account(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
    }
}
