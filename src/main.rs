mod accounts;
mod app;
mod config;
mod db;
mod error;
mod response;
mod state;

use crate::{
    accounts::{password::Argon2Hasher, services::AccountService, PgAccountStore},
    config::{AppConfig, LogConfig},
    state::AppState,
};

fn init_tracing(log: &LogConfig) {
    if log.json {
        tracing_subscriber::fmt()
            .with_env_filter(log.filter.as_str())
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log.filter.as_str())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(&config.log);

    let pool = db::connect(&config).await?;
    if config.auto_migrate {
        db::migrate(&pool).await?;
    } else {
        tracing::info!("AUTO_MIGRATE disabled; skipping migrations");
    }

    let hasher = Argon2Hasher::new(&config.hashing)?;
    let accounts = AccountService::new(PgAccountStore::new(pool), hasher, config.request_timeout);
    let state = AppState::new(accounts);

    let app = app::build_app(state);
    app::serve(app, &config).await
}
