use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::config::Config;

pub struct State {
    pub pool: Pool<Postgres>,
    pub config: Config,
}

impl State {
    pub async fn new(config: Config) -> Result<Arc<Self>, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await?;

        Ok(Arc::new(Self { pool, config }))
    }

    pub fn lazy(config: Config) -> Result<Arc<Self>, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect_lazy(&config.database_url)?;

        Ok(Arc::new(Self { pool, config }))
    }

    pub fn token_lifetime(&self) -> chrono::Duration {
        chrono::Duration::hours(self.config.token_lifetime_hours)
    }
}
