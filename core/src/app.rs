use std::sync::Arc;

use diesel_async::{
    AsyncPgConnection,
    pooled_connection::{AsyncDieselConnectionManager, deadpool::Pool},
};

use crate::{config::Config, dispatcher::DispatcherState, error::Result, fetcher::Fetcher};

pub type DbPool = Pool<AsyncPgConnection>;

/// Shared process-wide context handed to every axum handler and background
/// task. Cheap to clone — everything behind it is already an `Arc` or a pool
/// handle.
#[derive(Clone)]
pub struct App {
    pub diesel: Pool<AsyncPgConnection>,
    pub http: Arc<Fetcher>,
    pub config: Arc<Config>,
    pub dispatcher: Arc<DispatcherState>,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.database_url);
        let diesel = Pool::builder(manager)
            .max_size(config.pool_size)
            .build()
            .map_err(|e| crate::error::Error::Pool(e.to_string()))?;

        Ok(Self {
            diesel,
            http: Arc::new(Fetcher::default_fetcher()),
            config: Arc::new(config),
            dispatcher: Arc::new(DispatcherState::new()),
        })
    }
}
