use std::sync::Arc;

use crate::libs::messaging::MessagingService;
use crate::libs::storage::database::storage_traits::StoreError;
use crate::open_messaging_service;

use super::config::Config;

pub struct State {
    pub config: Config,
    pub messaging: MessagingService,
}

impl State {
    pub fn new(config: Config) -> Result<Arc<Self>, StoreError> {
        let messaging = open_messaging_service(&config.database_path, config.database_pool_size)?;

        Ok(Arc::new(Self { config, messaging }))
    }

    pub fn from_service(config: Config, messaging: MessagingService) -> Arc<Self> {
        Arc::new(Self { config, messaging })
    }
}
