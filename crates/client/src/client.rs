use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::executor::HttpExecutor;
use crate::http::ReqwestExecutor;
use crate::services::download::Downloads;
use crate::services::files::Files;
use crate::services::projects::Projects;
use crate::services::upload::Uploads;
use crate::services::users::Users;

/// Entry point to the Seven Bridges platform API.
///
/// Cheap to clone; every service shares one executor.
#[derive(Clone)]
pub struct SevenBridges {
    executor: Arc<dyn HttpExecutor>,
    config: Arc<ClientConfig>,
}

impl SevenBridges {
    /// Builds a client that talks HTTP through `reqwest`.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let executor = ReqwestExecutor::new(&config)?;
        Ok(Self::with_executor(Arc::new(executor), config))
    }

    /// Builds a client on a caller-supplied executor.
    pub fn with_executor(executor: Arc<dyn HttpExecutor>, config: ClientConfig) -> Self {
        Self {
            executor,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn users(&self) -> Users {
        Users::new(Arc::clone(&self.executor))
    }

    pub fn files(&self) -> Files {
        Files::new(Arc::clone(&self.executor))
    }

    pub fn projects(&self) -> Projects {
        Projects::new(Arc::clone(&self.executor))
    }

    pub fn uploads(&self) -> Uploads {
        Uploads::new(Arc::clone(&self.executor), self.config.upload.clone())
    }

    pub fn downloads(&self) -> Downloads {
        Downloads::new(Arc::clone(&self.executor), self.config.download.clone())
    }
}

impl std::fmt::Debug for SevenBridges {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SevenBridges")
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}
