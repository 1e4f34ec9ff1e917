//! Runtime stage identity.

use std::fmt;
use std::sync::Arc;

use crate::config::PoolConfig;
use crate::handler::EventHandler;

/// A stage as seen by its controller: a stable id, the handler run for each
/// event, and the sizing of the stage's worker pool.
#[derive(Clone)]
pub struct RuntimeStage {
    id: String,
    handler: Arc<dyn EventHandler>,
    pool: PoolConfig,
}

impl RuntimeStage {
    /// Creates a stage with the default pool configuration.
    pub fn new(id: impl Into<String>, handler: Arc<dyn EventHandler>) -> Self {
        Self {
            id: id.into(),
            handler,
            pool: PoolConfig::default(),
        }
    }

    /// Sets the pool configuration.
    #[must_use]
    pub fn with_pool_config(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Returns the stage id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the stage handler.
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn EventHandler> {
        &self.handler
    }

    /// Returns the pool configuration.
    #[must_use]
    pub const fn pool_config(&self) -> &PoolConfig {
        &self.pool
    }
}

impl fmt::Debug for RuntimeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeStage")
            .field("id", &self.id)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
