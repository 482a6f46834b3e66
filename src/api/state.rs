use std::sync::Arc;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::engine::Engine;
use crate::observability::Metrics;
use crate::session::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<SessionRegistry>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Config, engine: Arc<dyn Engine>) -> Self {
        let metrics = Arc::new(Metrics::new());
        let sessions = Arc::new(SessionRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(
            engine,
            sessions.clone(),
            metrics.clone(),
        ));

        Self {
            config: Arc::new(config),
            dispatcher,
            sessions,
            metrics,
        }
    }
}
