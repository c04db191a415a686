use std::sync::Arc;

use crate::config::Config;
use crate::fanout::registry::ConnectionRegistry;
use crate::fanout::EventFanout;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub registry: ConnectionRegistry,
    pub fanout: EventFanout,
    pub config: Arc<Config>,
}
