use std::sync::Arc;

use crate::agents::ModelClient;
use crate::config::Config;
use crate::db::DbPool;
use crate::search::SearchService;

pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub model: Arc<dyn ModelClient>,
    pub search: Arc<SearchService>,
}
