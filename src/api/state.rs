use std::sync::Arc;

use crate::config::InsightsConfig;
use crate::insights::InsightsService;
use crate::scheduler::Scheduler;

#[derive(Clone)]
pub struct AppState {
    pub insights: InsightsService,
    pub scheduler: Scheduler,
    pub config: Arc<InsightsConfig>,
}
