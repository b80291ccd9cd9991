use std::sync::Arc;

use crate::run::executor::ExecutionClient;
use crate::run::recorder::ResultRecorder;
use crate::storage::Pool;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub executor: Arc<ExecutionClient>,
    pub recorder: Arc<ResultRecorder>,
}
