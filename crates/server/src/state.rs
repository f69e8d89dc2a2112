use adapter::CommandEnvelope;
use axum::extract::FromRef;
use domain::AnalysisEvent;
use std::time::Duration;
use storage::Db;
use tokio::sync::{broadcast, mpsc};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub sender: mpsc::Sender<CommandEnvelope>,
    pub tx_events: broadcast::Sender<AnalysisEvent>,
    /// Upper bound on one analysis request, fetch and LLM calls included.
    pub request_timeout: Duration,
}

impl FromRef<AppState> for Db {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}
