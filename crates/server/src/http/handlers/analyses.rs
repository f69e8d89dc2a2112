use adapter::{AnalysisError, AnalysisOutcome, CommandEnvelope};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use domain::{AnalysisParams, AppCommand, CacheEntry};
use serde::Deserialize;
use storage::Db;
use tokio::sync::oneshot;

use crate::state::AppState;

type ApiError = (StatusCode, String);

#[derive(Deserialize)]
pub struct ListQuery {
    pub url: String,
}

fn error_status(e: &AnalysisError) -> StatusCode {
    match e {
        AnalysisError::InvalidParams(_) => StatusCode::BAD_REQUEST,
        AnalysisError::ThreadUnavailable(_) | AnalysisError::Llm(_) => StatusCode::BAD_GATEWAY,
        AnalysisError::Malformed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AnalysisError::Storage(_) | AnalysisError::Report(_) | AnalysisError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub async fn create_analysis(
    State(state): State<AppState>,
    Json(params): Json<AnalysisParams>,
) -> Result<Json<AnalysisOutcome>, ApiError> {
    params
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let url = params.url.clone();

    let (resp, wait) = oneshot::channel();
    let envelope = CommandEnvelope {
        cmd: AppCommand::Analyze(params),
        resp,
    };
    if state.sender.send(envelope).await.is_err() {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Worker closed".to_string(),
        ));
    }

    let result = match tokio::time::timeout(state.request_timeout, wait).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Worker dropped the request".to_string(),
            ))
        }
        Err(_) => {
            tracing::warn!("Analysis of {} timed out", url);
            return Err((
                StatusCode::GATEWAY_TIMEOUT,
                format!("Analysis did not finish within {:?}", state.request_timeout),
            ));
        }
    };

    result
        .map(Json)
        .map_err(|e| (error_status(&e), e.to_string()))
}

/// Cached rows for one thread, without touching reddit or the model.
pub async fn list_analyses(
    State(db): State<Db>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<CacheEntry>>, ApiError> {
    let rows = db
        .list_analyses_for_url(&query.url)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapter::FetchError;
    use domain::ParamError;

    #[test]
    fn errors_map_to_http_statuses() {
        let unavailable = AnalysisError::ThreadUnavailable(FetchError::Status {
            url: "u".into(),
            status: 503,
        });
        assert_eq!(error_status(&unavailable), StatusCode::BAD_GATEWAY);
        assert_eq!(
            error_status(&AnalysisError::InvalidParams(ParamError::FocusTooLong(60))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_status(&AnalysisError::Internal("join".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
