use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::app::Result;
use crate::core::{ModelIdentifier, PredictionError, PredictionRegistry};

pub struct Server {
    host: String,
    port: u16,
    router: Router,
}

impl Server {
    pub fn new() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            router: Router::new(),
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn routes(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, self.router).await?;

        Ok(())
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<PredictionRegistry>,
    pub default_model: ModelIdentifier,
    pub prediction_timeout: Option<Duration>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PredictQuery {
    pub input: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PredictResponse {
    pub prediction: String,
    pub input_text: String,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub name: ModelIdentifier,
    pub pretrained: String,
    pub needs_mask: bool,
    pub loaded: bool,
}

#[derive(Debug, Clone, Copy)]
enum Completion {
    NextWord,
    Sentence,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/predict", get(predict))
        .route("/full_predict", get(full_predict))
        .route("/models", get(list_models))
        .route("/health", get(health))
        .with_state(state)
}

/// Status code for a prediction failure.
pub fn status_for(error: &PredictionError) -> StatusCode {
    match error {
        PredictionError::LockTimeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
        PredictionError::SentenceCompletionUnsupported(_) => StatusCode::BAD_REQUEST,
        PredictionError::UnknownModel(_) | PredictionError::ModelLoad { .. } | PredictionError::LockFile { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(error: PredictionError) -> Response {
    tracing::warn!("prediction unavailable: {}", error);
    (status_for(&error), error.to_string()).into_response()
}

async fn predict(State(state): State<AppState>, Query(query): Query<PredictQuery>) -> Response {
    run_completion(state, query, Completion::NextWord).await
}

async fn full_predict(State(state): State<AppState>, Query(query): Query<PredictQuery>) -> Response {
    run_completion(state, query, Completion::Sentence).await
}

async fn run_completion(state: AppState, query: PredictQuery, completion: Completion) -> Response {
    let Some(text) = query.input else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Empty request.").into_response();
    };

    let catalog = state.registry.catalog();
    let requested = match query.model.as_deref() {
        Some(name) => match catalog.resolve(name) {
            Ok((id, _)) => id,
            Err(e) => return error_response(e),
        },
        None => state.default_model,
    };
    let id = match completion {
        Completion::NextWord => requested,
        Completion::Sentence => catalog.sentence_model_for(requested).unwrap_or(requested),
    };

    let registry = Arc::clone(&state.registry);
    let input = text.clone();
    let task = tokio::task::spawn_blocking(move || -> std::result::Result<String, PredictionError> {
        let model = registry.instance_of(id)?;
        match completion {
            Completion::NextWord => Ok(model.get_prediction(&input)),
            Completion::Sentence => model.get_full_prediction(&input),
        }
    });

    let joined = match state.prediction_timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::debug!("{} gave no suggestion within {:?}", id, limit);
                Ok(Ok(String::new()))
            }
        },
        None => task.await,
    };

    match joined {
        Ok(Ok(prediction)) => Json(PredictResponse {
            prediction,
            input_text: text,
        })
        .into_response(),
        Ok(Err(e)) => error_response(e),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn list_models(State(state): State<AppState>) -> Json<Vec<ModelInfo>> {
    let registry = &state.registry;
    Json(
        registry
            .catalog()
            .iter()
            .map(|(id, spec)| ModelInfo {
                name: id,
                pretrained: spec.pretrained.clone(),
                needs_mask: spec.needs_mask,
                loaded: registry.is_loaded(id),
            })
            .collect(),
    )
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
