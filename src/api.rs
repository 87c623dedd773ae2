//! HTTP surface: `POST /predict`

use crate::error::{ApiError, InferenceError};
use crate::metrics::ServiceMetrics;
use crate::models::FraudClassifier;
use crate::types::PredictionResponse;
use crate::validation::parse_transaction;
use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, error, warn, Level};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<dyn FraudClassifier>,
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    pub fn new(classifier: Arc<dyn FraudClassifier>, metrics: Arc<ServiceMetrics>) -> Self {
        Self {
            classifier,
            metrics,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Validate the body, score it, and return the label and fraud probability.
async fn predict(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PredictionResponse>, ApiError> {
    let start_time = Instant::now();
    state.metrics.record_request();

    let transaction = parse_transaction(&body).map_err(|errors| {
        state.metrics.record_rejection();
        warn!(fields = ?errors.fields(), error = %errors, "Rejected invalid transaction");
        errors
    })?;

    let features = transaction.feature_vector();
    let classifier = Arc::clone(&state.classifier);

    // CPU-bound; keep it off the async workers. A panic surfaces as a JoinError.
    let outcome = tokio::task::spawn_blocking(move || classifier.predict(&features))
        .await
        .map_err(|e| InferenceError::TaskFailed(e.to_string()))
        .and_then(|result| result);

    let prediction = match outcome {
        Ok(prediction) => prediction,
        Err(e) => {
            state.metrics.record_failure();
            error!(
                model = %state.classifier.name(),
                error = %e,
                "Inference failed"
            );
            return Err(e.into());
        }
    };

    let latency = start_time.elapsed();
    state.metrics.record_prediction(latency, &prediction);

    debug!(
        prediction = prediction.label,
        fraud_probability = prediction.fraud_probability,
        latency_us = latency.as_micros() as u64,
        "Transaction scored"
    );

    Ok(Json(PredictionResponse::from(prediction)))
}
