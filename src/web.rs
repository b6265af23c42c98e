use crate::app::{
    errors::QueryError,
    service::QueryService,
    types::{HealthResponse, LocationsResponse, RecommendResponse, TagSearchResponse},
};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tokio::signal;

const DEFAULT_RECOMMEND_N: u32 = 5;
const DEFAULT_TAG_N: u32 = 10;

#[derive(Clone)]
pub struct SharedState {
    service: Arc<QueryService>,
    request_timeout: Duration,
}

impl SharedState {
    pub fn new(service: Arc<QueryService>, request_timeout: Duration) -> Self {
        Self {
            service,
            request_timeout,
        }
    }

    /// Run blocking service work off the async runtime, bounded by the request timeout.
    async fn run<T, F>(&self, work: F) -> Result<T, HttpError>
    where
        T: Send + 'static,
        F: FnOnce(&QueryService) -> Result<T, QueryError> + Send + 'static,
    {
        let service = self.service.clone();
        let task = tokio::task::spawn_blocking(move || work(&service));

        match tokio::time::timeout(self.request_timeout, task).await {
            Ok(Ok(result)) => result.map_err(HttpError),
            Ok(Err(join_err)) => Err(HttpError(QueryError::Other(anyhow::anyhow!(
                "request task failed: {join_err}"
            )))),
            Err(_) => Err(HttpError(QueryError::Timeout(self.request_timeout))),
        }
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/recommend", get(recommend))
        .route("/api/search-by-tag", get(search_by_tag))
        .route("/api/locations/all", get(list_all))
        .route("/api/health", get(health))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                log::error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::warn!("shutting down");
}

async fn serve(addr: String, state: SharedState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn start_daemon(addr: String, state: SharedState) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(serve(addr, state))
}

#[derive(Debug)]
struct HttpError(QueryError);

// Tell axum how to convert `QueryError` into a response.
impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            QueryError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            QueryError::ServiceUnavailable(_) => {
                log::warn!("{}", self.0);
                StatusCode::SERVICE_UNAVAILABLE
            }
            QueryError::Timeout(_) => {
                log::error!("{}", self.0);
                StatusCode::GATEWAY_TIMEOUT
            }
            err if err.is_upstream() => {
                log::error!("upstream failure: {err}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            err => {
                log::error!("{err:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

impl From<QueryRejection> for HttpError {
    fn from(rejection: QueryRejection) -> Self {
        HttpError(QueryError::invalid(rejection.body_text()))
    }
}

#[derive(Debug, Deserialize)]
pub struct RecommendParams {
    pub query: String,
    pub n: Option<u32>,
    pub min_score: Option<f32>,
}

async fn recommend(
    State(state): State<SharedState>,
    params: Result<Query<RecommendParams>, QueryRejection>,
) -> Result<Json<RecommendResponse>, HttpError> {
    let Query(params) = params?;
    log::debug!("recommend: {params:?}");

    let n = params.n.unwrap_or(DEFAULT_RECOMMEND_N);
    let min_score = params.min_score.unwrap_or(0.0);

    state
        .run(move |service| service.recommend(&params.query, n, min_score))
        .await
        .map(Json)
}

#[derive(Debug, Deserialize)]
pub struct TagParams {
    pub tag: String,
    pub n: Option<u32>,
}

async fn search_by_tag(
    State(state): State<SharedState>,
    params: Result<Query<TagParams>, QueryRejection>,
) -> Result<Json<TagSearchResponse>, HttpError> {
    let Query(params) = params?;
    log::debug!("search-by-tag: {params:?}");

    let n = params.n.unwrap_or(DEFAULT_TAG_N);

    state
        .run(move |service| service.search_by_tag(&params.tag, n))
        .await
        .map(Json)
}

async fn list_all(State(state): State<SharedState>) -> Result<Json<LocationsResponse>, HttpError> {
    state.run(|service| service.list_all()).await.map(Json)
}

async fn health(State(state): State<SharedState>) -> Result<Json<HealthResponse>, HttpError> {
    state.run(|service| service.health()).await.map(Json)
}
