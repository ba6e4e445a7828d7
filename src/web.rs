use crate::{
    app::{AppError, Orchestrator, Source},
    config::{CaptureConfig, HighlightConfig},
    highlight::{
        schedule::{schedule_highlight, ScheduleOutcome},
        tabs::Tabs,
        MatchPolicy, PolicyKind, Selection,
    },
    pages::{CapturedPage, CategoryFilter},
    semantic,
};
use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;

/// Header naming the component that produced a response.
pub const SOURCE_HEADER: &str = "x-webmem-source";

pub struct SharedState {
    pub orchestrator: Orchestrator,
    pub tabs: Tabs,
    pub capture: CaptureConfig,
    pub highlight: HighlightConfig,
}

pub fn router(state: Arc<SharedState>) -> Router {
    Router::new()
        .route("/api/capture", post(capture))
        .route("/api/search", post(search))
        .route("/api/compare", post(compare))
        .route("/api/stats", get(stats))
        .route("/api/health", get(health))
        .route("/api/pages", post(open_page))
        .route("/api/pages/:id", axum::routing::delete(close_page))
        .route("/api/pages/:id/highlights", get(page_highlights))
        .route("/api/highlight", post(highlight))
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
                .layer(
                    tower_http::trace::TraceLayer::new_for_http()
                        .make_span_with(
                            tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                        )
                        .on_response(
                            tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                        ),
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
                log::error!("failed to install signal handler: {err}");
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
    log::info!("shutting down");
}

/// Serve the daemon on `listen` until interrupted.
pub async fn start_daemon(state: SharedState, listen: &str) -> anyhow::Result<()> {
    let app = router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("listening on {listen}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[derive(Debug)]
struct HttpError(AppError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) | AppError::Category(_) => StatusCode::BAD_REQUEST,
            AppError::Store(_) => {
                log::error!("{self:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

fn with_source<T: Serialize>(source: &Source, value: T) -> impl IntoResponse {
    ([(SOURCE_HEADER, source.label())], Json(value))
}

#[derive(Debug, Deserialize)]
pub struct CaptureRequest {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Full page HTML; text is extracted from it
    #[serde(default)]
    pub html: Option<String>,
    /// Already extracted page text
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub favicon: Option<String>,
}

async fn capture(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<CaptureRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let max_chars = state.capture.max_content_chars;

    let (title, content) = match (&payload.html, &payload.content) {
        (Some(html), _) => {
            let extracted = semantic::extract_page(html, max_chars);
            (payload.title.clone().unwrap_or(extracted.title), extracted.content)
        }
        (None, Some(content)) => (
            payload.title.clone().unwrap_or_default(),
            semantic::normalize_text(content, max_chars),
        ),
        (None, None) => {
            return Err(AppError::InvalidInput("either html or content is required".to_string()).into())
        }
    };

    let report = state
        .orchestrator
        .capture(CapturedPage {
            url: payload.url,
            title,
            content,
            favicon: payload.favicon,
        })
        .await?;

    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub category: Option<String>,
}

async fn search(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let filter = CategoryFilter::parse(payload.category.as_deref())?;
    let served = state.orchestrator.search(&payload.query, filter).await?;

    Ok(with_source(&served.source, served.value))
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub query: String,
}

async fn compare(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<CompareRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let served = state.orchestrator.compare(&payload.query).await?;

    Ok(with_source(&served.source, served.value))
}

async fn stats(State(state): State<Arc<SharedState>>) -> Result<impl IntoResponse, HttpError> {
    let served = state.orchestrator.stats().await?;

    Ok(with_source(&served.source, served.value))
}

async fn health(State(state): State<Arc<SharedState>>) -> impl IntoResponse {
    let served = state.orchestrator.health().await;

    with_source(&served.source, served.value)
}

#[derive(Debug, Deserialize)]
pub struct OpenPageRequest {
    pub id: String,
    pub html: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenPageResponse {
    pub id: String,
    pub regions: usize,
}

async fn open_page(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<OpenPageRequest>,
) -> Result<Json<OpenPageResponse>, HttpError> {
    if payload.id.trim().is_empty() {
        return Err(AppError::InvalidInput("page id is empty".to_string()).into());
    }

    let tab = state.tabs.open(&payload.id, &payload.html);

    Ok(Json(OpenPageResponse {
        id: payload.id,
        regions: tab.region_count(),
    }))
}

async fn close_page(
    State(state): State<Arc<SharedState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, HttpError> {
    if state.tabs.close(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("page {id}")).into())
    }
}

async fn page_highlights(
    State(state): State<Arc<SharedState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<String>>, HttpError> {
    let tab = state
        .tabs
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("page {id}")))?;

    Ok(Json(tab.marked_texts()))
}

#[derive(Debug, Deserialize)]
pub struct HighlightRequest {
    pub page_id: String,
    pub text: String,
    #[serde(default)]
    pub policy: PolicyKind,
}

/// Waits for the page, then highlights. Responds `null` when abandoned.
///
/// Empty text still clears the page's previous marks.
async fn highlight(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<HighlightRequest>,
) -> Json<Option<Selection>> {
    let pending = state.tabs.pending(&payload.page_id);
    let policy = MatchPolicy::from_kind(payload.policy, &state.highlight.stoplist);

    let outcome = schedule_highlight(
        pending.tab(),
        &payload.text,
        &policy,
        &state.highlight.schedule(),
        pending.tab().close_token(),
    )
    .await;

    match outcome {
        ScheduleOutcome::Highlighted(selection) => Json(Some(selection)),
        other => {
            log::info!("highlight on page {} abandoned: {other:?}", payload.page_id);
            Json(None)
        }
    }
}
