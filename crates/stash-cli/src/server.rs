//! HTTP surface of the mirror.
//!
//! - `GET  /{pkg}` and `GET /{scope}/{pkg}`: package metadata
//! - `GET  /{pkg}/-/{tarball}` and `GET /{scope}/{pkg}/-/{tarball}`: tarballs
//! - `POST /api/index/{registry}/[{scope}/]{pkg}[?async=true]`: reindex a package

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use stash_core::{
    package::{is_path_segment, split_request_name},
    ErrorContext, Package, StashError, StashResult,
};
use stash_events::ServeSource;
use stash_operations::{
    cache::{read_metadata, read_tarball},
    index::index_package,
    IndexMode, IndexOutcome, StashContext,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::rewrite::{rewrite_tarball_urls, UrlTemplate};

pub const ABBREVIATED_METADATA_CONTENT_TYPE: &str = "application/vnd.npm.install-v1+json";

#[derive(Clone)]
pub struct AppState {
    ctx: StashContext,
    template: Option<UrlTemplate>,
}

impl AppState {
    pub fn new(ctx: StashContext) -> Self {
        let template = ctx.config().url_template.clone().map(UrlTemplate::new);
        Self {
            ctx,
            template,
        }
    }
}

/// Error answered to an HTTP client.
#[derive(Debug)]
pub enum AppError {
    /// The request path does not name a valid package or tarball.
    BadRequest(String),
    Stash(StashError),
}

impl From<StashError> for AppError {
    fn from(err: StashError) -> Self {
        Self::Stash(err)
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Stash(StashError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Stash(StashError::AlreadyInProgress(_)) => StatusCode::TOO_MANY_REQUESTS,
            Self::Stash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(msg) => write!(f, "bad request: {msg}"),
            Self::Stash(err) => write!(f, "{err}"),
        }
    }
}

/// Cause of a failed request, picked up by the request logger.
#[derive(Clone, Debug)]
struct FailureCause(String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let reason = status.canonical_reason().unwrap_or("Error");
        let mut response = (status, format!("{reason}\n")).into_response();
        response
            .extensions_mut()
            .insert(FailureCause(self.to_string()));
        response
    }
}

type AppResult<T> = Result<T, AppError>;

pub fn router(ctx: StashContext) -> Router {
    Router::new()
        .route("/api/index/{registry}/{pkg}", post(index_unscoped))
        .route("/api/index/{registry}/{pkg}/{name}", post(index_scoped))
        // For the two-part routes the first segment is the scope.
        .route("/{pkg}", get(metadata))
        .route("/{pkg}/{name}", get(scoped_metadata))
        .route("/{pkg}/-/{tarball}", get(tarball))
        .route("/{pkg}/{name}/-/{tarball}", get(scoped_tarball))
        .layer(middleware::from_fn(log_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(ctx))
}

/// Serves the registry on the configured address until interrupted.
pub async fn serve(ctx: StashContext) -> StashResult<()> {
    let addr = ctx.config().addr().to_string();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    info!("listening on {addr}");

    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .with_context(|| "serving HTTP requests".to_string())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let cause = response
            .extensions()
            .get::<FailureCause>()
            .map(|c| c.0.as_str())
            .unwrap_or("-");
        if status.is_server_error() {
            error!(%method, %uri, status = status.as_u16(), cause = %cause, "failed request");
        } else {
            info!(%method, %uri, status = status.as_u16(), cause = %cause, "failed request");
        }
    } else if let Some(source) = response.extensions().get::<ServeSource>() {
        debug!(%method, %uri, status = status.as_u16(), "{source}");
    }

    response
}

/// Runs blocking store and origin work off the async runtime.
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> StashResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| StashError::Custom(format!("request task failed: {err}")))?
        .map_err(AppError::from)
}

fn check_segment(segment: &str) -> AppResult<()> {
    if !is_path_segment(segment) {
        return Err(AppError::BadRequest(format!("invalid path segment '{segment}'")));
    }
    Ok(())
}

/// Package named by the request, on the configured registry.
fn request_package(ctx: &StashContext, scope: &str, name: &str) -> AppResult<Package> {
    if !scope.is_empty() {
        check_segment(scope)?;
    }
    check_segment(name)?;
    Ok(ctx.package(scope, name))
}

/// Splits `name` or an encoded `@scope/name` from a single path segment.
fn split_segment(segment: &str) -> AppResult<(String, String)> {
    split_request_name(segment).map_err(|err| AppError::BadRequest(err.to_string()))
}

async fn metadata(State(state): State<AppState>, Path(pkg): Path<String>) -> AppResult<Response> {
    let (scope, name) = split_segment(&pkg)?;
    serve_metadata(state, &scope, &name).await
}

async fn scoped_metadata(
    State(state): State<AppState>,
    Path((scope, name)): Path<(String, String)>,
) -> AppResult<Response> {
    if !scope.starts_with('@') {
        return Err(StashError::NotFound(format!("{scope}/{name}")).into());
    }
    serve_metadata(state, &scope, &name).await
}

async fn serve_metadata(state: AppState, scope: &str, name: &str) -> AppResult<Response> {
    let pkg = request_package(&state.ctx, scope, name)?;
    let AppState {
        ctx,
        template,
    } = state;

    let (bytes, source) = blocking(move || {
        let served = read_metadata(&ctx, &pkg)?;
        let bytes = match &template {
            Some(template) if !served.is_remote() => {
                rewrite_tarball_urls(&served.bytes, &pkg, template)?
            }
            _ => served.bytes,
        };
        Ok((bytes, served.source))
    })
    .await?;

    let content_type = match source {
        ServeSource::FoundLocally => ABBREVIATED_METADATA_CONTENT_TYPE,
        ServeSource::FetchedRemotely => "application/json",
    };
    Ok((
        [(header::CONTENT_TYPE, content_type)],
        Extension(source),
        bytes,
    )
        .into_response())
}

async fn tarball(
    State(state): State<AppState>,
    Path((pkg, filename)): Path<(String, String)>,
) -> AppResult<Response> {
    let (scope, name) = split_segment(&pkg)?;
    serve_tarball(state, &scope, &name, &filename).await
}

async fn scoped_tarball(
    State(state): State<AppState>,
    Path((scope, name, filename)): Path<(String, String, String)>,
) -> AppResult<Response> {
    if !scope.starts_with('@') {
        return Err(StashError::NotFound(format!("{scope}/{name}/-/{filename}")).into());
    }
    serve_tarball(state, &scope, &name, &filename).await
}

async fn serve_tarball(
    state: AppState,
    scope: &str,
    name: &str,
    filename: &str,
) -> AppResult<Response> {
    check_segment(filename)?;
    let tarball = request_package(&state.ctx, scope, name)?.tarball(filename);
    let ctx = state.ctx;

    let served = blocking(move || read_tarball(&ctx, &tarball)).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Extension(served.source),
        served.bytes,
    )
        .into_response())
}

#[derive(Debug, Default, Deserialize)]
struct IndexParams {
    #[serde(rename = "async")]
    run_async: Option<String>,
}

impl IndexParams {
    fn mode(&self) -> IndexMode {
        if self.run_async.as_deref() == Some("true") {
            IndexMode::Async
        } else {
            IndexMode::Sync
        }
    }
}

async fn index_unscoped(
    State(state): State<AppState>,
    Path((registry, pkg)): Path<(String, String)>,
    Query(params): Query<IndexParams>,
) -> AppResult<StatusCode> {
    let (scope, name) = split_segment(&pkg)?;
    run_index(state, &registry, &scope, &name, params.mode()).await
}

async fn index_scoped(
    State(state): State<AppState>,
    Path((registry, scope, name)): Path<(String, String, String)>,
    Query(params): Query<IndexParams>,
) -> AppResult<StatusCode> {
    if !scope.starts_with('@') {
        return Err(AppError::BadRequest(format!("invalid scope '{scope}'")));
    }
    run_index(state, &registry, &scope, &name, params.mode()).await
}

async fn run_index(
    state: AppState,
    registry: &str,
    scope: &str,
    name: &str,
    mode: IndexMode,
) -> AppResult<StatusCode> {
    check_segment(registry)?;
    if !scope.is_empty() {
        check_segment(scope)?;
    }
    check_segment(name)?;

    let pkg = Package::new(registry, scope, name);
    debug!(pkg = %pkg, ?mode, "index requested");
    let ctx = state.ctx;

    let outcome = blocking(move || index_package(&ctx, &pkg, mode)).await?;
    Ok(match outcome {
        IndexOutcome::Completed(_) => StatusCode::NO_CONTENT,
        IndexOutcome::Accepted => StatusCode::ACCEPTED,
    })
}
