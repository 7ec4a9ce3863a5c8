//! HTTP layer: a single catch-all route that turns a request path into a
//! link-preview page.
//!
//! The handler validates the path against the file index (revalidating
//! on miss), hands it to the resolver under the configured deadline, and
//! renders whatever state comes back - complete or partial. Every
//! request carries a generated correlation id, echoed in `X-Request-Id`
//! and threaded through the resolver's log lines.

pub mod templates;

use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::cover::CoverStore;
use crate::db;
use crate::index::FileIndex;
use crate::resolver::Resolver;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub index: Arc<FileIndex>,
    pub resolver: Arc<Resolver>,
}

/// Correlation id attached to each request by the middleware.
#[derive(Clone)]
struct RequestId(String);

/// Wire up state and serve until shutdown.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);

    let cache = db::init_cache(&config.cache.db_path).await?;
    info!(target: "server", db = %config.cache.db_path.display(), "cache store ready");

    let covers = CoverStore::new(&config.media.cover_dir)?;
    let resolver = Arc::new(Resolver::new(
        config.media.music_dir.clone(),
        covers,
        cache,
        config.media.default_cover_path.as_deref(),
        config.resolver.workers,
    )?);

    let index = Arc::new(FileIndex::new(
        &config.media.music_dir,
        &config.media.accepted_extensions,
    ));

    // Hourly reconciliation; the first pass populates the index
    let rescan_index = Arc::clone(&index);
    let interval = Duration::from_secs(config.resolver.rescan_interval_secs.max(1));
    tokio::spawn(async move {
        loop {
            Arc::clone(&rescan_index).rescan().await;
            tokio::time::sleep(interval).await;
        }
    });

    let state = AppState {
        config: Arc::clone(&config),
        index,
        resolver,
    };
    let app = router(state);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(target: "server", %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!(target: "server", "shutdown signal received");
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .fallback(preview)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let id = Uuid::new_v4().to_string();
    request.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// The catch-all preview handler.
async fn preview(State(state): State<AppState>, request: Request) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|r| r.0.clone())
        .unwrap_or_else(|| "-".to_string());

    let raw_path = request.uri().path().to_string();
    let Ok(decoded) = urlencoding::decode(&raw_path) else {
        return path_not_valid(&request_id);
    };
    let Some(relative_path) = relative_to_root(&decoded, &state.config.media.http_root) else {
        return path_not_valid(&request_id);
    };

    if state.config.server.serve_files
        && request.uri().query().is_none()
        && let Some(response) =
            serve_raw(&state, &relative_path, &decoded, request.uri(), request.headers()).await
    {
        return response;
    }

    if !state.index.is_valid(&relative_path) {
        // The filesystem may have just changed under us
        Arc::clone(&state.index).revalidate(relative_path.clone()).await;
        if !state.index.is_valid(&relative_path) {
            return path_not_valid(&request_id);
        }
    }

    let meta = state
        .resolver
        .resolve(&relative_path, &request_id, state.config.resolve_timeout())
        .await;

    let (scheme, host) = request_origin(&state.config, &request);
    let content_url = format!("{scheme}://{host}{raw_path}");
    let cover_url = format!(
        "{scheme}://{host}{}/{}",
        state.config.media.cover_http_root.trim_end_matches('/'),
        meta.cover_filename
    );
    let generated_at = chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();

    let html = templates::preview_page(
        &state.config.site,
        &meta,
        &content_url,
        &cover_url,
        &generated_at,
    );

    let mut response = (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        )],
        html,
    )
        .into_response();
    if meta.is_complete {
        // Partial results must not be cached by clients
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=600"));
    }
    response
}

/// 400 response for paths the index does not know.
fn path_not_valid(request_id: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        format!("400: Path is not a valid file [{request_id}]"),
    )
        .into_response()
}

/// Strip the configured HTTP root and normalize to a relative path.
///
/// Returns `None` for paths outside the root or containing traversal
/// segments.
fn relative_to_root(path: &str, http_root: &str) -> Option<String> {
    let root = http_root.trim_end_matches('/');
    let rest = path.strip_prefix(root)?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }

    let relative = rest.trim_start_matches('/');
    if relative.split('/').any(|segment| segment == "..") {
        return None;
    }
    Some(relative.to_string())
}

/// Scheme and host for building absolute URLs, honoring forwarding
/// headers and the configured public host.
fn request_origin(config: &Config, request: &Request) -> (String, String) {
    let header_str = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    };

    let scheme = header_str("x-forwarded-proto").unwrap_or_else(|| "http".to_string());
    let host = if !config.server.public_host.is_empty() {
        config.server.public_host.clone()
    } else {
        header_str("x-forwarded-host")
            .or_else(|| header_str("host"))
            .unwrap_or_else(|| format!("localhost:{}", config.server.port))
    };
    (scheme, host)
}

/// Direct file responses for testing deployments (`server.serve_files`).
///
/// Serves the audio file itself, or a stored cover under the cover HTTP
/// root. Returns `None` when the request doesn't map to a real file.
async fn serve_raw(
    state: &AppState,
    relative_path: &str,
    decoded_path: &str,
    source_uri: &axum::http::Uri,
    source_headers: &axum::http::HeaderMap,
) -> Option<Response> {
    let local = state.config.media.music_dir.join(relative_path);
    if local.is_file() {
        return Some(serve_local_file(&local, source_uri, source_headers).await);
    }

    let cover_root = state.config.media.cover_http_root.trim_end_matches('/');
    if let Some(cover_name) = decoded_path.strip_prefix(cover_root)
        && (cover_name.is_empty() || cover_name.starts_with('/'))
    {
        let cover_name = cover_name.trim_start_matches('/');
        // Cover assets are flat hash names; anything nested is not ours
        if !cover_name.is_empty() && !cover_name.contains('/') {
            let cover_path = state.config.media.cover_dir.join(cover_name);
            if cover_path.is_file() {
                return Some(serve_local_file(&cover_path, source_uri, source_headers).await);
            }
        }
    }

    None
}

async fn serve_local_file(
    path: &Path,
    source_uri: &axum::http::Uri,
    source_headers: &axum::http::HeaderMap,
) -> Response {
    let mut file_request = Request::new(Body::empty());
    *file_request.uri_mut() = source_uri.clone();
    *file_request.headers_mut() = source_headers.clone();

    match ServeFile::new(path).oneshot(file_request).await {
        Ok(response) => response.into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
