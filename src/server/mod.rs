//! HTTP server: thumbnail API, live feed and latest posts, static files

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::aggregate::PostAggregator;
use crate::error::{SiteError, SiteResult};
use crate::feed::FeedChannel;
use crate::generator::LatestPost;
use crate::thumbnail::{ThumbnailRenderer, ThumbnailRequest};
use crate::Site;

const THUMBNAIL_CACHE_CONTROL: &str = "s-maxage=31536000, stale-while-revalidate";

/// Shared, read-only server state
pub struct AppState {
    pub site: Site,
    pub aggregator: PostAggregator,
    pub feeds: Vec<FeedChannel>,
    pub thumbnails: ThumbnailRenderer,
}

impl AppState {
    pub async fn new(site: &Site) -> Result<Self> {
        Ok(Self {
            site: site.clone(),
            aggregator: site.aggregator()?,
            feeds: site.feed_channels()?,
            thumbnails: site.thumbnail_renderer().await?,
        })
    }
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.site.public_dir).append_index_html_on_directories(true);

    let mut router = Router::new()
        .route("/api/thumbnail", get(thumbnail_handler))
        .route("/api/latest", get(latest_handler));
    for (index, channel) in state.feeds.iter().enumerate() {
        router = router.route(
            &channel.route(),
            get(move |State(state): State<Arc<AppState>>| feed_handler(state, index)),
        );
    }

    router
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server
pub async fn start(site: &Site, ip: &str, port: u16, watch: bool) -> Result<()> {
    let state = Arc::new(AppState::new(site).await?);
    let app = router(state);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    println!("Server running at http://{}:{}", ip, port);
    if watch {
        println!("Watching for changes...");
    }
    println!("Press Ctrl+C to stop.");

    if watch {
        let base_dir = site.base_dir.clone();
        let handle = Handle::current();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = watch_and_rebuild(&base_dir, &handle) {
                tracing::error!("File watcher error: {}", e);
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `GET /api/thumbnail?title=..&description=..`
async fn thumbnail_handler(
    State(state): State<Arc<AppState>>,
    Query(request): Query<ThumbnailRequest>,
) -> SiteResult<Response> {
    request.validate()?;
    let description = request.description.clone();
    let request = request.with_description(description);

    let renderer = state.thumbnails.clone();
    let png = tokio::task::spawn_blocking(move || renderer.render(&request))
        .await
        .map_err(|e| SiteError::RenderFailure(format!("render task failed: {}", e)))??;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, THUMBNAIL_CACHE_CONTROL),
        ],
        png,
    )
        .into_response())
}

/// An RSS feed, rendered from the current posts
async fn feed_handler(state: Arc<AppState>, index: usize) -> SiteResult<Response> {
    let channel = &state.feeds[index];
    let posts = match channel.section_posts().await? {
        Some(posts) => posts,
        None => state.aggregator.get_all_posts().await?,
    };
    let xml = channel.generator.generate(&posts)?;
    Ok((
        [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
        xml,
    )
        .into_response())
}

/// The most recent posts as JSON
async fn latest_handler(State(state): State<Arc<AppState>>) -> SiteResult<Json<Vec<LatestPost>>> {
    let posts = state
        .aggregator
        .latest(state.site.config.latest_count)
        .await?;
    Ok(Json(LatestPost::list(&posts, &state.site)))
}

/// Watch posts, static files and config; rebuild on change.
///
/// Blocks the calling thread. `handle` runs the async build.
pub fn watch_and_rebuild(base_dir: &Path, handle: &Handle) -> Result<()> {
    let site = Site::new(base_dir)?;
    let (tx, rx) = std::sync::mpsc::channel();

    // Create debouncer to avoid multiple rapid rebuilds
    let mut debouncer = new_debouncer(Duration::from_millis(500), tx)?;

    let mut watched: Vec<(PathBuf, RecursiveMode)> = vec![
        (site.posts_dir.clone(), RecursiveMode::Recursive),
        (site.static_dir.clone(), RecursiveMode::Recursive),
        (base_dir.join("_config.yml"), RecursiveMode::NonRecursive),
    ];
    for dir in site.config.all_feeds().filter_map(|f| f.posts_dir.as_ref()) {
        watched.push((base_dir.join(dir), RecursiveMode::Recursive));
    }
    for (path, mode) in &watched {
        if path.exists() {
            debouncer.watcher().watch(path, *mode)?;
            tracing::debug!("Watching: {:?}", path);
        }
    }

    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let relevant: Vec<_> = events
                    .iter()
                    .filter(|e| is_relevant(&e.path))
                    .collect();

                if relevant.is_empty() {
                    continue;
                }

                for event in &relevant {
                    println!("File changed: {}", event.path.display());
                }

                println!("Regenerating...");
                // Pick up config edits too
                let result = Site::new(base_dir)
                    .and_then(|site| handle.block_on(crate::commands::build::run(&site)));
                match result {
                    Ok(()) => println!("Regenerated successfully!"),
                    Err(e) => println!("Generation failed: {:#}", e),
                }
            }
            Ok(Err(e)) => {
                tracing::error!("Watch error: {:?}", e);
            }
            Err(e) => {
                tracing::error!("Channel error: {:?}", e);
                break;
            }
        }
    }

    Ok(())
}

/// Editor swap files and VCS metadata do not trigger rebuilds
fn is_relevant(path: &Path) -> bool {
    let path_str = path.to_string_lossy();
    !path_str.contains(".git")
        && !path_str.contains(".DS_Store")
        && !path_str.ends_with('~')
        && !path_str.ends_with(".swp")
}
