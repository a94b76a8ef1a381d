//! HTTP server setup and routing

use crate::error::{Error, Result};
use crate::playback::{PlaybackCoordinator, Subscription};
use axum::{
    routing::{get, post},
    Router,
};
use primuse_common::{SessionEvent, TrackResolver};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Buffered SSE events per slow client before it starts lagging
const EVENT_BUFFER: usize = 100;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub coordinator: PlaybackCoordinator,
    pub resolver: Arc<dyn TrackResolver>,
    /// Session events fanned out to SSE clients
    pub events: broadcast::Sender<SessionEvent>,
    /// Observer feeding `events`; deregistered with the last context clone
    _bridge: Arc<Subscription>,
}

impl AppContext {
    pub fn new(coordinator: PlaybackCoordinator, resolver: Arc<dyn TrackResolver>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let tx = events.clone();
        let bridge = coordinator.subscribe(move |event: &SessionEvent| {
            // No receivers is fine
            let _ = tx.send(event.clone());
        });

        Self {
            coordinator,
            resolver,
            events,
            _bridge: Arc::new(bridge),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

/// Build the router with all routes attached
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(super::handlers::health))
        .route("/audio/devices", get(super::handlers::list_audio_devices))
        // Playback control
        .route("/playback/state", get(super::handlers::get_playback_state))
        .route("/playback/play", post(super::handlers::play))
        .route("/playback/toggle", post(super::handlers::toggle))
        .route("/playback/release", post(super::handlers::release))
        .route("/playback/seek", post(super::handlers::seek))
        .route("/playback/skip", post(super::handlers::skip))
        .route("/playback/skip-forward", post(super::handlers::skip_forward))
        .route("/playback/skip-backward", post(super::handlers::skip_backward))
        // SSE event stream
        .route("/events", get(super::sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        // Enable CORS for local access
        .layer(CorsLayer::permissive())
}

/// Serve the API on `port` until `shutdown` resolves
pub async fn run<F>(ctx: AppContext, port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(ctx);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
