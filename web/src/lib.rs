use axum::http::{header::CONTENT_TYPE, HeaderValue, Method};
use domain::credential::AuthProvider;
use domain::error::Error as DomainError;
use domain::gateway::{hosted_auth::HostedAuthClient, hosted_data::HostedDataClient};
use domain::message::UnreadCountStore;
use domain::route_policy::RoutePolicy;
use events::EventPublisher;
use log::*;
use service::config::Config;
use ::sse::SseDomainEventHandler;
use std::sync::Arc;
use time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

mod controller;
mod error;
mod extractors;
mod middleware;
mod router;
mod sse;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};

/// Everything a request handler needs. Cheap to clone; passed into the Router as State.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub route_policy: Arc<RoutePolicy>,
    pub auth_provider: Arc<dyn AuthProvider>,
    pub unread_store: Arc<dyn UnreadCountStore>,
    pub sse_manager: Arc<::sse::Manager>,
    pub event_publisher: EventPublisher,
}

impl AppState {
    pub fn new(
        config: Config,
        route_policy: RoutePolicy,
        auth_provider: Arc<dyn AuthProvider>,
        unread_store: Arc<dyn UnreadCountStore>,
        sse_manager: Arc<::sse::Manager>,
    ) -> Self {
        let event_publisher = EventPublisher::new()
            .with_handler(Arc::new(SseDomainEventHandler::new(sse_manager.clone())));

        Self {
            config,
            route_policy: Arc::new(route_policy),
            auth_provider,
            unread_store,
            sse_manager,
            event_publisher,
        }
    }

    /// Wires the hosted backend gateways and the route table from configuration.
    pub fn from_config(config: Config) -> std::result::Result<Self, DomainError> {
        let route_policy = RoutePolicy::from_config(&config)?;
        let auth_provider = Arc::new(HostedAuthClient::new(&config)?);
        let unread_store = Arc::new(HostedDataClient::new(&config)?);

        Ok(Self::new(
            config,
            route_policy,
            auth_provider,
            unread_store,
            Arc::new(::sse::Manager::new()),
        ))
    }
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let config = app_state.config.clone();
    let interface = config.interface.clone().unwrap_or_else(|| "127.0.0.1".to_string());
    let listen_addr = format!("{}:{}", interface, config.port);

    info!("Server starting... listening for connections on http://{listen_addr}");

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(config.is_production())
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(
            config.backend_session_expiry_seconds as i64,
        )));

    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();

    let cors_layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_credentials(true)
        .allow_headers([CONTENT_TYPE])
        .allow_origin(allowed_origins);

    let listener = TcpListener::bind(&listen_addr).await?;

    axum::serve(
        listener,
        router::define_routes(app_state)
            .layer(session_layer)
            .layer(cors_layer),
    )
    .await
}
