pub mod error;
pub mod routes;

use axum::Router;
use db::DBService;
use services::services::{
    ai_query::AiQueryClient, auth_events::AuthEvents, storage::StorageClient,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared handler state: the database plus the external collaborators.
#[derive(Clone)]
pub struct AppState {
    db: DBService,
    storage: StorageClient,
    ai: AiQueryClient,
    auth_events: AuthEvents,
}

impl AppState {
    pub fn new(
        db: DBService,
        storage: StorageClient,
        ai: AiQueryClient,
        auth_events: AuthEvents,
    ) -> Self {
        Self {
            db,
            storage,
            ai,
            auth_events,
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn storage(&self) -> &StorageClient {
        &self.storage
    }

    pub fn ai(&self) -> &AiQueryClient {
        &self.ai
    }

    pub fn auth_events(&self) -> &AuthEvents {
        &self.auth_events
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::auth::router())
        .merge(routes::profiles::router())
        .merge(routes::projects::router())
        .merge(routes::files::router())
        .merge(routes::ai::router());

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
