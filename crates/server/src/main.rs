use db::DBService;
use server::AppState;
use services::services::{
    ai_query::AiQueryClient,
    auth_events::{AuthEvents, ProvisioningListener},
    config::Config,
    database_validator::DatabaseValidator,
    storage::StorageClient,
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    utils::logging::init("info,server=debug,services=debug,db=debug");

    let config = Config::from_env()?;

    let db = DBService::new(&config.database_url).await?;
    DatabaseValidator::new(db.pool.clone()).validate().await?;

    let storage = StorageClient::new(&config.storage)?;
    let ai = AiQueryClient::new(&config.ai)?;

    let auth_events = AuthEvents::default();
    ProvisioningListener::spawn(db.clone(), &auth_events);

    let state = AppState::new(db, storage, ai, auth_events);
    let app = server::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
