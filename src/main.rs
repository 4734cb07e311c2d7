use chat_rooms::{app, error::AppResult, state::RoomRegistry, store};
use sqlx::SqlitePool;

#[tokio::main]
async fn main() -> AppResult<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let pool = SqlitePool::connect(&std::env::var("DATABASE_URL")?).await?;
    store::init(&pool).await?;
    let registry = RoomRegistry::default();

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app(pool, registry).into_make_service()).await?;
    Ok(())
}
