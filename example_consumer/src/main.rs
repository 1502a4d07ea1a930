//! Example consumer: a separate Rust project that uses mvc-sdk as a dependency.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Expects a `book (id BIGSERIAL PRIMARY KEY, title TEXT, author TEXT)` table.

mod books;

use axum::Router;
use mvc_sdk::{
    common_routes, connect, controller_routes, init_tracing, load_env, AppState, DatabaseConfig, ServerConfig, StackConfig,
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env();
    init_tracing("mvc_sdk=info,example_consumer=info");

    let database = DatabaseConfig::from_env()?;
    let server = ServerConfig::from_env()?;
    let agent = connect(&database).await?;
    let state = AppState::new(agent, StackConfig::from_env()?);

    let app = Router::new()
        .merge(common_routes(state.clone()))
        .nest(
            "/api/v1",
            controller_routes::<books::Books>("/books", state, server.body_limit),
        );

    let listener = TcpListener::bind(server.bind_addr).await?;
    tracing::info!("example consumer listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
