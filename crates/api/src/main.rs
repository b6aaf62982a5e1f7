use anyhow::Context;

use stockline_api::app::build_app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockline_observability::init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let app = build_app();

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(%addr, "stockline api listening");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
