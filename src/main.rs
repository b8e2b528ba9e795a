mod db;
mod routes;
mod services;
mod state;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .expect("invalid PORT");

    let pool = db::init_pool(&database_url)
        .await
        .expect("database init failed");

    // Email delivery is optional: without it, access codes are returned in
    // the request-code response for local development.
    let email = state::EmailConfig::from_env();
    if email.is_none() {
        tracing::warn!("email delivery not configured — access codes will be returned in responses");
    }

    let state = state::AppState::new(pool, email);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "pollboard listening");
    axum::serve(listener, app).await.expect("server failed");
}
