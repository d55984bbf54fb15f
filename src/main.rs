use authgate::logging::init_tracing;
use authgate::router::init_router;
use authgate::state::init_app_state;
use dotenvy::dotenv;

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_tracing();

    let state = init_app_state().await;
    let app = init_router(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .unwrap();
    println!("🚀 Server running on http://localhost:{port}");
    println!("📚 Swagger UI available at http://localhost:{port}/swagger-ui");
    println!("📖 Scalar UI available at http://localhost:{port}/scalar");
    axum::serve(listener, app).await.unwrap();
}
