use axum::http::{self, HeaderValue, Method};
use dotenvy::dotenv;
use env_logger::Builder;
use log::LevelFilter;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use truthwars_engine::GameConfig;
use truthwars_server::{app, state::AppState, utils::config::ServerConfig};

// ログ設定
fn init_logger() {
    let mut builder = Builder::new();
    builder
        .filter_level(LevelFilter::Info)
        .filter_module("tower_http", LevelFilter::Debug)
        .filter_module("axum", LevelFilter::Debug)
        .filter_module("truthwars_engine", LevelFilter::Debug)
        .parse_env("RUST_LOG")
        .format_timestamp(Some(env_logger::TimestampPrecision::Millis))
        .format_target(true)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 環境変数をロード
    if let Err(e) = dotenv() {
        eprintln!("Warning: .envファイルの読み込みに失敗しました: {}", e);
    }

    init_logger();

    let server_config = ServerConfig::from_env()?;
    let game_config = GameConfig::from_env();
    let manager = app::build_manager(game_config)?;
    let state = AppState::new(manager);
    let _tasks = state
        .start_background_tasks(server_config.cleanup_interval)
        .await;

    // CORSレイヤーの設定
    let origin = server_config.allowed_origin.parse::<HeaderValue>()?;
    let cors = CorsLayer::new()
        .allow_origin([origin])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([http::header::CONTENT_TYPE]);

    let app = app::create_app(state).layer(cors).layer(
        TraceLayer::new_for_http() // HTTPトレースログを有効化
            .make_span_with(|request: &http::Request<_>| {
                tracing::info_span!(
                    "HTTP request",
                    method = %request.method(),
                    uri = %request.uri()
                )
            }),
    );

    let listener = tokio::net::TcpListener::bind(&server_config.bind_addr).await?;
    log::info!("サーバーを起動しました: http://{}", server_config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
