use actix_web::{App, HttpServer, web};
use clap::Parser;
use log::info;

use sph_grid::app_state::AppState;
use sph_grid::config::ServerConfig;
use sph_grid::routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();
    let app_state = web::Data::new(AppState::new(config.resource_dir.clone(), config.task_ttl()));

    info!("已注册的解析器:");
    for ext in app_state.parser_registry.supported_extensions() {
        info!("  - .{}", ext);
    }

    // 启动后台清理任务：定期清理过期的任务，避免长期占用内存
    let cleanup_state = app_state.clone();
    let cleanup_interval = config.cleanup_interval();
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(cleanup_interval);
        loop {
            interval.tick().await;
            let cleaned_count = cleanup_state.task_store.cleanup_expired();
            cleanup_state.performance_store.cleanup_expired();
            if cleaned_count > 0 {
                info!(
                    "[清理任务] 清理了 {} 个过期任务，当前剩余: {} 个任务",
                    cleaned_count,
                    cleanup_state.task_store.task_count()
                );
            }
        }
    });

    info!("服务器启动在 http://{}:{}", config.host, config.port);
    info!("资源目录: {}", config.resource_dir);
    info!(
        "任务 TTL: {} 分钟",
        app_state.task_store.default_ttl().as_secs() / 60
    );

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
