use actix_web::{web, App, HttpServer};
use std::env;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use tms_bridge::api;
use tms_bridge::config::Settings;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    dotenv::dotenv().ok();

    let settings = match Settings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let missing = settings.missing_required();
    if missing.is_empty() {
        info!("upstream configuration complete");
    } else {
        warn!(
            "missing settings {:?}; order operations will fail until they are provided",
            missing
        );
    }

    let port = env::var("PORT").unwrap_or_else(|_| "8000".to_string());
    let bind_address = format!("0.0.0.0:{}", port);
    info!("Starting TMS bridge on {}", bind_address);

    let settings_data = web::Data::new(settings);

    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .app_data(settings_data.clone())
            .configure(api::config)
    })
    .bind(&bind_address)?
    .run()
    .await
}
