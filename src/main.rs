mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod resources;
mod schema;
mod utils;

use actix_web::{middleware, web, App, HttpServer};
use dotenv::dotenv;
use log::{error, info};
use std::io;

use crate::config::Config;
use crate::errors::AppError;

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;

    let store = db::create_store(&config).await.map_err(|e| {
        error!("Failed to initialize the store: {}", e);
        io::Error::new(io::ErrorKind::Other, e)
    })?;

    let store = web::Data::from(store);
    let registry = web::Data::new(resources::registry());
    let bind_address = config.bind_address.clone();
    let config = web::Data::new(config);

    info!("Starting server at {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(store.clone())
            .app_data(registry.clone())
            .app_data(config.clone())
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                AppError::BadRequest(format!("Invalid JSON payload: {}", err)).into()
            }))
            .configure(handlers::configure)
    })
    .bind(bind_address)?
    .run()
    .await
}
