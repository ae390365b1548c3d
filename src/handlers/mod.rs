pub mod auth;
pub mod resource;
pub mod search;

use actix_web::web;

use crate::errors::AppError;

/// Registers every route under `/v1`. Fixed segments (`create`, `form`,
/// `bulk-delete`) are registered before the `{id}` routes they would shadow.
/// Malformed path segments are 404s and malformed query strings 400s, both
/// with the usual JSON error body.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PathConfig::default().error_handler(|err, _req| {
        AppError::NotFound(format!("Invalid path: {}", err)).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        AppError::BadRequest(format!("Invalid query string: {}", err)).into()
    }))
    .service(
        web::scope("/v1")
            .service(web::resource("/auth").route(web::post().to(auth::auth_handler)))
            .service(web::resource("/navigation").route(web::get().to(search::navigation)))
            .service(web::resource("/search").route(web::get().to(search::global_search)))
            .service(
                web::resource("/{entity}")
                    .route(web::get().to(resource::list))
                    .route(web::post().to(resource::create)),
            )
            .service(web::resource("/{entity}/create").route(web::get().to(resource::create_form)))
            .service(web::resource("/{entity}/form").route(web::post().to(resource::form_state)))
            .service(
                web::resource("/{entity}/bulk-delete").route(web::post().to(resource::bulk_delete)),
            )
            .service(
                web::resource("/{entity}/{id}")
                    .route(web::get().to(resource::view))
                    .route(web::patch().to(resource::update))
                    .route(web::delete().to(resource::delete)),
            )
            .service(web::resource("/{entity}/{id}/edit").route(web::get().to(resource::edit_form)))
            .service(
                web::resource("/{entity}/{id}/relations/{relation}")
                    .route(web::get().to(resource::relation_list))
                    .route(web::post().to(resource::relation_create)),
            ),
    );
}
