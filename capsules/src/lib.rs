use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest, ServiceResponse},
    middleware, web, App,
};
use common::context::ServiceState;
use handlers::{
    capsule::{delete_capsule, get_capsule, get_capsules, post_capsule},
    indexer::ping,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod repositories;
pub mod service;

pub fn create_app(
    state: Arc<ServiceState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Response = ServiceResponse<impl MessageBody>,
        Config = (),
        InitError = (),
        Error = actix_web::Error,
    >,
> {
    let cors = Cors::permissive();
    App::new()
        .wrap(cors)
        .wrap(middleware::Logger::default())
        .app_data(web::Data::new(state))
        // ping goes first so it is not taken for a capsule id
        .service(ping)
        .service(post_capsule)
        .service(get_capsules)
        .service(get_capsule)
        .service(delete_capsule)
}
