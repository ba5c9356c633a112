//! HTTP surface for the Green Agent evaluation service (C11, ambient):
//! agent-card discovery, a health check, and the evaluation endpoint,
//! all wrapped in the request-tracing middleware (C8). Wired the way
//! `phoenix-web`'s binary wires `middleware::Logger` and CORS onto
//! `App::new()`.

pub mod handlers;
pub mod middleware;

use actix_cors::Cors;
use actix_web::{web, App};
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::body::MessageBody;
use actix_web::Error;

use handlers::AppState;

/// Build the `App` factory shared by the real server and integration
/// tests, so route wiring can never drift between the two.
pub fn configure_app(
    state: web::Data<AppState>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Response = ServiceResponse<impl MessageBody>,
        Config = (),
        InitError = (),
        Error = Error,
    >,
> {
    App::new()
        .app_data(state)
        .wrap(middleware::RequestTracing)
        .wrap(Cors::permissive())
        .route(
            "/.well-known/agent-card.json",
            web::get().to(handlers::agent_card),
        )
        .route("/health", web::get().to(handlers::health))
        .route("/message:send", web::post().to(handlers::message_send))
}
