//! Request tracing middleware (C8): stamps every inbound request with a
//! fresh UUIDv4, logs start/end lines, and attaches `X-Request-ID` to
//! the response, built with the same `uuid` + `tracing` crates used
//! throughout this crate's HTTP surface.

use std::future::{ready, Future, Ready};
use std::pin::Pin;
use std::time::Instant;

use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::Error;
use uuid::Uuid;

pub struct RequestTracing;

impl<S, B> Transform<S, ServiceRequest> for RequestTracing
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RequestTracingMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestTracingMiddleware { service }))
    }
}

pub struct RequestTracingMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestTracingMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let request_id = Uuid::new_v4().to_string();
        let method = req.method().to_string();
        let path = req.path().to_string();
        let start = Instant::now();

        tracing::info!(request_id = %request_id, method = %method, path = %path, "request started");

        let fut = self.service.call(req);

        Box::pin(async move {
            let response = fut.await;
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

            match response {
                Ok(mut response) => {
                    let status = response.status().as_u16();
                    tracing::info!(
                        request_id = %request_id,
                        method = %method,
                        path = %path,
                        status,
                        elapsed_ms,
                        "request completed"
                    );
                    if let Ok(value) = HeaderValue::from_str(&request_id) {
                        response
                            .headers_mut()
                            .insert(HeaderName::from_static("x-request-id"), value);
                    }
                    Ok(response.map_into_left_body())
                }
                Err(err) => Err(err),
            }
        })
    }
}
