pub mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitState};

use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpMessage};
use futures::future::LocalBoxFuture;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Authenticated viewer stored in request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerId(pub Uuid);

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Bearer token middleware that never rejects.
///
/// A valid HS256 token inserts `ViewerId`; a missing, malformed or expired
/// token leaves the request anonymous.
#[derive(Clone)]
pub struct OptionalAuth {
    key: Option<Arc<DecodingKey>>,
}

impl OptionalAuth {
    pub fn new(secret: Option<&str>) -> Self {
        Self {
            key: secret.map(|s| Arc::new(DecodingKey::from_secret(s.as_bytes()))),
        }
    }
}

/// Resolve the viewer from an `Authorization` header value.
pub fn viewer_from_header(header: Option<&str>, key: &DecodingKey) -> Option<Uuid> {
    let token = header?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }

    let validation = Validation::new(Algorithm::HS256);
    match decode::<Claims>(token, key, &validation) {
        Ok(data) => Uuid::parse_str(&data.claims.sub).ok(),
        Err(e) => {
            debug!("bearer token rejected, continuing anonymously: {}", e);
            None
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for OptionalAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = OptionalAuthService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(OptionalAuthService {
            service: Rc::new(service),
            key: self.key.clone(),
        }))
    }
}

pub struct OptionalAuthService<S> {
    service: Rc<S>,
    key: Option<Arc<DecodingKey>>,
}

impl<S, B> Service<ServiceRequest> for OptionalAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if let Some(key) = &self.key {
            let header = req
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok());
            if let Some(viewer) = viewer_from_header(header, key) {
                req.extensions_mut().insert(ViewerId(viewer));
            }
        }

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}
