// Route exports
pub mod matching;
pub mod pets;

use std::future::{ready, Ready};
use std::sync::Arc;

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse, ResponseError};
use thiserror::Error;
use tracing::{error, info};

use crate::core::{EngineError, MatchingEngine};
use crate::models::{CallerIdentity, ErrorResponse};
use crate::services::{IdentityVerifier, SqliteStore, StoreError};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MatchingEngine>,
    pub store: Arc<SqliteStore>,
    pub identity: Arc<IdentityVerifier>,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    // matching must register before pets: /pets/matching would otherwise
    // be captured by /pets/{pet_id}.
    cfg.service(
        web::scope("/api")
            .configure(matching::configure)
            .configure(pets::configure),
    );
}

/// Rejection raised while resolving the caller from the request.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AuthRejection {
    message: String,
}

impl ResponseError for AuthRejection {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::Unauthorized().json(ErrorResponse {
            error: "Unauthorized".to_string(),
            message: self.message.clone(),
            status_code: 401,
        })
    }
}

impl FromRequest for CallerIdentity {
    type Error = AuthRejection;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(caller_from_request(req))
    }
}

fn caller_from_request(req: &HttpRequest) -> Result<CallerIdentity, AuthRejection> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| AuthRejection {
            message: "identity verifier not configured".to_string(),
        })?;

    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AuthRejection {
            message: "missing bearer token".to_string(),
        })?;

    let token = header_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthRejection {
            message: "malformed authorization header".to_string(),
        })?;

    state.identity.verify(token).map_err(|e| {
        info!("Rejected bearer token: {}", e);
        AuthRejection {
            message: "invalid or expired token".to_string(),
        }
    })
}

/// Map an engine failure onto the HTTP surface. Store internals never
/// reach a response body.
pub(crate) fn engine_error_response(err: EngineError) -> HttpResponse {
    match err {
        EngineError::Unauthorized(message) => HttpResponse::Unauthorized().json(ErrorResponse {
            error: "Unauthorized".to_string(),
            message,
            status_code: 401,
        }),
        EngineError::InvalidTarget(message) => HttpResponse::BadRequest().json(ErrorResponse {
            error: "Invalid target".to_string(),
            message,
            status_code: 400,
        }),
        EngineError::Validation(message) => HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message,
            status_code: 400,
        }),
        EngineError::Conflict => HttpResponse::Conflict().json(ErrorResponse {
            error: "Conflict".to_string(),
            message: "the rating is contended, retry the request".to_string(),
            status_code: 409,
        }),
        EngineError::Store(e) => {
            error!("Store failure: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Internal server error".to_string(),
                message: "an unexpected error occurred".to_string(),
                status_code: 500,
            })
        }
    }
}

pub(crate) fn store_error_response(err: StoreError) -> HttpResponse {
    match err {
        StoreError::NotFound(message) | StoreError::InvalidReference(message) => {
            HttpResponse::BadRequest().json(ErrorResponse {
                error: "Invalid target".to_string(),
                message,
                status_code: 400,
            })
        }
        e => {
            error!("Store failure: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Internal server error".to_string(),
                message: "an unexpected error occurred".to_string(),
                status_code: 500,
            })
        }
    }
}
