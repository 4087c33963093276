use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cinestay_core::CoreError;
use cinestay_pay2s::Pay2sError;
use cinestay_shared::ApiResponse;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    ServiceUnavailable(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InternalServerError(_) | AppError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn from_core(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => AppError::ValidationError(msg),
            CoreError::InvalidTransition { .. } => AppError::ValidationError(err.to_string()),
            CoreError::NotFound(msg) => AppError::NotFound(format!("{} not found", msg)),
            CoreError::Conflict(msg) => AppError::Conflict(msg),
            CoreError::Unauthorized(msg) => AppError::Unauthorized(msg),
            CoreError::GatewayError(msg) => AppError::BadGateway(msg),
            CoreError::StorageError(_) | CoreError::InternalError(_) => {
                AppError::InternalServerError(err.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            AppError::ValidationError(msg)
            | AppError::Unauthorized(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::ServiceUnavailable(msg) => msg,
            AppError::BadGateway(msg) => {
                tracing::warn!("Upstream failure: {}", msg);
                msg
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                "Internal Server Error".to_string()
            }
        };

        (status, Json(ApiResponse::error(error_message))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        let err = match err.downcast::<CoreError>() {
            Ok(core) => return Self::from_core(core),
            Err(err) => err,
        };
        let err = match err.downcast::<Pay2sError>() {
            Ok(pay2s) => return Self::from_core(pay2s.into()),
            Err(err) => err,
        };
        // Extractor rejections are client mistakes, reported inside the envelope.
        if let Some(rejection) = err.downcast_ref::<JsonRejection>() {
            return Self::ValidationError(rejection.body_text());
        }
        if let Some(rejection) = err.downcast_ref::<PathRejection>() {
            return Self::ValidationError(rejection.body_text());
        }
        if let Some(rejection) = err.downcast_ref::<QueryRejection>() {
            return Self::ValidationError(rejection.body_text());
        }
        Self::Anyhow(err)
    }
}

pub type ApiResult<T> = Result<T, AppError>;
