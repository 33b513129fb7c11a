use axum::extract::rejection::FormRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::store::StoreError;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("missing paste data")]
    MissingPaste,
    #[error("not logged in")]
    MissingUser,
    #[error("error reading form data")]
    Form {
        #[from]
        source: FormRejection,
    },
    #[error("{source}")]
    Store {
        #[from]
        source: StoreError,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Form { source } = self {
            return source.into_response();
        }

        let status_code = match &self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MissingPaste => StatusCode::BAD_REQUEST,
            ApiError::MissingUser => StatusCode::UNAUTHORIZED,
            ApiError::Form { .. } => StatusCode::BAD_REQUEST,
            ApiError::Store { source } => match source {
                StoreError::InvalidRequest { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                StoreError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                StoreError::TimedOut => StatusCode::GATEWAY_TIMEOUT,
                StoreError::Transport { .. } => StatusCode::BAD_GATEWAY,
            },
        };

        (status_code, format!("{self}")).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_distinct_statuses() {
        let statuses: Vec<StatusCode> = [
            StoreError::InvalidRequest {
                why: "bad".to_owned(),
            },
            StoreError::Unavailable,
            StoreError::TimedOut,
            StoreError::Transport {
                source: "reset".into(),
            },
        ]
        .into_iter()
        .map(|source| ApiError::from(source).into_response().status())
        .collect();

        assert_eq!(
            statuses,
            vec![
                StatusCode::INTERNAL_SERVER_ERROR,
                StatusCode::SERVICE_UNAVAILABLE,
                StatusCode::GATEWAY_TIMEOUT,
                StatusCode::BAD_GATEWAY,
            ]
        );
    }
}
