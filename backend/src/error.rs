//! Error handling for the Coffee Ledger API
//!
//! Provides consistent error responses in English and Spanish

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{Collection, ValidationError};
use thiserror::Error;

use crate::engine::AmountOverflow;
use crate::store::StoreError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Invalid date for {field}: {value}")]
    InvalidDate { field: String, value: String },

    #[error("Start date {start} is after end date {end}")]
    InvertedRange { start: String, end: String },

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Invalid parameter {field}: {message}")]
    InvalidParameter { field: String, message: String },

    // Data-integrity errors
    #[error("Inconsistent snapshot: {0}")]
    InconsistentSnapshot(String),

    #[error("Malformed {collection} record at row {row}: {message}")]
    MalformedRecord {
        collection: Collection,
        row: usize,
        message: String,
    },

    #[error("Amount overflow: {0}")]
    AmountOverflow(#[from] AmountOverflow),

    // Transient errors
    #[error("Ledger store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Query exceeded {0} ms")]
    QueryTimeout(u64),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Broad category an error belongs to
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Validation,
    DataIntegrity,
    Transient,
    Internal,
}

impl AppError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::InvalidDate { .. }
            | AppError::InvertedRange { .. }
            | AppError::CollectionNotFound(_)
            | AppError::InvalidParameter { .. } => ErrorClass::Validation,
            AppError::InconsistentSnapshot(_)
            | AppError::MalformedRecord { .. }
            | AppError::AmountOverflow(_) => ErrorClass::DataIntegrity,
            AppError::StoreUnavailable(_) | AppError::QueryTimeout(_) | AppError::Database(_) => {
                ErrorClass::Transient
            }
            AppError::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Whether repeating the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::InconsistentSnapshot(_)
                | AppError::StoreUnavailable(_)
                | AppError::QueryTimeout(_)
                | AppError::Database(_)
        )
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidDate { field, value } => AppError::InvalidDate { field, value },
            ValidationError::InvertedRange { start, end } => AppError::InvertedRange {
                start: start.to_string(),
                end: end.to_string(),
            },
            ValidationError::CollectionNotFound(name) => AppError::CollectionNotFound(name),
            ValidationError::InvalidValue { field, message } => {
                AppError::InvalidParameter { field, message }
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => AppError::StoreUnavailable(msg),
            StoreError::InconsistentSnapshot(msg) => AppError::InconsistentSnapshot(msg),
            StoreError::MalformedRecord {
                collection,
                row,
                message,
            } => AppError::MalformedRecord {
                collection,
                row,
                message,
            },
            StoreError::Database(e) => AppError::Database(e),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub class: ErrorClass,
    pub retryable: bool,
    pub message_en: String,
    pub message_es: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message_en, message_es, field) = match &self {
            AppError::InvalidDate { field, value } => (
                StatusCode::BAD_REQUEST,
                "INVALID_DATE",
                format!("Invalid date {:?}, expected YYYY-MM-DD", value),
                format!("Fecha inválida {:?}, se espera AAAA-MM-DD", value),
                Some(field.clone()),
            ),
            AppError::InvertedRange { start, end } => (
                StatusCode::BAD_REQUEST,
                "INVERTED_RANGE",
                format!("Start date {} is after end date {}", start, end),
                format!("La fecha inicial {} es posterior a la fecha final {}", start, end),
                Some("start_date".to_string()),
            ),
            AppError::CollectionNotFound(name) => (
                StatusCode::NOT_FOUND,
                "COLLECTION_NOT_FOUND",
                format!("Collection {} not found", name),
                format!("No se encontró la colección {}", name),
                Some("collection".to_string()),
            ),
            AppError::InvalidParameter { field, message } => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                message.clone(),
                format!("Parámetro inválido: {}", message),
                Some(field.clone()),
            ),
            AppError::InconsistentSnapshot(_) => (
                StatusCode::CONFLICT,
                "INCONSISTENT_SNAPSHOT",
                "The ledger changed while it was being read. Please retry.".to_string(),
                "Los registros cambiaron durante la lectura. Intente nuevamente.".to_string(),
                None,
            ),
            AppError::MalformedRecord {
                collection, row, ..
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "MALFORMED_RECORD",
                format!("Malformed {} record at row {}", collection, row),
                format!("Registro inválido en {} fila {}", collection.sheet_name(), row),
                Some(collection.to_string()),
            ),
            AppError::AmountOverflow(overflow) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "AMOUNT_OVERFLOW",
                format!("The {} for this period is too large to represent", overflow.0),
                "Un total del periodo es demasiado grande para representarse".to_string(),
                None,
            ),
            AppError::StoreUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_UNAVAILABLE",
                "The ledger is temporarily unavailable".to_string(),
                "Los registros no están disponibles temporalmente".to_string(),
                None,
            ),
            AppError::QueryTimeout(ms) => (
                StatusCode::GATEWAY_TIMEOUT,
                "QUERY_TIMEOUT",
                format!("The query did not finish within {} ms", ms),
                format!("La consulta no terminó en {} ms", ms),
                None,
            ),
            AppError::Database(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "DATABASE_ERROR",
                "A database error occurred".to_string(),
                "Ocurrió un error en la base de datos".to_string(),
                None,
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
                "Error interno del servidor".to_string(),
                None,
            ),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        let detail = ErrorDetail {
            code: code.to_string(),
            class: self.class(),
            retryable: self.is_retryable(),
            message_en,
            message_es,
            field,
        };
        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_keep_their_class() {
        let err: AppError = StoreError::InconsistentSnapshot("torn".into()).into();
        assert_eq!(err.class(), ErrorClass::DataIntegrity);
        assert!(err.is_retryable());

        let err: AppError = StoreError::Unavailable("down".into()).into();
        assert_eq!(err.class(), ErrorClass::Transient);
    }

    #[test]
    fn test_validation_errors_are_not_retryable() {
        let err: AppError = ValidationError::CollectionNotFound("users".into()).into();
        assert_eq!(err.class(), ErrorClass::Validation);
        assert!(!err.is_retryable());
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_amount_overflow_is_permanent_data_error() {
        let err: AppError = AmountOverflow("total cost").into();
        assert_eq!(err.class(), ErrorClass::DataIntegrity);
        assert!(!err.is_retryable());
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
