//! Application error taxonomy.
//!
//! Every fallible service operation returns [`AppResult`]. Errors carry a
//! stable machine-readable code and an HTTP status, and render themselves as
//! the uniform `{success: false, error: {code, message, details?}}` envelope.
//! Internal and upstream detail is logged, never returned to the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use uuid::Uuid;

use crate::api::response::ErrorEnvelope;
use crate::database::campaign_repository::CampaignStatus;
use crate::database::error::DatabaseError;
use crate::database::withdrawal_repository::WithdrawalStatus;

pub type AppResult<T> = Result<T, AppError>;

/// Business-rule violations raised by the ledger services.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DomainError {
    #[error("Campaign {campaign_id} not found")]
    CampaignNotFound { campaign_id: Uuid },

    #[error("Campaign {campaign_id} is not accepting donations (status: {status})")]
    CampaignNotAcceptingDonations {
        campaign_id: Uuid,
        status: CampaignStatus,
    },

    #[error("Donation with order id '{order_id}' not found")]
    DonationNotFound { order_id: String },

    #[error("Withdrawal {withdrawal_id} not found")]
    WithdrawalNotFound { withdrawal_id: Uuid },

    #[error("Withdrawal amount exceeds available funds. Requested: {requested}, Available: {available}")]
    InsufficientFunds { requested: i64, available: i64 },

    #[error("Withdrawal cannot move from {from} to {to}")]
    InvalidWithdrawalTransition {
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    },

    #[error("Report {report_id} not found")]
    ReportNotFound { report_id: Uuid },

    #[error("Report {report_id} has already been reviewed")]
    ReportAlreadyReviewed { report_id: Uuid },

    #[error("Invalid notification signature for order '{order_id}'")]
    InvalidSignature { order_id: String },
}

/// Malformed or out-of-range input.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },

    #[error("Amount must be at least {minimum}, got {actual}")]
    AmountBelowMinimum { minimum: i64, actual: i64 },

    #[error("Malformed payload: {message}")]
    MalformedPayload { message: String },
}

impl ValidationError {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("{message}")]
    Forbidden { message: String },
}

/// Failures talking to third-party services.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExternalError {
    #[error("{provider} error: {message}")]
    PaymentProvider {
        provider: String,
        message: String,
        is_retryable: bool,
    },

    #[error("{service} rate limit exceeded")]
    RateLimit {
        service: String,
        retry_after: Option<u64>,
    },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum InfrastructureError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AppErrorKind {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    External(#[from] ExternalError),
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{kind}")]
pub struct AppError {
    pub kind: AppErrorKind,
    pub context: Option<String>,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn internal(message: impl Into<String>) -> Self {
        InfrastructureError::Internal {
            message: message.into(),
        }
        .into()
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AuthError::Forbidden {
            message: message.into(),
        }
        .into()
    }

    pub fn domain(&self) -> Option<&DomainError> {
        match &self.kind {
            AppErrorKind::Domain(err) => Some(err),
            _ => None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::CampaignNotFound { .. }
                | DomainError::CampaignNotAcceptingDonations { .. }
                | DomainError::DonationNotFound { .. }
                | DomainError::WithdrawalNotFound { .. }
                | DomainError::ReportNotFound { .. } => StatusCode::NOT_FOUND,
                DomainError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
                DomainError::InvalidWithdrawalTransition { .. }
                | DomainError::ReportAlreadyReviewed { .. } => StatusCode::CONFLICT,
                DomainError::InvalidSignature { .. } => StatusCode::FORBIDDEN,
            },
            AppErrorKind::Validation(_) => StatusCode::BAD_REQUEST,
            AppErrorKind::Auth(AuthError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            AppErrorKind::Auth(_) => StatusCode::UNAUTHORIZED,
            AppErrorKind::External(_) => StatusCode::BAD_GATEWAY,
            AppErrorKind::Infrastructure(InfrastructureError::Database(db_err))
                if db_err.is_not_found() =>
            {
                StatusCode::NOT_FOUND
            }
            AppErrorKind::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code exposed to API clients.
    pub fn code(&self) -> &'static str {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::CampaignNotFound { .. } => "CAMPAIGN_001",
                DomainError::DonationNotFound { .. } => "DONATION_001",
                DomainError::CampaignNotAcceptingDonations { .. } => "DONATION_002",
                DomainError::WithdrawalNotFound { .. } => "WITHDRAWAL_001",
                DomainError::InsufficientFunds { .. } => "WITHDRAWAL_002",
                DomainError::InvalidWithdrawalTransition { .. } => "WITHDRAWAL_003",
                DomainError::ReportNotFound { .. } => "REPORT_001",
                DomainError::ReportAlreadyReviewed { .. } => "REPORT_002",
                DomainError::InvalidSignature { .. } => "WEBHOOK_001",
            },
            AppErrorKind::Validation(_) => "VALIDATION_001",
            AppErrorKind::Auth(AuthError::Forbidden { .. }) => "AUTH_002",
            AppErrorKind::Auth(_) => "AUTH_001",
            AppErrorKind::External(_) => "GATEWAY_001",
            AppErrorKind::Infrastructure(InfrastructureError::Database(db_err))
                if db_err.is_not_found() =>
            {
                "DATABASE_002"
            }
            AppErrorKind::Infrastructure(InfrastructureError::Database(_)) => "DATABASE_001",
            AppErrorKind::Infrastructure(_) => "INTERNAL_001",
        }
    }

    /// Returns a user-safe message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(DomainError::InsufficientFunds { available, .. }) => format!(
                "Withdrawal amount exceeds available funds. Available amount: {}",
                available
            ),
            AppErrorKind::Domain(DomainError::CampaignNotAcceptingDonations { .. }) => {
                "Campaign not found or not accepting donations".to_string()
            }
            AppErrorKind::Domain(DomainError::InvalidSignature { .. }) => {
                "Invalid signature".to_string()
            }
            AppErrorKind::Domain(err) => err.to_string(),
            AppErrorKind::Validation(err) => err.to_string(),
            AppErrorKind::Auth(err) => err.to_string(),
            AppErrorKind::External(_) => {
                "Payment gateway is unavailable, please try again later".to_string()
            }
            AppErrorKind::Infrastructure(InfrastructureError::Database(db_err))
                if db_err.is_not_found() =>
            {
                "Resource not found".to_string()
            }
            AppErrorKind::Infrastructure(_) => "Internal server error".to_string(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match &self.kind {
            AppErrorKind::Domain(DomainError::InsufficientFunds {
                requested,
                available,
            }) => Some(serde_json::json!({
                "requested": requested,
                "available": available,
            })),
            AppErrorKind::Validation(ValidationError::InvalidField { field, .. }) => {
                Some(serde_json::json!({ "field": field }))
            }
            AppErrorKind::Validation(ValidationError::AmountBelowMinimum { minimum, .. }) => {
                Some(serde_json::json!({ "minimum": minimum }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let context = self.context.as_deref().unwrap_or("-");

        match &self.kind {
            AppErrorKind::Infrastructure(_) | AppErrorKind::External(_) => {
                tracing::error!(code = self.code(), context, "Request failed: {}", self);
            }
            AppErrorKind::Domain(DomainError::InvalidSignature { .. })
            | AppErrorKind::Auth(AuthError::Forbidden { .. }) => {
                tracing::warn!(code = self.code(), context, "Request rejected: {}", self);
            }
            AppErrorKind::Auth(_) => {
                tracing::info!(code = self.code(), "Authentication error: {}", self);
            }
            AppErrorKind::Domain(_) | AppErrorKind::Validation(_) => {
                tracing::debug!(code = self.code(), "Client error: {}", self);
            }
        }

        let body = ErrorEnvelope::new(self.code(), self.user_message(), self.details());
        (status, Json(body)).into_response()
    }
}

impl From<AppErrorKind> for AppError {
    fn from(kind: AppErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        Self::new(AppErrorKind::Domain(err))
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::new(AppErrorKind::Validation(err))
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        Self::new(AppErrorKind::Auth(err))
    }
}

impl From<ExternalError> for AppError {
    fn from(err: ExternalError) -> Self {
        Self::new(AppErrorKind::External(err))
    }
}

impl From<InfrastructureError> for AppError {
    fn from(err: InfrastructureError) -> Self {
        Self::new(AppErrorKind::Infrastructure(err))
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        InfrastructureError::Database(err).into()
    }
}
