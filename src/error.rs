use crate::domain::work_item::WorkItemStatus;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Cannot {attempted} work item {work_item}: current state is {current}")]
    InvalidTransitionError {
        work_item: Uuid,
        current: WorkItemStatus,
        attempted: &'static str,
    },
    #[error("Actor {actor} may not {action} work item {work_item}")]
    UnauthorizedActor {
        actor: String,
        action: &'static str,
        work_item: Uuid,
    },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),
    #[error(
        "Amount mismatch on payment record {payment_record}: ledger {expected} {currency}, gateway settled {settled}"
    )]
    AmountMismatch {
        payment_record: Uuid,
        expected: Decimal,
        settled: Decimal,
        currency: String,
    },
    #[error("Intent mismatch for work item {work_item}: stored {stored:?}, received {received}")]
    IntentMismatch {
        work_item: Uuid,
        stored: Option<String>,
        received: String,
    },
    #[error(
        "Insufficient budget for business {business}: cap {cap}, used {used}, requested {requested}"
    )]
    InsufficientBudget {
        business: String,
        cap: Decimal,
        used: Decimal,
        requested: Decimal,
    },
    #[error("Payment record {0} is on hold pending manual review")]
    PaymentOnHold(Uuid),
    #[error("Payment record {0} is not completed")]
    PaymentNotCompleted(Uuid),
    #[error("Concurrent update conflict: {0}")]
    StorageConflict(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl EngineError {
    pub fn internal(message: impl Into<String>) -> Self {
        EngineError::InternalError(Box::new(std::io::Error::other(message.into())))
    }

    /// Transient failures a caller may retry with backoff. Integrity
    /// violations and state-precondition failures are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::GatewayUnavailable(_) | EngineError::StorageConflict(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
