use thiserror::Error;

/// Centralized error types for the store core
///
/// All errors in the crate are converted to this enum for consistent
/// handling. Uses `thiserror` for automatic conversion and display
/// formatting. The domain variants (`DuplicatePendingOrder`, `OutOfStock`,
/// `NotReady`, `InvalidTransition`, `Unauthorized`) are consumed at the
/// storefront boundary and turned into short user-facing messages; the
/// infrastructure variants propagate to the embedding process.
///
/// # Example
///
/// ```no_run
/// use lavka_core::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     eprintln!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),

    /// Buyer already has an open order; resolves once that order leaves PENDING
    #[error("Buyer {0} already has a pending order")]
    DuplicatePendingOrder(i64),

    /// No AVAILABLE inventory item of the requested plan at allocation time
    #[error("No available stock for plan '{0}'")]
    OutOfStock(String),

    /// Approval attempted on an order with no payment proof attached
    #[error("Order {0} has no payment proof attached")]
    NotReady(String),

    /// Attempt to move an order out of a terminal status
    #[error("Illegal transition for order {order_id}: {from} -> {to}")]
    InvalidTransition {
        order_id: String,
        from: String,
        to: String,
    },

    /// Caller is not the configured reviewer
    #[error("User {0} is not allowed to review orders")]
    Unauthorized(i64),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Snake_case outcome tag recorded in the audit log for failed
    /// transition attempts.
    pub fn audit_tag(&self) -> &'static str {
        match self {
            AppError::DuplicatePendingOrder(_) => "duplicate_pending_order",
            AppError::OutOfStock(_) => "out_of_stock",
            AppError::NotReady(_) => "not_ready",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Validation(_) => "validation",
            AppError::Database(_) => "database_error",
            AppError::DatabasePool(_) => "pool_error",
            AppError::Io(_) => "io_error",
            AppError::Anyhow(_) => "internal_error",
        }
    }

    /// True for the error kinds that are part of the normal order
    /// workflow (handled at the boundary), false for infrastructure
    /// faults that should propagate.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            AppError::DuplicatePendingOrder(_)
                | AppError::OutOfStock(_)
                | AppError::NotReady(_)
                | AppError::InvalidTransition { .. }
                | AppError::Unauthorized(_)
        )
    }
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
