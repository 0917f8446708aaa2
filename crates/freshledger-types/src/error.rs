use thiserror::Error;

/// Coarse classification of every error the engine can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input; always rejected before any write.
    Validation,
    /// Update/delete of an invoice that is not live.
    NotFound,
    /// Strict creation of an invoice that already exists, or an id owned by another store.
    Conflict,
    /// I/O or encoding failure against the Ledger Store.
    Store,
    /// Business-rule violation detected against the transaction history.
    BusinessRule,
    /// Nothing to compute over.
    NoData,
}

#[derive(Debug, Error)]
pub enum FreshLedgerError {
    #[error("Invalid invoice type '{0}': must be either 'purchase' or 'sales'")]
    InvalidInvoiceType(String),

    #[error("Item {0} is not a food item; only food items can be recorded")]
    NotFoodItem(String),

    #[error("Item {item_id} has invalid quantity {quantity}: must be positive")]
    InvalidQuantity { item_id: String, quantity: f64 },

    #[error("Invalid date '{value}': {reason}")]
    InvalidDate { value: String, reason: String },

    #[error("Invoice id mismatch: expected {expected}, got {actual}")]
    InvoiceIdMismatch { expected: String, actual: String },

    #[error("Item {item_id} expired on {expiry_date} but invoice is dated {invoice_date}")]
    ExpiredItem {
        item_id: String,
        expiry_date: String,
        invoice_date: String,
    },

    #[error("Invoice already exists: {0}")]
    DuplicateInvoice(String),

    #[error("Invoice {invoice_id} belongs to store {owner}, not {requested}")]
    InvoiceOwnedByOtherStore {
        invoice_id: String,
        owner: String,
        requested: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    #[error(
        "Sales exceed purchases for {item_id}/{expiry_date}: {total_sales} sold, {total_purchases} purchased"
    )]
    SalesExceedPurchases {
        item_id: String,
        expiry_date: String,
        total_purchases: f64,
        total_sales: f64,
    },

    #[error("No purchase data for {item_id}/{expiry_date}")]
    NoPurchaseData { item_id: String, expiry_date: String },

    #[error("No items recorded for store {0}")]
    NoItems(String),

    #[error("No quality index records satisfy {0}")]
    NoQualityData(String),

    #[error("Ledger store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FreshLedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInvoiceType(_)
            | Self::NotFoodItem(_)
            | Self::InvalidQuantity { .. }
            | Self::InvalidDate { .. }
            | Self::InvoiceIdMismatch { .. }
            | Self::InvalidConfig(_) => ErrorKind::Validation,
            Self::InvoiceNotFound(_) => ErrorKind::NotFound,
            Self::DuplicateInvoice(_) | Self::InvoiceOwnedByOtherStore { .. } => {
                ErrorKind::Conflict
            }
            Self::ExpiredItem { .. } | Self::SalesExceedPurchases { .. } => {
                ErrorKind::BusinessRule
            }
            Self::NoPurchaseData { .. } | Self::NoItems(_) | Self::NoQualityData(_) => {
                ErrorKind::NoData
            }
            Self::Store(_) | Self::Serialization(_) => ErrorKind::Store,
        }
    }
}

impl From<serde_json::Error> for FreshLedgerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FreshLedgerError>;
