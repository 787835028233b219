//! crates/backoffice_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the back-office core.
//! These traits form the boundary of the hexagonal architecture: the record store,
//! the blob store holding uploaded PDFs, the persisted session flag and the identity
//! collaborator that checks passwords and one-time codes. Each has a real and an
//! in-memory adapter, selected by configuration.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::{
    Booking, BookingUpdate, CityTaxFile, DocumentSlot, InvalidBooking, PassiveInvoice, PropertyId,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, disk).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Rejected(String),
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

impl From<InvalidBooking> for PortError {
    fn from(e: InvalidBooking) -> Self {
        PortError::Rejected(e.to_string())
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// The only value the session collaborator ever stores.
pub const SESSION_MARKER: &str = "active_secure_2fa_v3";

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Metadata for bookings, supplier invoices and tax filings.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // --- Bookings ---
    async fn list_bookings(&self) -> PortResult<Vec<Booking>>;

    async fn list_bookings_by_property(&self, property: PropertyId) -> PortResult<Vec<Booking>>;

    async fn get_booking(&self, booking_id: &str) -> PortResult<Booking>;

    async fn create_booking(&self, booking: Booking) -> PortResult<()>;

    /// Merges the `Some` fields of `update` into the stored booking.
    async fn update_booking(&self, booking_id: &str, update: &BookingUpdate) -> PortResult<Booking>;

    async fn set_document_status(
        &self,
        booking_id: &str,
        slot: DocumentSlot,
        present: bool,
    ) -> PortResult<Booking>;

    async fn delete_booking(&self, booking_id: &str) -> PortResult<()>;

    // --- Supplier Invoices ---
    /// All invoices, newest issue date first.
    async fn list_invoices(&self) -> PortResult<Vec<PassiveInvoice>>;

    async fn get_invoice(&self, invoice_id: &str) -> PortResult<PassiveInvoice>;

    async fn create_invoice(&self, invoice: PassiveInvoice) -> PortResult<()>;

    async fn delete_invoice(&self, invoice_id: &str) -> PortResult<()>;

    // --- Tourist-Tax Filings ---
    /// Filings of one property and year, most recent upload first.
    async fn list_city_tax_files(&self, property: PropertyId, year: i32) -> PortResult<Vec<CityTaxFile>>;

    async fn list_city_tax_files_by_property(&self, property: PropertyId) -> PortResult<Vec<CityTaxFile>>;

    async fn get_city_tax_file(&self, file_id: &str) -> PortResult<CityTaxFile>;

    async fn create_city_tax_file(&self, file: CityTaxFile) -> PortResult<()>;

    async fn delete_city_tax_file(&self, file_id: &str) -> PortResult<()>;
}

/// Blob storage addressed by slash-separated paths.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    async fn put(&self, path: &str, data: Bytes, content_type: &str) -> PortResult<()>;

    /// Returns `None` when no blob exists at `path`.
    async fn get(&self, path: &str) -> PortResult<Option<Bytes>>;

    /// A URL the browser can open to view the blob, or `None` if it is missing.
    async fn download_url(&self, path: &str) -> PortResult<Option<String>>;

    /// Deleting a missing blob is not an error.
    async fn delete(&self, path: &str) -> PortResult<()>;

    /// Every blob path under `prefix`, sorted.
    async fn list(&self, prefix: &str) -> PortResult<Vec<String>>;
}

/// The persisted "authenticated" flag.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores [`SESSION_MARKER`].
    async fn establish(&self) -> PortResult<()>;

    async fn clear(&self) -> PortResult<()>;

    async fn is_active(&self) -> PortResult<bool>;
}

/// Checks login secrets. Usernames arrive trimmed and lower-cased, secrets trimmed.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_password(&self, username: &str, password: &str) -> PortResult<bool>;

    async fn verify_code(&self, username: &str, code: &str) -> PortResult<bool>;
}
