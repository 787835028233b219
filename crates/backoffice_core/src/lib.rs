pub mod archive;
pub mod documents;
pub mod domain;
pub mod filter;
pub mod login;
pub mod ports;

pub use archive::{export_range, export_record, fetch_attachment, ArchiveExport, ArchiveRecord, ExportError, ExportProgress};
pub use documents::{BatchUpload, Upload};
pub use domain::{
    Booking, BookingUpdate, CityTaxFile, DocumentSlot, DocumentStatus, InvalidBooking, InvoiceCategory, NewBooking,
    NewInvoice, Ota, Overview, PassiveInvoice, PaymentStatus, PropertyId,
};
pub use filter::{BookingFilter, DateRange, FilterError, InvoiceFilter};
pub use login::{LoginAttempt, LoginFailure, LoginStage, LoginView};
pub use ports::{AttachmentStore, IdentityProvider, PortError, PortResult, RecordStore, SessionStore};
