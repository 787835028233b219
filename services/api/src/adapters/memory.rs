//! services/api/src/adapters/memory.rs
//!
//! In-process implementations of the storage ports. They back the demo mode and the
//! integration tests, and hold everything behind `tokio::sync::RwLock`s.

use async_trait::async_trait;
use backoffice_core::domain::{
    Booking, BookingUpdate, CityTaxFile, DocumentSlot, PassiveInvoice, PropertyId,
};
use backoffice_core::ports::{
    AttachmentStore, PortError, PortResult, RecordStore, SessionStore, SESSION_MARKER,
};
use bytes::Bytes;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

//=========================================================================================
// Records
//=========================================================================================

/// Keeps bookings, invoices and tax filings in insertion order.
#[derive(Default)]
pub struct MemoryRecordStore {
    bookings: RwLock<Vec<Booking>>,
    invoices: RwLock<Vec<PassiveInvoice>>,
    tax_files: RwLock<Vec<CityTaxFile>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(kind: &str, id: &str) -> PortError {
    PortError::NotFound(format!("{kind} {id}"))
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn list_bookings(&self) -> PortResult<Vec<Booking>> {
        Ok(self.bookings.read().await.clone())
    }

    async fn list_bookings_by_property(&self, property: PropertyId) -> PortResult<Vec<Booking>> {
        Ok(self
            .bookings
            .read()
            .await
            .iter()
            .filter(|b| b.property == property)
            .cloned()
            .collect())
    }

    async fn get_booking(&self, booking_id: &str) -> PortResult<Booking> {
        self.bookings
            .read()
            .await
            .iter()
            .find(|b| b.booking_id == booking_id)
            .cloned()
            .ok_or_else(|| not_found("booking", booking_id))
    }

    async fn create_booking(&self, booking: Booking) -> PortResult<()> {
        let mut bookings = self.bookings.write().await;
        if bookings.iter().any(|b| b.booking_id == booking.booking_id) {
            return Err(PortError::Rejected(format!(
                "booking {} already exists",
                booking.booking_id
            )));
        }
        bookings.push(booking);
        Ok(())
    }

    async fn update_booking(&self, booking_id: &str, update: &BookingUpdate) -> PortResult<Booking> {
        let mut bookings = self.bookings.write().await;
        let booking = bookings
            .iter_mut()
            .find(|b| b.booking_id == booking_id)
            .ok_or_else(|| not_found("booking", booking_id))?;
        update.apply(booking, Utc::now())?;
        Ok(booking.clone())
    }

    async fn set_document_status(
        &self,
        booking_id: &str,
        slot: DocumentSlot,
        present: bool,
    ) -> PortResult<Booking> {
        let mut bookings = self.bookings.write().await;
        let booking = bookings
            .iter_mut()
            .find(|b| b.booking_id == booking_id)
            .ok_or_else(|| not_found("booking", booking_id))?;
        booking.documents.set(slot, present);
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn delete_booking(&self, booking_id: &str) -> PortResult<()> {
        let mut bookings = self.bookings.write().await;
        let before = bookings.len();
        bookings.retain(|b| b.booking_id != booking_id);
        if bookings.len() == before {
            return Err(not_found("booking", booking_id));
        }
        Ok(())
    }

    async fn list_invoices(&self) -> PortResult<Vec<PassiveInvoice>> {
        let mut invoices = self.invoices.read().await.clone();
        invoices.sort_by(|a, b| b.issue_date.cmp(&a.issue_date));
        Ok(invoices)
    }

    async fn get_invoice(&self, invoice_id: &str) -> PortResult<PassiveInvoice> {
        self.invoices
            .read()
            .await
            .iter()
            .find(|i| i.id == invoice_id)
            .cloned()
            .ok_or_else(|| not_found("invoice", invoice_id))
    }

    async fn create_invoice(&self, invoice: PassiveInvoice) -> PortResult<()> {
        self.invoices.write().await.push(invoice);
        Ok(())
    }

    async fn delete_invoice(&self, invoice_id: &str) -> PortResult<()> {
        let mut invoices = self.invoices.write().await;
        let before = invoices.len();
        invoices.retain(|i| i.id != invoice_id);
        if invoices.len() == before {
            return Err(not_found("invoice", invoice_id));
        }
        Ok(())
    }

    async fn list_city_tax_files(&self, property: PropertyId, year: i32) -> PortResult<Vec<CityTaxFile>> {
        let mut files: Vec<CityTaxFile> = self
            .tax_files
            .read()
            .await
            .iter()
            .filter(|f| f.property == property && f.year == year)
            .cloned()
            .collect();
        files.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(files)
    }

    async fn list_city_tax_files_by_property(&self, property: PropertyId) -> PortResult<Vec<CityTaxFile>> {
        Ok(self
            .tax_files
            .read()
            .await
            .iter()
            .filter(|f| f.property == property)
            .cloned()
            .collect())
    }

    async fn get_city_tax_file(&self, file_id: &str) -> PortResult<CityTaxFile> {
        self.tax_files
            .read()
            .await
            .iter()
            .find(|f| f.id == file_id)
            .cloned()
            .ok_or_else(|| not_found("tax file", file_id))
    }

    async fn create_city_tax_file(&self, file: CityTaxFile) -> PortResult<()> {
        self.tax_files.write().await.push(file);
        Ok(())
    }

    async fn delete_city_tax_file(&self, file_id: &str) -> PortResult<()> {
        let mut files = self.tax_files.write().await;
        let before = files.len();
        files.retain(|f| f.id != file_id);
        if files.len() == before {
            return Err(not_found("tax file", file_id));
        }
        Ok(())
    }
}

//=========================================================================================
// Attachments
//=========================================================================================

/// Blobs keyed by path. Download URLs point at the service's own `/files` route.
#[derive(Default)]
pub struct MemoryAttachmentStore {
    blobs: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttachmentStore for MemoryAttachmentStore {
    async fn put(&self, path: &str, data: Bytes, _content_type: &str) -> PortResult<()> {
        self.blobs.write().await.insert(path.to_string(), data);
        Ok(())
    }

    async fn get(&self, path: &str) -> PortResult<Option<Bytes>> {
        Ok(self.blobs.read().await.get(path).cloned())
    }

    async fn download_url(&self, path: &str) -> PortResult<Option<String>> {
        let exists = self.blobs.read().await.contains_key(path);
        Ok(exists.then(|| format!("/files/{path}")))
    }

    async fn delete(&self, path: &str) -> PortResult<()> {
        self.blobs.write().await.remove(path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> PortResult<Vec<String>> {
        Ok(self
            .blobs
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

//=========================================================================================
// Session
//=========================================================================================

/// Session flag that lives as long as the process.
#[derive(Default)]
pub struct MemorySessionStore {
    marker: RwLock<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn establish(&self) -> PortResult<()> {
        *self.marker.write().await = Some(SESSION_MARKER.to_string());
        Ok(())
    }

    async fn clear(&self) -> PortResult<()> {
        *self.marker.write().await = None;
        Ok(())
    }

    async fn is_active(&self) -> PortResult<bool> {
        Ok(self.marker.read().await.as_deref() == Some(SESSION_MARKER))
    }
}
