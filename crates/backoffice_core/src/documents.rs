//! crates/backoffice_core/src/documents.rs
//!
//! Record workflows that touch both the record store and the blob store: uploading
//! and removing booking documents, deleting a booking with all its files, and the
//! invoice and tourist-tax uploads. Also derives the blob paths and exposes each
//! record kind to the archive export.

use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::archive::{ArchiveRecord, AttachmentSlot};
use crate::domain::{
    quarter_start, Booking, CityTaxFile, DocumentSlot, NewBooking, NewInvoice, PassiveInvoice,
    PropertyId,
};
use crate::ports::{AttachmentStore, PortError, PortResult, RecordStore};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

//=========================================================================================
// Storage Paths
//=========================================================================================

pub fn booking_prefix(booking_id: &str) -> String {
    format!("documenti/{booking_id}/")
}

pub fn booking_document_path(booking_id: &str, slot: DocumentSlot) -> String {
    format!("documenti/{booking_id}/{}.pdf", slot.as_str())
}

pub fn invoice_path(invoice_id: &str, file_name: &str) -> String {
    format!("fatture_passive/{invoice_id}/{file_name}")
}

pub fn city_tax_path(file_id: &str, file_name: &str) -> String {
    format!("imposta_soggiorno/{file_id}/{file_name}")
}

/// Generates a record id such as `INV-3f2a...`.
fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

//=========================================================================================
// Archive Views
//=========================================================================================

impl ArchiveRecord for Booking {
    fn record_id(&self) -> &str {
        &self.booking_id
    }

    fn archive_date(&self) -> NaiveDate {
        self.check_in
    }

    fn folder_label(&self) -> String {
        self.guest_folder()
    }

    fn attachment_slots(&self) -> Vec<AttachmentSlot> {
        DocumentSlot::ALL
            .iter()
            .map(|slot| AttachmentSlot {
                path: booking_document_path(&self.booking_id, *slot),
                label: slot.label(self.property).to_string(),
                present: self.documents.get(*slot),
            })
            .collect()
    }
}

impl ArchiveRecord for PassiveInvoice {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn archive_date(&self) -> NaiveDate {
        self.issue_date
    }

    fn folder_label(&self) -> String {
        self.download_stem()
    }

    fn attachment_slots(&self) -> Vec<AttachmentSlot> {
        vec![AttachmentSlot {
            path: invoice_path(&self.id, &self.file_name),
            label: self.download_stem(),
            present: !self.file_name.is_empty(),
        }]
    }
}

impl ArchiveRecord for CityTaxFile {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn archive_date(&self) -> NaiveDate {
        self.period_start()
    }

    fn folder_label(&self) -> String {
        format!("{}_Q{}", self.year, self.quarter)
    }

    fn attachment_slots(&self) -> Vec<AttachmentSlot> {
        vec![AttachmentSlot {
            path: city_tax_path(&self.id, &self.file_name),
            label: format!("{}_{}", self.folder_label(), file_stem(&self.file_name)),
            present: !self.file_name.is_empty(),
        }]
    }
}

fn file_stem(file_name: &str) -> &str {
    let cut = file_name.len().saturating_sub(4);
    match file_name.get(cut..) {
        Some(ext) if ext.eq_ignore_ascii_case(".pdf") => &file_name[..cut],
        _ => file_name,
    }
}

//=========================================================================================
// Uploads
//=========================================================================================

/// A file received from the browser.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl Upload {
    pub fn is_pdf(&self) -> bool {
        self.content_type.eq_ignore_ascii_case(PDF_CONTENT_TYPE)
    }

    fn require_pdf(&self) -> PortResult<()> {
        if self.is_pdf() {
            return Ok(());
        }
        Err(PortError::UnsupportedType(format!(
            "{} is not a PDF",
            self.file_name
        )))
    }
}

fn require_text(value: &str, field: &str) -> PortResult<()> {
    if value.trim().is_empty() {
        return Err(PortError::Rejected(format!("{field} is required")));
    }
    Ok(())
}

//=========================================================================================
// Booking Workflows
//=========================================================================================

pub async fn create_manual_booking(records: &dyn RecordStore, new: NewBooking) -> PortResult<Booking> {
    let booking = new.into_booking(new_id("MAN"), Utc::now());
    booking.validate()?;
    records.create_booking(booking.clone()).await?;
    info!("Manual booking {} created", booking.booking_id);
    Ok(booking)
}

/// Stores a PDF in a booking slot and marks the slot present.
pub async fn attach_booking_document(
    records: &dyn RecordStore,
    attachments: &dyn AttachmentStore,
    booking_id: &str,
    slot: DocumentSlot,
    upload: Upload,
) -> PortResult<Booking> {
    upload.require_pdf()?;
    records.get_booking(booking_id).await?;
    attachments
        .put(&booking_document_path(booking_id, slot), upload.data, PDF_CONTENT_TYPE)
        .await?;
    records.set_document_status(booking_id, slot, true).await
}

/// Removes the PDF of a booking slot and marks the slot absent.
pub async fn detach_booking_document(
    records: &dyn RecordStore,
    attachments: &dyn AttachmentStore,
    booking_id: &str,
    slot: DocumentSlot,
) -> PortResult<Booking> {
    attachments
        .delete(&booking_document_path(booking_id, slot))
        .await?;
    records.set_document_status(booking_id, slot, false).await
}

/// Deletes a booking and then every blob stored under its prefix. Blob deletions
/// that fail are logged and skipped.
pub async fn delete_booking(
    records: &dyn RecordStore,
    attachments: &dyn AttachmentStore,
    booking_id: &str,
) -> PortResult<()> {
    records.delete_booking(booking_id).await?;
    let paths = attachments.list(&booking_prefix(booking_id)).await?;
    for path in &paths {
        if let Err(e) = attachments.delete(path).await {
            warn!("Failed to delete {} of booking {}: {:?}", path, booking_id, e);
        }
    }
    info!("Booking {} deleted with {} files", booking_id, paths.len());
    Ok(())
}

//=========================================================================================
// Invoice Workflows
//=========================================================================================

pub async fn upload_invoice(
    records: &dyn RecordStore,
    attachments: &dyn AttachmentStore,
    new: NewInvoice,
    upload: Upload,
) -> PortResult<PassiveInvoice> {
    require_text(&new.supplier, "supplier")?;
    require_text(&new.invoice_number, "invoice_number")?;
    upload.require_pdf()?;

    let invoice = PassiveInvoice {
        id: new_id("INV"),
        supplier: new.supplier.trim().to_string(),
        issue_date: new.issue_date,
        invoice_number: new.invoice_number.trim().to_string(),
        category: new.category,
        note: new.note.filter(|n| !n.trim().is_empty()),
        file_name: upload.file_name,
        created_at: Utc::now(),
    };
    attachments
        .put(&invoice_path(&invoice.id, &invoice.file_name), upload.data, PDF_CONTENT_TYPE)
        .await?;
    records.create_invoice(invoice.clone()).await?;
    info!("Invoice {} from {} stored", invoice.id, invoice.supplier);
    Ok(invoice)
}

pub async fn delete_invoice(
    records: &dyn RecordStore,
    attachments: &dyn AttachmentStore,
    invoice_id: &str,
) -> PortResult<()> {
    let invoice = records.get_invoice(invoice_id).await?;
    records.delete_invoice(invoice_id).await?;
    if let Err(e) = attachments
        .delete(&invoice_path(invoice_id, &invoice.file_name))
        .await
    {
        warn!("Failed to delete file of invoice {}: {:?}", invoice_id, e);
    }
    Ok(())
}

//=========================================================================================
// Tourist-Tax Workflows
//=========================================================================================

/// Outcome of a multi-file upload into one quarter.
#[derive(Debug, Clone, Default)]
pub struct BatchUpload {
    pub stored: Vec<CityTaxFile>,
    /// Names of the files refused because they are not PDFs.
    pub rejected: Vec<String>,
}

/// Uploads several files into one quarter. Non-PDF files are refused one by one;
/// the rest of the batch still goes through.
pub async fn upload_city_tax_files(
    records: &dyn RecordStore,
    attachments: &dyn AttachmentStore,
    property: PropertyId,
    year: i32,
    quarter: u8,
    uploads: Vec<Upload>,
) -> PortResult<BatchUpload> {
    if quarter_start(year, quarter).is_none() {
        return Err(PortError::Rejected(format!("invalid quarter {quarter} of {year}")));
    }

    let mut outcome = BatchUpload::default();
    for upload in uploads {
        if let Err(e) = upload.require_pdf() {
            warn!("Refusing tax file upload: {}", e);
            outcome.rejected.push(upload.file_name);
            continue;
        }
        let file = CityTaxFile {
            id: new_id("TAX"),
            property,
            year,
            quarter,
            file_name: upload.file_name,
            uploaded_at: Utc::now(),
        };
        attachments
            .put(&city_tax_path(&file.id, &file.file_name), upload.data, PDF_CONTENT_TYPE)
            .await?;
        records.create_city_tax_file(file.clone()).await?;
        outcome.stored.push(file);
    }
    info!(
        "Tax files for {} {} Q{}: {} stored, {} rejected",
        property,
        year,
        quarter,
        outcome.stored.len(),
        outcome.rejected.len()
    );
    Ok(outcome)
}

pub async fn delete_city_tax_file(
    records: &dyn RecordStore,
    attachments: &dyn AttachmentStore,
    file_id: &str,
) -> PortResult<()> {
    let file = records.get_city_tax_file(file_id).await?;
    records.delete_city_tax_file(file_id).await?;
    if let Err(e) = attachments.delete(&city_tax_path(file_id, &file.file_name)).await {
        warn!("Failed to delete tax file {}: {:?}", file_id, e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentStatus, InvoiceCategory, Ota, PaymentStatus};

    fn booking(property: PropertyId) -> Booking {
        let now = Utc::now();
        let mut documents = DocumentStatus::default();
        documents.set(DocumentSlot::GuestDocuments, true);
        documents.set(DocumentSlot::StayInvoice, true);
        Booking {
            booking_id: "BK-7".to_string(),
            property,
            first_name: "Anna".to_string(),
            last_name: "Rossi".to_string(),
            check_in: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2025, 1, 12).unwrap(),
            ota: Ota::Airbnb,
            stay_total: 180.0,
            payment_status: PaymentStatus::Paid,
            documents,
            internal_notes: String::new(),
            is_manual: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn booking_slots_follow_the_fixed_order() {
        let slots = booking(PropertyId::Cb).attachment_slots();
        let paths: Vec<_> = slots.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "documenti/BK-7/dettagli_prenotazione.pdf",
                "documenti/BK-7/dettagli_ospiti.pdf",
                "documenti/BK-7/ricevuta_alloggiati.pdf",
                "documenti/BK-7/fattura_ota.pdf",
                "documenti/BK-7/fattura_soggiorno.pdf",
            ]
        );
        let present: Vec<_> = slots.iter().filter(|s| s.present).map(|s| s.label.as_str()).collect();
        assert_eq!(present, vec!["Documenti Ospiti", "Ricevuta Soggiorno"]);
    }

    #[test]
    fn booking_archives_under_guest_folder_by_check_in() {
        let b = booking(PropertyId::Omait);
        assert_eq!(b.folder_label(), "Anna_Rossi");
        assert_eq!(b.archive_date(), b.check_in);
        assert!(booking_document_path(&b.booking_id, DocumentSlot::OtaInvoice)
            .starts_with(&booking_prefix(&b.booking_id)));
    }

    #[test]
    fn invoice_is_a_single_named_entry() {
        let invoice = PassiveInvoice {
            id: "INV-1".to_string(),
            supplier: "Enel Energia".to_string(),
            issue_date: NaiveDate::from_ymd_opt(2025, 2, 5).unwrap(),
            invoice_number: "E/1".to_string(),
            category: InvoiceCategory::Utilities,
            note: None,
            file_name: "enel.pdf".to_string(),
            created_at: Utc::now(),
        };
        let slots = invoice.attachment_slots();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].path, "fatture_passive/INV-1/enel.pdf");
        assert_eq!(slots[0].label, "2025-02-05_Enel_Energia_E-1");
    }

    #[test]
    fn tax_file_is_dated_by_its_quarter() {
        let file = CityTaxFile {
            id: "TAX-1".to_string(),
            property: PropertyId::Omait,
            year: 2025,
            quarter: 3,
            file_name: "versamento.PDF".to_string(),
            uploaded_at: Utc::now(),
        };
        assert_eq!(file.archive_date(), NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        let slots = file.attachment_slots();
        assert_eq!(slots[0].path, "imposta_soggiorno/TAX-1/versamento.PDF");
        assert_eq!(slots[0].label, "2025_Q3_versamento");
    }

    #[test]
    fn file_stem_only_strips_pdf() {
        assert_eq!(file_stem("a.pdf"), "a");
        assert_eq!(file_stem("a.txt"), "a.txt");
        assert_eq!(file_stem("pdf"), "pdf");
    }

    #[test]
    fn only_pdf_uploads_are_accepted() {
        let mut upload = Upload {
            file_name: "scan.png".to_string(),
            content_type: "image/png".to_string(),
            data: Bytes::from_static(b"png"),
        };
        assert!(matches!(upload.require_pdf(), Err(PortError::UnsupportedType(_))));
        upload.content_type = "Application/PDF".to_string();
        assert!(upload.is_pdf());
    }
}
