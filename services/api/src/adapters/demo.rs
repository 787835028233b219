//! services/api/src/adapters/demo.rs
//!
//! Sample bookings, invoices and tax filings for running the service without a real
//! data source. Every document flagged present gets a small placeholder PDF so the
//! previews and exports work end to end.

use backoffice_core::documents::{booking_document_path, city_tax_path, invoice_path, PDF_CONTENT_TYPE};
use backoffice_core::domain::{
    Booking, CityTaxFile, DocumentSlot, DocumentStatus, InvoiceCategory, Ota, PassiveInvoice,
    PaymentStatus, PropertyId,
};
use backoffice_core::ports::{AttachmentStore, PortError, PortResult, RecordStore};
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

type BookingRow = (&'static str, PropertyId, &'static str, &'static str, &'static str, &'static str, Ota, f64, PaymentStatus);

const BOOKINGS: &[BookingRow] = &[
    ("BK-2025-001", PropertyId::Omait, "Alessandro", "Bianchi", "2025-01-10", "2025-01-15", Ota::Booking, 550.0, PaymentStatus::Paid),
    ("BK-2025-002", PropertyId::Omait, "Giulia", "Rossi", "2025-01-22", "2025-01-25", Ota::Airbnb, 320.0, PaymentStatus::Paid),
    ("BK-2025-003", PropertyId::Omait, "Marco", "Verdi", "2025-02-05", "2025-02-10", Ota::Amenitiz, 600.0, PaymentStatus::Pending),
    ("BK-2025-004", PropertyId::Omait, "Elena", "Ferrari", "2025-02-14", "2025-02-18", Ota::Expedia, 750.0, PaymentStatus::Paid),
    ("BK-2025-005", PropertyId::Omait, "Luca", "Rizzo", "2025-03-12", "2025-03-15", Ota::Booking, 410.0, PaymentStatus::Paid),
    ("BK-2025-006", PropertyId::Omait, "Sara", "Gallo", "2025-03-25", "2025-04-01", Ota::Airbnb, 920.0, PaymentStatus::Pending),
    ("BK-2025-007", PropertyId::Omait, "Davide", "Mancini", "2025-04-10", "2025-04-15", Ota::Phone, 1100.0, PaymentStatus::Paid),
    ("BK-2025-008", PropertyId::Omait, "Martina", "Bruno", "2025-05-08", "2025-05-12", Ota::Booking, 580.0, PaymentStatus::Paid),
    ("BK-2025-009", PropertyId::Omait, "Paolo", "Lombardi", "2025-06-15", "2025-06-20", Ota::Expedia, 490.0, PaymentStatus::Pending),
    ("BK-2025-010", PropertyId::Omait, "Chiara", "Moretti", "2025-07-04", "2025-07-10", Ota::Airbnb, 390.0, PaymentStatus::Paid),
    ("BK-2025-011", PropertyId::Cb, "Roberto", "Barbieri", "2025-08-11", "2025-08-14", Ota::Phone, 300.0, PaymentStatus::Paid),
    ("BK-2025-012", PropertyId::Cb, "Silvia", "Fontana", "2025-09-20", "2025-09-27", Ota::Booking, 1250.0, PaymentStatus::Pending),
    ("BK-2025-013", PropertyId::Cb, "Giovanni", "Santoro", "2025-10-05", "2025-10-10", Ota::Expedia, 620.0, PaymentStatus::Paid),
    ("BK-2025-014", PropertyId::Cb, "Francesca", "Mariani", "2025-11-10", "2025-11-13", Ota::Airbnb, 440.0, PaymentStatus::Paid),
    ("BK-2025-015", PropertyId::Cb, "Andrea", "Rinaldi", "2025-12-15", "2025-12-20", Ota::Other, 680.0, PaymentStatus::Pending),
];

/// Present slots per booking, in slot order; bookings not listed have none.
const DOCUMENTS: &[(&str, [bool; 5])] = &[
    ("BK-2025-001", [true, true, true, true, true]),
    ("BK-2025-002", [true, false, false, false, false]),
    ("BK-2025-004", [true, true, false, false, true]),
    ("BK-2025-011", [true, true, false, false, true]),
    ("BK-2025-012", [true, false, false, false, false]),
];

type InvoiceRow = (&'static str, &'static str, &'static str, &'static str, InvoiceCategory, &'static str, &'static str);

const INVOICES: &[InvoiceRow] = &[
    ("INV-1", "Enel Energia", "2024-12-05", "E-2024-998", InvoiceCategory::Utilities, "enel_dic_24.pdf", "2024-12-06T10:00:00Z"),
    ("INV-2", "Booking.com BV", "2024-12-02", "BK-887722", InvoiceCategory::OtaCommissions, "booking_nov_24.pdf", "2024-12-03T11:00:00Z"),
    ("INV-3", "Lavanderia Splendido", "2024-12-15", "2024/FT/12", InvoiceCategory::Laundry, "lavanderia_15dic.pdf", "2024-12-16T09:00:00Z"),
    ("INV-4", "Amazon Business", "2024-12-20", "AMZ-445566", InvoiceCategory::Purchases, "amazon_lenzuola.pdf", "2024-12-21T14:00:00Z"),
    ("INV-5", "Leroy Merlin", "2025-01-08", "LM-2025-001", InvoiceCategory::Maintenance, "vernice_maniglie.pdf", "2025-01-09T16:30:00Z"),
    ("INV-6", "Fastweb SPA", "2025-01-05", "FW-JAN-25", InvoiceCategory::Utilities, "fibra_jan_25.pdf", "2025-01-06T12:00:00Z"),
    ("INV-7", "Airbnb Ireland", "2025-01-10", "AIR-99001", InvoiceCategory::OtaCommissions, "airbnb_comm_jan.pdf", "2025-01-11T10:00:00Z"),
    ("INV-8", "Commercialista Rossi", "2025-01-15", "FT/01/25", InvoiceCategory::Other, "consulenza_gennaio.pdf", "2025-01-16T18:00:00Z"),
    ("INV-9", "IKEA Italia", "2025-01-20", "IK-554433", InvoiceCategory::Purchases, "arredi_camere.pdf", "2025-01-21T11:00:00Z"),
    ("INV-10", "Idraulico Bianchi", "2025-01-25", "IDR-2025-10", InvoiceCategory::Maintenance, "riparazione_bagno.pdf", "2025-01-26T15:00:00Z"),
    ("INV-11", "Enel Energia", "2025-02-05", "E-2025-045", InvoiceCategory::Utilities, "enel_feb_25.pdf", "2025-02-06T10:00:00Z"),
    ("INV-12", "Lavanderia Splendido", "2025-02-12", "2025/FT/05", InvoiceCategory::Laundry, "lavanderia_feb.pdf", "2025-02-13T09:30:00Z"),
    ("INV-13", "Nespresso Italia", "2025-02-14", "NESP-8822", InvoiceCategory::Purchases, "capsule_caffe.pdf", "2025-02-15T12:00:00Z"),
    ("INV-14", "Booking.com BV", "2025-02-10", "BK-991144", InvoiceCategory::OtaCommissions, "booking_feb_25.pdf", "2025-02-11T14:20:00Z"),
    ("INV-15", "Comune - TARI", "2025-02-20", "TARI-2025-1", InvoiceCategory::Utilities, "tari_rata1.pdf", "2025-02-21T16:00:00Z"),
    ("INV-16", "Amazon Business", "2025-02-25", "AMZ-667788", InvoiceCategory::Purchases, "kit_cortesia.pdf", "2025-02-26T10:00:00Z"),
    ("INV-17", "Elettricista Verdi", "2025-03-02", "EL-005/25", InvoiceCategory::Maintenance, "led_corridoio.pdf", "2025-03-03T11:45:00Z"),
    ("INV-18", "Fastweb SPA", "2025-03-05", "FW-MAR-25", InvoiceCategory::Utilities, "fibra_mar_25.pdf", "2025-03-06T13:00:00Z"),
    ("INV-19", "Airbnb Ireland", "2025-03-08", "AIR-00223", InvoiceCategory::OtaCommissions, "airbnb_comm_mar.pdf", "2025-03-09T10:00:00Z"),
    ("INV-20", "Lavanderia Splendido", "2025-03-12", "2025/FT/18", InvoiceCategory::Laundry, "lavanderia_mar.pdf", "2025-03-13T09:00:00Z"),
];

type TaxRow = (&'static str, PropertyId, i32, u8, &'static str, &'static str);

const TAX_FILES: &[TaxRow] = &[
    ("TAX-DEMO-1", PropertyId::Omait, 2025, 1, "Ricevuta_Pagamento_Q1_Omait.pdf", "2025-04-10T10:00:00Z"),
    ("TAX-DEMO-2", PropertyId::Omait, 2025, 1, "Comunicazione_Comune_Marzo.pdf", "2025-04-12T11:30:00Z"),
    ("TAX-DEMO-3", PropertyId::Omait, 2025, 2, "Bollettino_Acconto_Maggio.pdf", "2025-05-20T09:00:00Z"),
    ("TAX-DEMO-4", PropertyId::Cb, 2025, 1, "CityTax_Q1_CB_Final.pdf", "2025-04-05T14:00:00Z"),
    ("TAX-DEMO-5", PropertyId::Cb, 2025, 1, "Rendiconto_Ospiti_Gennaio.pdf", "2025-02-10T08:45:00Z"),
    ("TAX-DEMO-6", PropertyId::Cb, 2025, 1, "Rendiconto_Ospiti_Febbraio.pdf", "2025-03-11T10:20:00Z"),
    ("TAX-DEMO-7", PropertyId::Cb, 2025, 2, "F24_Soggiorno_Giugno.pdf", "2025-07-02T16:15:00Z"),
    ("TAX-DEMO-8", PropertyId::Omait, 2024, 4, "Saldo_Annuale_2024_Omait.pdf", "2025-01-15T12:00:00Z"),
];

fn date(value: &str) -> PortResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| PortError::Unexpected(format!("bad demo date {value}: {e}")))
}

fn timestamp(value: &str) -> PortResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| PortError::Unexpected(format!("bad demo timestamp {value}: {e}")))
}

/// A minimal document standing in for a real PDF.
fn placeholder_pdf(title: &str) -> Bytes {
    Bytes::from(format!("%PDF-1.4\n% {title}\n%%EOF\n"))
}

pub fn demo_bookings() -> PortResult<Vec<Booking>> {
    let now = Utc::now();
    BOOKINGS
        .iter()
        .map(|&(id, property, first, last, check_in, check_out, ota, total, payment)| {
            let mut documents = DocumentStatus::default();
            if let Some((_, flags)) = DOCUMENTS.iter().find(|(doc_id, _)| *doc_id == id) {
                for (slot, present) in DocumentSlot::ALL.iter().zip(flags) {
                    documents.set(*slot, *present);
                }
            }
            Ok(Booking {
                booking_id: id.to_string(),
                property,
                first_name: first.to_string(),
                last_name: last.to_string(),
                check_in: date(check_in)?,
                check_out: date(check_out)?,
                ota,
                stay_total: total,
                payment_status: payment,
                documents,
                internal_notes: String::new(),
                is_manual: false,
                created_at: now,
                updated_at: now,
            })
        })
        .collect()
}

pub fn demo_invoices() -> PortResult<Vec<PassiveInvoice>> {
    INVOICES
        .iter()
        .map(|&(id, supplier, issued, number, category, file_name, created)| {
            Ok(PassiveInvoice {
                id: id.to_string(),
                supplier: supplier.to_string(),
                issue_date: date(issued)?,
                invoice_number: number.to_string(),
                category,
                note: None,
                file_name: file_name.to_string(),
                created_at: timestamp(created)?,
            })
        })
        .collect()
}

pub fn demo_city_tax_files() -> PortResult<Vec<CityTaxFile>> {
    TAX_FILES
        .iter()
        .map(|&(id, property, year, quarter, file_name, uploaded)| {
            Ok(CityTaxFile {
                id: id.to_string(),
                property,
                year,
                quarter,
                file_name: file_name.to_string(),
                uploaded_at: timestamp(uploaded)?,
            })
        })
        .collect()
}

/// Loads every demo record and a placeholder PDF for each present attachment.
pub async fn seed(records: &dyn RecordStore, attachments: &dyn AttachmentStore) -> PortResult<()> {
    let bookings = demo_bookings()?;
    let mut blobs = 0;
    for booking in bookings {
        for slot in DocumentSlot::ALL {
            if booking.documents.get(*slot) {
                let path = booking_document_path(&booking.booking_id, *slot);
                attachments
                    .put(&path, placeholder_pdf(&path), PDF_CONTENT_TYPE)
                    .await?;
                blobs += 1;
            }
        }
        records.create_booking(booking).await?;
    }

    for invoice in demo_invoices()? {
        let path = invoice_path(&invoice.id, &invoice.file_name);
        attachments.put(&path, placeholder_pdf(&path), PDF_CONTENT_TYPE).await?;
        blobs += 1;
        records.create_invoice(invoice).await?;
    }

    for file in demo_city_tax_files()? {
        let path = city_tax_path(&file.id, &file.file_name);
        attachments.put(&path, placeholder_pdf(&path), PDF_CONTENT_TYPE).await?;
        blobs += 1;
        records.create_city_tax_file(file).await?;
    }

    info!(
        "Seeded {} bookings, {} invoices, {} tax files and {} placeholder documents",
        BOOKINGS.len(),
        INVOICES.len(),
        TAX_FILES.len(),
        blobs
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryAttachmentStore, MemoryRecordStore};

    #[tokio::test]
    async fn seeds_records_with_matching_blobs() {
        let records = MemoryRecordStore::new();
        let attachments = MemoryAttachmentStore::new();
        seed(&records, &attachments).await.unwrap();

        let bookings = records.list_bookings().await.unwrap();
        assert_eq!(bookings.len(), 15);
        let first = records.get_booking("BK-2025-001").await.unwrap();
        assert!(first.documents.is_complete());
        assert_eq!(attachments.list("documenti/BK-2025-001/").await.unwrap().len(), 5);
        assert!(attachments.list("documenti/BK-2025-003/").await.unwrap().is_empty());

        let invoices = records.list_invoices().await.unwrap();
        assert_eq!(invoices.len(), 20);
        assert_eq!(invoices[0].id, "INV-20");

        let q1 = records.list_city_tax_files(PropertyId::Cb, 2025).await.unwrap();
        assert_eq!(q1.len(), 4);
        assert_eq!(q1[0].id, "TAX-DEMO-7");
    }
}
