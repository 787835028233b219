//! services/api/src/adapters/postgres.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `RecordStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use backoffice_core::domain::{
    Booking, BookingUpdate, CityTaxFile, DocumentSlot, DocumentStatus, PassiveInvoice, PropertyId,
};
use backoffice_core::ports::{PortError, PortResult, RecordStore};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `RecordStore` port.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn db_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound("record".to_string()),
        other => PortError::Unexpected(other.to_string()),
    }
}

fn parse_label<T>(value: &str) -> PortResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| PortError::Unexpected(format!("corrupt stored value: {e}")))
}

/// Column holding the presence flag of `slot`.
fn slot_column(slot: DocumentSlot) -> &'static str {
    match slot {
        DocumentSlot::BookingDetails => "booking_details",
        DocumentSlot::GuestDocuments => "guest_documents",
        DocumentSlot::AccommodationReceipt => "accommodation_receipt",
        DocumentSlot::OtaInvoice => "ota_invoice",
        DocumentSlot::StayInvoice => "stay_invoice",
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const BOOKING_COLUMNS: &str = "booking_id, property, first_name, last_name, check_in, check_out, \
    ota, stay_total, payment_status, booking_details, guest_documents, accommodation_receipt, \
    ota_invoice, stay_invoice, internal_notes, is_manual, created_at, updated_at";

#[derive(FromRow)]
struct BookingRecord {
    booking_id: String,
    property: String,
    first_name: String,
    last_name: String,
    check_in: NaiveDate,
    check_out: NaiveDate,
    ota: String,
    stay_total: f64,
    payment_status: String,
    booking_details: bool,
    guest_documents: bool,
    accommodation_receipt: bool,
    ota_invoice: bool,
    stay_invoice: bool,
    internal_notes: String,
    is_manual: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl BookingRecord {
    fn to_domain(self) -> PortResult<Booking> {
        Ok(Booking {
            booking_id: self.booking_id,
            property: parse_label(&self.property)?,
            first_name: self.first_name,
            last_name: self.last_name,
            check_in: self.check_in,
            check_out: self.check_out,
            ota: parse_label(&self.ota)?,
            stay_total: self.stay_total,
            payment_status: parse_label(&self.payment_status)?,
            documents: DocumentStatus {
                booking_details: self.booking_details,
                guest_documents: self.guest_documents,
                accommodation_receipt: self.accommodation_receipt,
                ota_invoice: self.ota_invoice,
                stay_invoice: self.stay_invoice,
            },
            internal_notes: self.internal_notes,
            is_manual: self.is_manual,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct InvoiceRecord {
    id: String,
    supplier: String,
    issue_date: NaiveDate,
    invoice_number: String,
    category: String,
    note: Option<String>,
    file_name: String,
    created_at: DateTime<Utc>,
}
impl InvoiceRecord {
    fn to_domain(self) -> PortResult<PassiveInvoice> {
        Ok(PassiveInvoice {
            id: self.id,
            supplier: self.supplier,
            issue_date: self.issue_date,
            invoice_number: self.invoice_number,
            category: parse_label(&self.category)?,
            note: self.note,
            file_name: self.file_name,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct CityTaxRecord {
    id: String,
    property: String,
    year: i32,
    quarter: i16,
    file_name: String,
    uploaded_at: DateTime<Utc>,
}
impl CityTaxRecord {
    fn to_domain(self) -> PortResult<CityTaxFile> {
        Ok(CityTaxFile {
            id: self.id,
            property: parse_label(&self.property)?,
            year: self.year,
            quarter: u8::try_from(self.quarter)
                .map_err(|_| PortError::Unexpected(format!("corrupt quarter {}", self.quarter)))?,
            file_name: self.file_name,
            uploaded_at: self.uploaded_at,
        })
    }
}

fn all_to_domain<R, T>(rows: Vec<R>, convert: fn(R) -> PortResult<T>) -> PortResult<Vec<T>> {
    rows.into_iter().map(convert).collect()
}

//=========================================================================================
// `RecordStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn list_bookings(&self) -> PortResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRecord>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY check_in"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        all_to_domain(rows, BookingRecord::to_domain)
    }

    async fn list_bookings_by_property(&self, property: PropertyId) -> PortResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRecord>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE property = $1 ORDER BY check_in"
        ))
        .bind(property.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        all_to_domain(rows, BookingRecord::to_domain)
    }

    async fn get_booking(&self, booking_id: &str) -> PortResult<Booking> {
        sqlx::query_as::<_, BookingRecord>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE booking_id = $1"
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| PortError::NotFound(format!("booking {booking_id}")))?
        .to_domain()
    }

    async fn create_booking(&self, booking: Booking) -> PortResult<()> {
        let docs = booking.documents;
        sqlx::query(&format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)"
        ))
        .bind(&booking.booking_id)
        .bind(booking.property.as_str())
        .bind(&booking.first_name)
        .bind(&booking.last_name)
        .bind(booking.check_in)
        .bind(booking.check_out)
        .bind(booking.ota.as_str())
        .bind(booking.stay_total)
        .bind(booking.payment_status.as_str())
        .bind(docs.booking_details)
        .bind(docs.guest_documents)
        .bind(docs.accommodation_receipt)
        .bind(docs.ota_invoice)
        .bind(docs.stay_invoice)
        .bind(&booking.internal_notes)
        .bind(booking.is_manual)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn update_booking(&self, booking_id: &str, update: &BookingUpdate) -> PortResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let mut booking = sqlx::query_as::<_, BookingRecord>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE booking_id = $1 FOR UPDATE"
        ))
        .bind(booking_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?
        .ok_or_else(|| PortError::NotFound(format!("booking {booking_id}")))?
        .to_domain()?;

        update.apply(&mut booking, Utc::now())?;
        sqlx::query(
            "UPDATE bookings SET first_name = $2, last_name = $3, check_in = $4, check_out = $5, \
             ota = $6, stay_total = $7, payment_status = $8, internal_notes = $9, updated_at = $10 \
             WHERE booking_id = $1",
        )
        .bind(booking_id)
        .bind(&booking.first_name)
        .bind(&booking.last_name)
        .bind(booking.check_in)
        .bind(booking.check_out)
        .bind(booking.ota.as_str())
        .bind(booking.stay_total)
        .bind(booking.payment_status.as_str())
        .bind(&booking.internal_notes)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;
        Ok(booking)
    }

    async fn set_document_status(
        &self,
        booking_id: &str,
        slot: DocumentSlot,
        present: bool,
    ) -> PortResult<Booking> {
        let column = slot_column(slot);
        sqlx::query_as::<_, BookingRecord>(&format!(
            "UPDATE bookings SET {column} = $2, updated_at = NOW() WHERE booking_id = $1 \
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking_id)
        .bind(present)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| PortError::NotFound(format!("booking {booking_id}")))?
        .to_domain()
    }

    async fn delete_booking(&self, booking_id: &str) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM bookings WHERE booking_id = $1")
            .bind(booking_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("booking {booking_id}")));
        }
        Ok(())
    }

    async fn list_invoices(&self) -> PortResult<Vec<PassiveInvoice>> {
        let rows = sqlx::query_as::<_, InvoiceRecord>(
            "SELECT id, supplier, issue_date, invoice_number, category, note, file_name, created_at \
             FROM passive_invoices ORDER BY issue_date DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        all_to_domain(rows, InvoiceRecord::to_domain)
    }

    async fn get_invoice(&self, invoice_id: &str) -> PortResult<PassiveInvoice> {
        sqlx::query_as::<_, InvoiceRecord>(
            "SELECT id, supplier, issue_date, invoice_number, category, note, file_name, created_at \
             FROM passive_invoices WHERE id = $1",
        )
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| PortError::NotFound(format!("invoice {invoice_id}")))?
        .to_domain()
    }

    async fn create_invoice(&self, invoice: PassiveInvoice) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO passive_invoices \
             (id, supplier, issue_date, invoice_number, category, note, file_name, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&invoice.id)
        .bind(&invoice.supplier)
        .bind(invoice.issue_date)
        .bind(&invoice.invoice_number)
        .bind(invoice.category.as_str())
        .bind(&invoice.note)
        .bind(&invoice.file_name)
        .bind(invoice.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn delete_invoice(&self, invoice_id: &str) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM passive_invoices WHERE id = $1")
            .bind(invoice_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("invoice {invoice_id}")));
        }
        Ok(())
    }

    async fn list_city_tax_files(&self, property: PropertyId, year: i32) -> PortResult<Vec<CityTaxFile>> {
        let rows = sqlx::query_as::<_, CityTaxRecord>(
            "SELECT id, property, year, quarter, file_name, uploaded_at FROM city_tax_files \
             WHERE property = $1 AND year = $2 ORDER BY uploaded_at DESC",
        )
        .bind(property.as_str())
        .bind(year)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        all_to_domain(rows, CityTaxRecord::to_domain)
    }

    async fn list_city_tax_files_by_property(&self, property: PropertyId) -> PortResult<Vec<CityTaxFile>> {
        let rows = sqlx::query_as::<_, CityTaxRecord>(
            "SELECT id, property, year, quarter, file_name, uploaded_at FROM city_tax_files \
             WHERE property = $1 ORDER BY year, quarter, uploaded_at",
        )
        .bind(property.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        all_to_domain(rows, CityTaxRecord::to_domain)
    }

    async fn get_city_tax_file(&self, file_id: &str) -> PortResult<CityTaxFile> {
        sqlx::query_as::<_, CityTaxRecord>(
            "SELECT id, property, year, quarter, file_name, uploaded_at FROM city_tax_files WHERE id = $1",
        )
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| PortError::NotFound(format!("tax file {file_id}")))?
        .to_domain()
    }

    async fn create_city_tax_file(&self, file: CityTaxFile) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO city_tax_files (id, property, year, quarter, file_name, uploaded_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&file.id)
        .bind(file.property.as_str())
        .bind(file.year)
        .bind(i16::from(file.quarter))
        .bind(&file.file_name)
        .bind(file.uploaded_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn delete_city_tax_file(&self, file_id: &str) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM city_tax_files WHERE id = $1")
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("tax file {file_id}")));
        }
        Ok(())
    }
}
