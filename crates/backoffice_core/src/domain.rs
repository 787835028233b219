//! crates/backoffice_core/src/domain.rs
//!
//! Defines the pure, core data structures for the back-office.
//! These structs are independent of any database or storage backend; the serde
//! derives only fix the JSON shape the web layer exposes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

//=========================================================================================
// Labelled Enumerations
//=========================================================================================

/// Error returned when a stored or submitted label does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

/// Declares an enum whose variants map one-to-one onto fixed string labels, used both
/// as the serde representation and as the stored database value.
macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $label)] $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownLabel;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    _ => Err(UnknownLabel { kind: $kind, value: s.to_string() }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

labelled_enum! {
    /// One of the two managed properties.
    PropertyId ("property") {
        Omait => "omait",
        Cb => "cb",
    }
}

labelled_enum! {
    /// The channel a booking arrived through.
    Ota ("booking channel") {
        Amenitiz => "Amenitiz",
        Booking => "Booking",
        Airbnb => "Airbnb",
        Expedia => "Expedia",
        Phone => "Telefono",
        Other => "Altro",
    }
}

labelled_enum! {
    PaymentStatus ("payment status") {
        Paid => "Pagato",
        Pending => "In sospeso",
        Refunded => "Rimborsato",
    }
}

labelled_enum! {
    /// Supplier invoice categories.
    InvoiceCategory ("invoice category") {
        Purchases => "Acquisti Vari",
        OtaCommissions => "Commissioni OTA",
        Laundry => "Lavanderia",
        Utilities => "Utenze",
        Maintenance => "Manutenzione",
        Other => "Altro",
    }
}

labelled_enum! {
    /// A compliance document slot on a booking. `ALL` is the fixed slot order used
    /// wherever slots are enumerated (listing, export, overview).
    DocumentSlot ("document slot") {
        BookingDetails => "dettagli_prenotazione",
        GuestDocuments => "dettagli_ospiti",
        AccommodationReceipt => "ricevuta_alloggiati",
        OtaInvoice => "fattura_ota",
        StayInvoice => "fattura_soggiorno",
    }
}

impl PropertyId {
    /// Upper-case code used in archive names, e.g. `OMAIT`.
    pub fn code(&self) -> String {
        self.as_str().to_uppercase()
    }
}

impl DocumentSlot {
    /// Human-readable label of the slot. The `cb` property issues a receipt
    /// rather than an invoice for the stay.
    pub fn label(&self, property: PropertyId) -> &'static str {
        match (self, property) {
            (DocumentSlot::BookingDetails, _) => "Dettagli Prenotazione",
            (DocumentSlot::GuestDocuments, _) => "Documenti Ospiti",
            (DocumentSlot::AccommodationReceipt, _) => "Ricevuta Alloggiati",
            (DocumentSlot::OtaInvoice, _) => "Fattura OTA",
            (DocumentSlot::StayInvoice, PropertyId::Cb) => "Ricevuta Soggiorno",
            (DocumentSlot::StayInvoice, PropertyId::Omait) => "Fattura Soggiorno",
        }
    }
}

//=========================================================================================
// Bookings
//=========================================================================================

/// Presence flags for the five document slots of a booking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStatus {
    #[serde(default)]
    pub booking_details: bool,
    #[serde(default)]
    pub guest_documents: bool,
    #[serde(default)]
    pub accommodation_receipt: bool,
    #[serde(default)]
    pub ota_invoice: bool,
    #[serde(default)]
    pub stay_invoice: bool,
}

impl DocumentStatus {
    pub fn get(&self, slot: DocumentSlot) -> bool {
        match slot {
            DocumentSlot::BookingDetails => self.booking_details,
            DocumentSlot::GuestDocuments => self.guest_documents,
            DocumentSlot::AccommodationReceipt => self.accommodation_receipt,
            DocumentSlot::OtaInvoice => self.ota_invoice,
            DocumentSlot::StayInvoice => self.stay_invoice,
        }
    }

    pub fn set(&mut self, slot: DocumentSlot, present: bool) {
        let flag = match slot {
            DocumentSlot::BookingDetails => &mut self.booking_details,
            DocumentSlot::GuestDocuments => &mut self.guest_documents,
            DocumentSlot::AccommodationReceipt => &mut self.accommodation_receipt,
            DocumentSlot::OtaInvoice => &mut self.ota_invoice,
            DocumentSlot::StayInvoice => &mut self.stay_invoice,
        };
        *flag = present;
    }

    /// Number of slots currently holding a document.
    pub fn present_count(&self) -> usize {
        DocumentSlot::ALL.iter().filter(|slot| self.get(**slot)).count()
    }

    pub fn is_complete(&self) -> bool {
        self.present_count() == DocumentSlot::ALL.len()
    }
}

/// A guest stay at one of the properties, with its compliance documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: String,
    pub property: PropertyId,
    pub first_name: String,
    pub last_name: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub ota: Ota,
    pub stay_total: f64,
    pub payment_status: PaymentStatus,
    pub documents: DocumentStatus,
    pub internal_notes: String,
    pub is_manual: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Folder name for the guest's documents: first and last name with every
    /// whitespace run collapsed to a single underscore.
    pub fn guest_folder(&self) -> String {
        join_words(&[&self.first_name, &self.last_name], "_")
    }

    /// Both names present and a stay that does not end before it starts.
    pub fn validate(&self) -> Result<(), InvalidBooking> {
        if self.first_name.trim().is_empty() {
            return Err(InvalidBooking::MissingField("first_name"));
        }
        if self.last_name.trim().is_empty() {
            return Err(InvalidBooking::MissingField("last_name"));
        }
        if self.check_out < self.check_in {
            return Err(InvalidBooking::CheckOutBeforeCheckIn);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidBooking {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("check_out is before check_in")]
    CheckOutBeforeCheckIn,
}

/// Input for a manually entered booking.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub property: PropertyId,
    pub first_name: String,
    pub last_name: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(default = "default_manual_ota")]
    pub ota: Ota,
    #[serde(default)]
    pub stay_total: f64,
    #[serde(default = "default_payment_status")]
    pub payment_status: PaymentStatus,
}

fn default_manual_ota() -> Ota {
    Ota::Phone
}

fn default_payment_status() -> PaymentStatus {
    PaymentStatus::Pending
}

impl NewBooking {
    /// Builds the stored booking: every slot absent, no notes, flagged as manual.
    pub fn into_booking(self, booking_id: String, now: DateTime<Utc>) -> Booking {
        Booking {
            booking_id,
            property: self.property,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            check_in: self.check_in,
            check_out: self.check_out,
            ota: self.ota,
            stay_total: self.stay_total,
            payment_status: self.payment_status,
            documents: DocumentStatus::default(),
            internal_notes: String::new(),
            is_manual: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A merge-update: only the fields that are `Some` replace the stored values.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookingUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub ota: Option<Ota>,
    pub stay_total: Option<f64>,
    pub payment_status: Option<PaymentStatus>,
    pub internal_notes: Option<String>,
}

impl BookingUpdate {
    pub fn notes(notes: impl Into<String>) -> Self {
        Self {
            internal_notes: Some(notes.into()),
            ..Self::default()
        }
    }

    /// Merges into `booking`. The result must pass [`Booking::validate`]; otherwise
    /// `booking` is left untouched.
    pub fn apply(&self, booking: &mut Booking, now: DateTime<Utc>) -> Result<(), InvalidBooking> {
        let mut merged = booking.clone();
        self.merge(&mut merged);
        merged.validate()?;
        merged.updated_at = now;
        *booking = merged;
        Ok(())
    }

    fn merge(&self, booking: &mut Booking) {
        if let Some(first_name) = &self.first_name {
            booking.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = &self.last_name {
            booking.last_name = last_name.trim().to_string();
        }
        if let Some(check_in) = self.check_in {
            booking.check_in = check_in;
        }
        if let Some(check_out) = self.check_out {
            booking.check_out = check_out;
        }
        if let Some(ota) = self.ota {
            booking.ota = ota;
        }
        if let Some(stay_total) = self.stay_total {
            booking.stay_total = stay_total;
        }
        if let Some(payment_status) = self.payment_status {
            booking.payment_status = payment_status;
        }
        if let Some(notes) = &self.internal_notes {
            booking.internal_notes = notes.clone();
        }
    }
}

//=========================================================================================
// Supplier Invoices
//=========================================================================================

/// A supplier ("passive") invoice with its single PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassiveInvoice {
    pub id: String,
    pub supplier: String,
    pub issue_date: NaiveDate,
    pub invoice_number: String,
    pub category: InvoiceCategory,
    pub note: Option<String>,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
}

impl PassiveInvoice {
    /// Download name: `<date>_<Supplier_Name>_<number>` with path separators in the
    /// number replaced by dashes.
    pub fn download_stem(&self) -> String {
        let supplier = join_words(&[&self.supplier], "_");
        let number = self.invoice_number.replace(['/', '\\'], "-");
        format!("{}_{}_{}", self.issue_date, supplier, number)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInvoice {
    pub supplier: String,
    pub issue_date: NaiveDate,
    pub invoice_number: String,
    pub category: InvoiceCategory,
    pub note: Option<String>,
}

//=========================================================================================
// Tourist-Tax Filings
//=========================================================================================

/// A document filed for one quarter of the tourist tax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityTaxFile {
    pub id: String,
    pub property: PropertyId,
    pub year: i32,
    pub quarter: u8,
    pub file_name: String,
    pub uploaded_at: DateTime<Utc>,
}

impl CityTaxFile {
    /// First day of the filing's quarter; the date used for range filtering.
    pub fn period_start(&self) -> NaiveDate {
        quarter_start(self.year, self.quarter).unwrap_or(NaiveDate::MIN)
    }
}

/// First day of `quarter` (1-4) in `year`, or `None` for an invalid quarter.
pub fn quarter_start(year: i32, quarter: u8) -> Option<NaiveDate> {
    if !(1..=4).contains(&quarter) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, u32::from(quarter - 1) * 3 + 1, 1)
}

//=========================================================================================
// Overview
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyOverview {
    pub property: PropertyId,
    pub total: usize,
    /// Bookings with at least one absent document slot.
    pub pending: usize,
}

/// Landing-page statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub properties: Vec<PropertyOverview>,
    pub invoice_count: usize,
    pub recent_invoices: Vec<PassiveInvoice>,
}

impl Overview {
    /// `invoices` is expected newest first, as the record store returns them.
    pub fn compute(bookings: &[Booking], invoices: &[PassiveInvoice]) -> Self {
        let properties = PropertyId::ALL
            .iter()
            .map(|property| {
                let of_property = bookings.iter().filter(|b| b.property == *property);
                PropertyOverview {
                    property: *property,
                    total: of_property.clone().count(),
                    pending: of_property.filter(|b| !b.documents.is_complete()).count(),
                }
            })
            .collect();

        Self {
            properties,
            invoice_count: invoices.len(),
            recent_invoices: invoices.iter().take(3).cloned().collect(),
        }
    }
}

/// Joins the whitespace-separated words of `parts` with `separator`.
pub fn join_words(parts: &[&str], separator: &str) -> String {
    parts
        .iter()
        .flat_map(|part| part.split_whitespace())
        .collect::<Vec<_>>()
        .join(separator)
}
