//! crates/backoffice_core/src/filter.rs
//!
//! Record-filtering predicates shared by the listing screens and the archive export.

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::fmt;

use crate::domain::{Booking, InvoiceCategory, Ota, PassiveInvoice};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("range start {start} is after its end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("'{0}' is not a date in YYYY-MM-DD form")]
    InvalidDate(String),
}

/// A closed date interval; both ends are included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, FilterError> {
        if start > end {
            return Err(FilterError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parses two `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, FilterError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Formats as `<start>_<end>`, the form used in archive file names.
impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.start, self.end)
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, FilterError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| FilterError::InvalidDate(value.to_string()))
}

fn matches_period(date: NaiveDate, year: Option<i32>, month: Option<u32>) -> bool {
    year.map_or(true, |y| date.year() == y) && month.map_or(true, |m| date.month() == m)
}

/// Booking list filters. Every criterion left empty matches everything.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookingFilter {
    /// Case-insensitive substring of "first last".
    pub search: String,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub ota: Option<Ota>,
    pub incomplete_only: bool,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        let full_name = format!("{} {}", booking.first_name, booking.last_name).to_lowercase();
        full_name.contains(&self.search.to_lowercase())
            && self.ota.map_or(true, |ota| booking.ota == ota)
            && matches_period(booking.check_in, self.year, self.month)
            && (!self.incomplete_only || !booking.documents.is_complete())
    }

    /// Keeps the matching bookings, ordered by check-in.
    pub fn apply(&self, bookings: Vec<Booking>) -> Vec<Booking> {
        let mut kept: Vec<Booking> = bookings.into_iter().filter(|b| self.matches(b)).collect();
        kept.sort_by_key(|b| b.check_in);
        kept
    }
}

/// Invoice list filters. Every criterion left empty matches everything.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InvoiceFilter {
    /// Case-insensitive substring of the supplier name.
    pub search: String,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub category: Option<InvoiceCategory>,
}

impl InvoiceFilter {
    pub fn matches(&self, invoice: &PassiveInvoice) -> bool {
        invoice
            .supplier
            .to_lowercase()
            .contains(&self.search.to_lowercase())
            && self.category.map_or(true, |c| invoice.category == c)
            && matches_period(invoice.issue_date, self.year, self.month)
    }

    /// Keeps the matching invoices in their given order.
    pub fn apply(&self, invoices: Vec<PassiveInvoice>) -> Vec<PassiveInvoice> {
        invoices.into_iter().filter(|i| self.matches(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentSlot, DocumentStatus, PaymentStatus, PropertyId};
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn booking(id: &str, first: &str, check_in: NaiveDate, ota: Ota) -> Booking {
        Booking {
            booking_id: id.to_string(),
            property: PropertyId::Omait,
            first_name: first.to_string(),
            last_name: "Rossi".to_string(),
            check_in,
            check_out: check_in,
            ota,
            stay_total: 0.0,
            payment_status: PaymentStatus::Paid,
            documents: DocumentStatus::default(),
            internal_notes: String::new(),
            is_manual: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn range_includes_both_ends() {
        let range = DateRange::new(date(2025, 1, 1), date(2025, 1, 31)).unwrap();
        assert!(range.contains(date(2025, 1, 1)));
        assert!(range.contains(date(2025, 1, 31)));
        assert!(!range.contains(date(2024, 12, 31)));
        assert!(!range.contains(date(2025, 2, 1)));
    }

    #[test]
    fn reversed_range_is_rejected() {
        let err = DateRange::new(date(2025, 2, 1), date(2025, 1, 1)).unwrap_err();
        assert!(matches!(err, FilterError::InvalidRange { .. }));
    }

    #[test]
    fn range_parses_and_formats() {
        let range = DateRange::parse("2025-01-01", " 2025-03-31").unwrap();
        assert_eq!(range.to_string(), "2025-01-01_2025-03-31");
        assert_eq!(
            DateRange::parse("2025-13-01", "2025-03-31").unwrap_err(),
            FilterError::InvalidDate("2025-13-01".to_string())
        );
    }

    #[test]
    fn booking_filter_combines_criteria_and_sorts() {
        let mut complete = booking("3", "Anna", date(2025, 1, 5), Ota::Airbnb);
        for slot in DocumentSlot::ALL {
            complete.documents.set(*slot, true);
        }
        let bookings = vec![
            booking("1", "Giulia", date(2025, 1, 22), Ota::Airbnb),
            booking("2", "Marco", date(2025, 2, 5), Ota::Airbnb),
            complete,
            booking("4", "Luca", date(2025, 1, 12), Ota::Booking),
        ];

        let filter = BookingFilter {
            month: Some(1),
            ota: Some(Ota::Airbnb),
            ..BookingFilter::default()
        };
        let ids: Vec<_> = filter
            .apply(bookings.clone())
            .into_iter()
            .map(|b| b.booking_id)
            .collect();
        assert_eq!(ids, vec!["3", "1"]);

        let filter = BookingFilter {
            search: "ANNA ROS".to_string(),
            incomplete_only: true,
            ..BookingFilter::default()
        };
        assert!(filter.apply(bookings).is_empty());
    }

    #[test]
    fn invoice_filter_matches_supplier_and_category() {
        let invoice = PassiveInvoice {
            id: "INV-1".to_string(),
            supplier: "Enel Energia".to_string(),
            issue_date: date(2025, 2, 5),
            invoice_number: "E-1".to_string(),
            category: InvoiceCategory::Utilities,
            note: None,
            file_name: "enel.pdf".to_string(),
            created_at: Utc::now(),
        };
        let by_search = InvoiceFilter {
            search: "enel".to_string(),
            year: Some(2025),
            ..InvoiceFilter::default()
        };
        assert!(by_search.matches(&invoice));
        let by_category = InvoiceFilter {
            category: Some(InvoiceCategory::Laundry),
            ..InvoiceFilter::default()
        };
        assert!(!by_category.matches(&invoice));
    }
}
