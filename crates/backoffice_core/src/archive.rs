//! crates/backoffice_core/src/archive.rs
//!
//! Packs the attachments of a set of records into a single ZIP archive.
//!
//! Fetches run one at a time, in check-in (or issue-date) order, so progress events
//! are strictly ordered. A slot flagged present whose blob cannot be fetched is
//! skipped without failing the job. The only job-level failures are the two
//! preconditions checked before any fetch: no record in range, and no attachment
//! among the records in range.

use bytes::Bytes;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use tracing::{debug, info};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::filter::DateRange;
use crate::ports::AttachmentStore;

/// Extension given to every archived attachment.
pub const ATTACHMENT_EXTENSION: &str = "pdf";

/// One named attachment position on a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentSlot {
    /// Blob store path.
    pub path: String,
    /// Display label; becomes the entry's file name.
    pub label: String,
    pub present: bool,
}

/// A record whose attachments can be archived.
pub trait ArchiveRecord {
    fn record_id(&self) -> &str;

    /// Date compared against the export range and used for ordering.
    fn archive_date(&self) -> NaiveDate;

    /// Folder holding the record's entries when it has more than one slot.
    fn folder_label(&self) -> String;

    /// Every slot, present or not, in a fixed order.
    fn attachment_slots(&self) -> Vec<AttachmentSlot>;
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("No records found between {} and {}", .0.start(), .0.end())]
    NothingInRange(DateRange),
    #[error("The records between {} and {} have no documents", .0.start(), .0.end())]
    NoAttachments(DateRange),
    #[error("File not found: {0}")]
    AttachmentMissing(String),
    #[error("Failed to build archive: {0}")]
    Archive(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExportProgress {
    pub completed: usize,
    pub total: usize,
}

/// A finished archive and the name to offer it under.
#[derive(Debug, Clone)]
pub struct ArchiveExport {
    pub file_name: String,
    pub bytes: Bytes,
    /// Entry paths in insertion order.
    pub entries: Vec<String>,
    pub progress: ExportProgress,
}

//=========================================================================================
// Archive Assembly
//=========================================================================================

/// Collects entries in memory; compression happens once, in [`ArchiveBuilder::finish`].
#[derive(Debug, Default)]
struct ArchiveBuilder {
    entries: Vec<(String, Bytes)>,
    names: HashSet<String>,
}

impl ArchiveBuilder {
    /// Adds `data` under `dir/stem.pdf`. A name already taken gets a `_2`, `_3`, ...
    /// suffix so that two guests with the same name keep separate files.
    fn insert(&mut self, dir: Option<&str>, stem: &str, data: Bytes) -> String {
        let prefix = dir
            .map(|d| format!("{}/", entry_segment(d, "record")))
            .unwrap_or_default();
        let stem = entry_segment(stem, "attachment");
        let mut name = format!("{prefix}{stem}.{ATTACHMENT_EXTENSION}");
        let mut n = 2;
        while self.names.contains(&name) {
            name = format!("{prefix}{stem}_{n}.{ATTACHMENT_EXTENSION}");
            n += 1;
        }
        self.names.insert(name.clone());
        self.entries.push((name.clone(), data));
        name
    }

    /// Compresses every entry into a ZIP container off the async executor.
    async fn finish(self, file_name: String, progress: ExportProgress) -> Result<ArchiveExport, ExportError> {
        let entries = self.entries;
        let (bytes, names) = tokio::task::spawn_blocking(move || write_zip(entries))
            .await
            .map_err(|e| ExportError::Archive(e.to_string()))??;

        info!(
            "Archive {} built: {} entries, {} bytes",
            file_name,
            names.len(),
            bytes.len()
        );
        Ok(ArchiveExport {
            file_name,
            bytes,
            entries: names,
            progress,
        })
    }
}

/// Turns free text into one archive path segment. Path separators and control
/// characters become `_`; a blank or dots-only result is replaced by `fallback`.
fn entry_segment(raw: &str, fallback: &str) -> String {
    let segment: String = raw
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    if segment.chars().all(|c| c == '.') {
        return fallback.to_string();
    }
    segment
}

/// The record's folder, or its id when the label yields no usable name.
fn record_folder<R: ArchiveRecord>(record: &R) -> String {
    let fallback = entry_segment(record.record_id(), "record");
    entry_segment(&record.folder_label(), &fallback)
}

fn write_zip(entries: Vec<(String, Bytes)>) -> Result<(Bytes, Vec<String>), ExportError> {
    let archive_err = |e: zip::result::ZipError| ExportError::Archive(e.to_string());
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut names = Vec::with_capacity(entries.len());
    for (name, data) in entries {
        writer.start_file(name.as_str(), options).map_err(archive_err)?;
        writer
            .write_all(&data)
            .map_err(|e| ExportError::Archive(e.to_string()))?;
        names.push(name);
    }
    let cursor = writer.finish().map_err(archive_err)?;
    Ok((Bytes::from(cursor.into_inner()), names))
}

/// Fetches a blob; any failure is reported as a miss.
async fn fetch(store: &dyn AttachmentStore, path: &str) -> Option<Bytes> {
    match store.get(path).await {
        Ok(found) => found,
        Err(e) => {
            debug!("Fetching {} failed, treating as missing: {:?}", path, e);
            None
        }
    }
}

//=========================================================================================
// Export Procedures
//=========================================================================================

/// Archives every present attachment of the `records` dated within `range`.
///
/// Records with a single slot become a top-level entry named after the slot label;
/// records with several slots get a folder named after [`ArchiveRecord::folder_label`].
/// `on_progress` is called after each successful fetch. The archive is named
/// `<scope>_<start>_<end>.zip`.
pub async fn export_range<R, F>(
    records: &[R],
    range: DateRange,
    store: &dyn AttachmentStore,
    scope: &str,
    mut on_progress: F,
) -> Result<ArchiveExport, ExportError>
where
    R: ArchiveRecord,
    F: FnMut(ExportProgress),
{
    let mut candidates: Vec<(&R, Vec<AttachmentSlot>)> = records
        .iter()
        .filter(|r| range.contains(r.archive_date()))
        .map(|r| (r, r.attachment_slots()))
        .collect();
    if candidates.is_empty() {
        return Err(ExportError::NothingInRange(range));
    }

    let total: usize = candidates
        .iter()
        .map(|(_, slots)| slots.iter().filter(|s| s.present).count())
        .sum();
    if total == 0 {
        return Err(ExportError::NoAttachments(range));
    }

    // Stable, so records sharing a date keep their input order.
    candidates.sort_by_key(|(r, _)| r.archive_date());
    info!(
        "Exporting {} attachments from {} records ({})",
        total,
        candidates.len(),
        scope
    );

    let mut builder = ArchiveBuilder::default();
    let mut completed = 0;
    for (record, slots) in &candidates {
        let folder = (slots.len() > 1).then(|| record_folder(*record));
        for slot in slots.iter().filter(|s| s.present) {
            let Some(data) = fetch(store, &slot.path).await else {
                debug!("Skipping missing attachment {} of {}", slot.path, record.record_id());
                continue;
            };
            builder.insert(folder.as_deref(), &slot.label, data);
            completed += 1;
            let progress = ExportProgress { completed, total };
            debug!("Export progress {}/{}", progress.completed, progress.total);
            on_progress(progress);
        }
    }

    builder
        .finish(format!("{scope}_{range}.zip"), ExportProgress { completed, total })
        .await
}

/// Archives the present attachments of one record into a single folder named after it.
/// The archive is named `<prefix>_<folder>.zip`.
pub async fn export_record<R: ArchiveRecord>(
    record: &R,
    store: &dyn AttachmentStore,
    prefix: &str,
) -> Result<ArchiveExport, ExportError> {
    let folder = record_folder(record);
    let present: Vec<AttachmentSlot> = record
        .attachment_slots()
        .into_iter()
        .filter(|s| s.present)
        .collect();
    let total = present.len();

    let mut builder = ArchiveBuilder::default();
    let mut completed = 0;
    for slot in &present {
        match fetch(store, &slot.path).await {
            Some(data) => {
                builder.insert(Some(&folder), &slot.label, data);
                completed += 1;
            }
            None => debug!("Skipping missing attachment {} of {}", slot.path, record.record_id()),
        }
    }

    builder
        .finish(format!("{prefix}_{folder}.zip"), ExportProgress { completed, total })
        .await
}

/// Fetches a single attachment for preview or download. Here a miss is an error,
/// since it is the only file the caller asked for.
pub async fn fetch_attachment(store: &dyn AttachmentStore, path: &str) -> Result<Bytes, ExportError> {
    fetch(store, path)
        .await
        .ok_or_else(|| ExportError::AttachmentMissing(path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::io::Read;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeStore {
        blobs: BTreeMap<String, Bytes>,
        failing: HashSet<String>,
        fetched: Mutex<Vec<String>>,
    }

    impl FakeStore {
        fn with(paths: &[&str]) -> Self {
            let mut store = Self::default();
            for path in paths {
                store
                    .blobs
                    .insert(path.to_string(), Bytes::from(format!("pdf:{path}")));
            }
            store
        }
    }

    #[async_trait]
    impl AttachmentStore for FakeStore {
        async fn put(&self, _: &str, _: Bytes, _: &str) -> PortResult<()> {
            unimplemented!()
        }

        async fn get(&self, path: &str) -> PortResult<Option<Bytes>> {
            self.fetched.lock().unwrap().push(path.to_string());
            if self.failing.contains(path) {
                return Err(PortError::Unexpected("unreachable".to_string()));
            }
            Ok(self.blobs.get(path).cloned())
        }

        async fn download_url(&self, _: &str) -> PortResult<Option<String>> {
            unimplemented!()
        }

        async fn delete(&self, _: &str) -> PortResult<()> {
            unimplemented!()
        }

        async fn list(&self, _: &str) -> PortResult<Vec<String>> {
            unimplemented!()
        }
    }

    struct Rec {
        id: &'static str,
        date: NaiveDate,
        folder: &'static str,
        slots: Vec<(&'static str, bool)>,
    }

    impl ArchiveRecord for Rec {
        fn record_id(&self) -> &str {
            self.id
        }

        fn archive_date(&self) -> NaiveDate {
            self.date
        }

        fn folder_label(&self) -> String {
            self.folder.to_string()
        }

        fn attachment_slots(&self) -> Vec<AttachmentSlot> {
            self.slots
                .iter()
                .map(|(label, present)| AttachmentSlot {
                    path: format!("{}/{}", self.id, label),
                    label: label.to_string(),
                    present: *present,
                })
                .collect()
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn january() -> DateRange {
        DateRange::new(date(2025, 1, 1), date(2025, 1, 31)).unwrap()
    }

    fn zip_names(bytes: &Bytes) -> Vec<String> {
        let archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
        let mut names: Vec<String> = archive.file_names().map(String::from).collect();
        names.sort();
        names
    }

    fn two_records() -> Vec<Rec> {
        vec![
            Rec {
                id: "feb",
                date: date(2025, 2, 1),
                folder: "Marco_Verdi",
                slots: vec![("A", true), ("B", true), ("C", true)],
            },
            Rec {
                id: "jan",
                date: date(2025, 1, 10),
                folder: "Anna_Rossi",
                slots: vec![("A", true), ("B", false), ("C", true)],
            },
        ]
    }

    #[tokio::test]
    async fn exports_only_records_in_range() {
        let store = FakeStore::with(&["jan/A", "jan/C", "feb/A", "feb/B", "feb/C"]);
        let mut events = Vec::new();
        let export = export_range(&two_records(), january(), &store, "Export_OMAIT", |p| events.push(p))
            .await
            .unwrap();

        assert_eq!(export.progress, ExportProgress { completed: 2, total: 2 });
        assert_eq!(
            events,
            vec![
                ExportProgress { completed: 1, total: 2 },
                ExportProgress { completed: 2, total: 2 },
            ]
        );
        assert_eq!(export.entries, vec!["Anna_Rossi/A.pdf", "Anna_Rossi/C.pdf"]);
        assert_eq!(zip_names(&export.bytes), vec!["Anna_Rossi/A.pdf", "Anna_Rossi/C.pdf"]);
        assert_eq!(export.file_name, "Export_OMAIT_2025-01-01_2025-01-31.zip");
    }

    #[tokio::test]
    async fn archive_contents_match_blobs() {
        let store = FakeStore::with(&["jan/A", "jan/C"]);
        let export = export_range(&two_records(), january(), &store, "X", |_| {})
            .await
            .unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(export.bytes.to_vec())).unwrap();
        let mut content = String::new();
        archive
            .by_name("Anna_Rossi/C.pdf")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "pdf:jan/C");
    }

    #[tokio::test]
    async fn empty_range_aborts_before_fetching() {
        let store = FakeStore::with(&["jan/A"]);
        let range = DateRange::new(date(2024, 1, 1), date(2024, 12, 31)).unwrap();
        let mut events = 0;
        let err = export_range(&two_records(), range, &store, "X", |_| events += 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::NothingInRange(_)));
        assert_eq!(events, 0);
        assert!(store.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn records_without_attachments_abort_distinctly() {
        let records = vec![Rec {
            id: "jan",
            date: date(2025, 1, 10),
            folder: "Anna_Rossi",
            slots: vec![("A", false), ("B", false)],
        }];
        let store = FakeStore::default();
        let err = export_range(&records, january(), &store, "X", |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::NoAttachments(_)));
        assert!(store.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn misses_and_failures_are_skipped_without_progress() {
        let mut store = FakeStore::with(&["jan/A", "feb/B"]);
        store.failing.insert("feb/B".to_string());
        let range = DateRange::new(date(2025, 1, 1), date(2025, 2, 28)).unwrap();
        let mut events = Vec::new();
        let export = export_range(&two_records(), range, &store, "X", |p| events.push(p))
            .await
            .unwrap();

        assert_eq!(export.progress, ExportProgress { completed: 1, total: 5 });
        assert_eq!(events, vec![ExportProgress { completed: 1, total: 5 }]);
        assert_eq!(export.entries, vec!["Anna_Rossi/A.pdf"]);
        // January is fetched first, then February in slot order.
        assert_eq!(
            *store.fetched.lock().unwrap(),
            vec!["jan/A", "jan/C", "feb/A", "feb/B", "feb/C"]
        );
    }

    #[tokio::test]
    async fn repeated_exports_yield_the_same_entries() {
        let store = FakeStore::with(&["jan/A", "jan/C", "feb/A"]);
        let range = DateRange::new(date(2025, 1, 1), date(2025, 3, 1)).unwrap();
        let first = export_range(&two_records(), range, &store, "X", |_| {}).await.unwrap();
        let second = export_range(&two_records(), range, &store, "X", |_| {}).await.unwrap();
        assert_eq!(zip_names(&first.bytes), zip_names(&second.bytes));
        assert_eq!(first.entries, second.entries);
    }

    #[tokio::test]
    async fn single_slot_records_are_flat_and_duplicates_are_suffixed() {
        let records = vec![
            Rec {
                id: "i1",
                date: date(2025, 1, 5),
                folder: "unused",
                slots: vec![("2025-01-05_Enel_E-1", true)],
            },
            Rec {
                id: "i2",
                date: date(2025, 1, 6),
                folder: "unused",
                slots: vec![("2025-01-05_Enel_E-1", true)],
            },
        ];
        let store = FakeStore::with(&["i1/2025-01-05_Enel_E-1", "i2/2025-01-05_Enel_E-1"]);
        let export = export_range(&records, january(), &store, "X", |_| {})
            .await
            .unwrap();
        assert_eq!(
            export.entries,
            vec!["2025-01-05_Enel_E-1.pdf", "2025-01-05_Enel_E-1_2.pdf"]
        );
    }

    #[tokio::test]
    async fn single_record_export_uses_one_folder() {
        let records = two_records();
        let store = FakeStore::with(&["feb/A", "feb/C"]);
        let export = export_record(&records[0], &store, "Scheda").await.unwrap();
        assert_eq!(export.file_name, "Scheda_Marco_Verdi.zip");
        assert_eq!(export.entries, vec!["Marco_Verdi/A.pdf", "Marco_Verdi/C.pdf"]);
        assert_eq!(export.progress, ExportProgress { completed: 2, total: 3 });
    }

    #[tokio::test]
    async fn unusable_folder_labels_never_escape_the_record_folder() {
        let records = vec![
            Rec {
                id: "jan",
                date: date(2025, 1, 10),
                folder: "",
                slots: vec![("A", true), ("B", true)],
            },
            Rec {
                id: "jan2",
                date: date(2025, 1, 11),
                folder: "Anna/../Rossi",
                slots: vec![("A/B", true), ("..", true)],
            },
        ];
        let store = FakeStore::with(&["jan/A", "jan/B", "jan2/A/B", "jan2/.."]);
        let export = export_range(&records, january(), &store, "X", |_| {})
            .await
            .unwrap();
        assert_eq!(
            export.entries,
            vec![
                "jan/A.pdf",
                "jan/B.pdf",
                "Anna_.._Rossi/A_B.pdf",
                "Anna_.._Rossi/attachment.pdf",
            ]
        );
        assert!(zip_names(&export.bytes)
            .iter()
            .all(|name| !name.starts_with('/') && name.matches('/').count() == 1));

        let single = export_record(&records[0], &store, "Scheda").await.unwrap();
        assert_eq!(single.file_name, "Scheda_jan.zip");
        assert_eq!(single.entries, vec!["jan/A.pdf", "jan/B.pdf"]);
    }

    #[test]
    fn entry_segments_are_single_and_non_blank() {
        assert_eq!(entry_segment("  Anna Rossi ", "x"), "Anna Rossi");
        assert_eq!(entry_segment("a/b\\c", "x"), "a_b_c");
        assert_eq!(entry_segment("   ", "x"), "x");
        assert_eq!(entry_segment("..", "x"), "x");
    }

    #[tokio::test]
    async fn sole_attachment_miss_is_an_error() {
        let store = FakeStore::with(&["jan/A"]);
        assert!(fetch_attachment(&store, "jan/A").await.is_ok());
        let err = fetch_attachment(&store, "jan/B").await.unwrap_err();
        assert!(matches!(err, ExportError::AttachmentMissing(path) if path == "jan/B"));
    }
}
