//! Shared fixtures for fieldrev-engine integration tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use fieldrev_core::{
    ActingUser, FieldDef, FieldId, FieldKind, FieldValue, FileItem, LanguageValues, Record,
    RecordId, TemplateId, TrackingConfig,
};
use fieldrev_engine::{Clock, HostAccessor};
use fieldrev_store::{db, BlobStore};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use tempfile::TempDir;

pub const BASIC_PAGE: TemplateId = 29;
pub const REPEATER_ITEM: TemplateId = 44;
pub const UNTRACKED: TemplateId = 50;

pub const TITLE: FieldId = 1;
pub const SUMMARY: FieldId = 2;
pub const TAGS: FieldId = 3;
pub const IMAGES: FieldId = 4;
pub const BODY: FieldId = 76;
pub const CHECKBOX: FieldId = 98;
/// Present on the template but never tracked
pub const SIDEBAR: FieldId = 120;

pub const FINNISH: i64 = 1010;

/// In-memory host schema
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    pub fields: BTreeMap<FieldId, FieldDef>,
    pub templates: BTreeMap<TemplateId, Vec<FieldId>>,
    pub records: BTreeMap<TemplateId, Vec<RecordId>>,
    /// (record, field, filename) -> bytes the host holds on disk
    pub files: BTreeMap<(RecordId, FieldId, String), Vec<u8>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        let mut host = Self::default();
        for def in [
            FieldDef::new(TITLE, "title", FieldKind::Scalar),
            FieldDef::new(SUMMARY, "summary", FieldKind::MultiLanguage),
            FieldDef::new(TAGS, "tags", FieldKind::MultiValue),
            FieldDef::new(IMAGES, "images", FieldKind::File),
            FieldDef::new(BODY, "body", FieldKind::Scalar),
            FieldDef::new(CHECKBOX, "checkbox", FieldKind::Scalar),
            FieldDef::new(SIDEBAR, "sidebar", FieldKind::Scalar),
        ] {
            host.fields.insert(def.id, def);
        }
        host.templates.insert(
            BASIC_PAGE,
            vec![TITLE, SUMMARY, TAGS, IMAGES, BODY, CHECKBOX, SIDEBAR],
        );
        host.templates.insert(REPEATER_ITEM, vec![TITLE, BODY]);
        host.templates.insert(UNTRACKED, vec![TITLE, BODY]);
        host
    }

    pub fn with_records(mut self, template_id: TemplateId, ids: &[RecordId]) -> Self {
        self.records.insert(template_id, ids.to_vec());
        self
    }

    pub fn without_field(mut self, template_id: TemplateId, field_id: FieldId) -> Self {
        if let Some(fields) = self.templates.get_mut(&template_id) {
            fields.retain(|f| *f != field_id);
        }
        self
    }
}

impl HostAccessor for MemoryHost {
    fn field(&self, field_id: FieldId) -> Option<FieldDef> {
        self.fields.get(&field_id).cloned()
    }

    fn template_fields(&self, template_id: TemplateId) -> Option<Vec<FieldId>> {
        self.templates.get(&template_id).cloned()
    }

    fn records_using_template(&self, template_id: TemplateId) -> Vec<RecordId> {
        self.records.get(&template_id).cloned().unwrap_or_default()
    }

    fn file_bytes(&self, record_id: RecordId, field_id: FieldId, filename: &str) -> Option<Vec<u8>> {
        self.files
            .get(&(record_id, field_id, filename.to_string()))
            .cloned()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub fn at(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    pub fn advance(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.millis())
            .single()
            .expect("valid test timestamp")
    }
}

pub struct TestEnv {
    pub conn: Connection,
    pub blobs: BlobStore,
    pub host: MemoryHost,
    pub config: TrackingConfig,
    pub clock: FixedClock,
    pub dir: TempDir,
}

impl TestEnv {
    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("vc.db")
    }

    /// A second connection to the same database, as another request would have
    pub fn open_connection(&self) -> Connection {
        open_connection(&self.db_path())
    }
}

pub fn open_connection(path: &Path) -> Connection {
    let conn = db::open(path).expect("Failed to open db");
    db::configure(&conn).expect("Failed to configure db");
    conn
}

/// Default tracking: basic-page and repeater items, every field but sidebar
pub fn tracking_config() -> TrackingConfig {
    TrackingConfig::new()
        .track_template(BASIC_PAGE)
        .track_template(REPEATER_ITEM)
        .track_fields([TITLE, SUMMARY, TAGS, IMAGES, BODY, CHECKBOX])
}

pub fn setup_test_env() -> TestEnv {
    setup_test_env_with(tracking_config())
}

pub fn setup_test_env_with(config: TrackingConfig) -> TestEnv {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let conn = db::open_ledger(dir.path().join("vc.db")).expect("Failed to open ledger");
    let blobs = BlobStore::new(dir.path().join("files"));
    TestEnv {
        conn,
        blobs,
        host: MemoryHost::new(),
        config,
        clock: FixedClock::at(1_767_225_600_000),
        dir,
    }
}

pub fn admin() -> ActingUser {
    ActingUser::new(41, "admin")
}

pub fn page(id: RecordId) -> Record {
    Record::new(id, BASIC_PAGE)
}

pub fn set_text(record: &mut Record, field_id: FieldId, value: &str) {
    record.set(field_id, FieldValue::scalar(value));
}

pub fn summary(default: &str, finnish: &str) -> FieldValue {
    FieldValue::MultiLanguage(LanguageValues::new(default).with_translation(FINNISH, finnish))
}

pub fn tags(values: &[&str]) -> FieldValue {
    FieldValue::MultiValue(values.iter().map(|v| v.to_string()).collect())
}

pub fn png(name: &str, bytes: &[u8]) -> FileItem {
    FileItem::upload(name, bytes.to_vec(), "image/png")
}

pub fn table_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .expect("count query")
}

pub fn data_rows_for(conn: &Connection, record_id: RecordId) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM data d JOIN revisions r ON r.id = d.revision_id
         WHERE r.owning_record_id = ?1",
        [record_id],
        |row| row.get(0),
    )
    .expect("count query")
}
