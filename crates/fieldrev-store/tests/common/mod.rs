//! Shared helpers for fieldrev-store integration tests

#![allow(dead_code)]

use fieldrev_core::blob_naming::content_hash;
use fieldrev_core::diff::{ChangeEntry, FileMeta, PropertyKey};
use fieldrev_core::ActingUser;
use fieldrev_store::{db, BlobStore};
use rusqlite::Connection;
use tempfile::TempDir;

pub struct TestEnv {
    pub conn: Connection,
    pub blobs: BlobStore,
    pub dir: TempDir,
}

/// On-disk database and blob root in a fresh temp dir
pub fn setup_test_env() -> TestEnv {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let conn = db::open_ledger(dir.path().join("vc.db")).expect("Failed to open ledger");
    let blobs = BlobStore::new(dir.path().join("files"));
    TestEnv { conn, blobs, dir }
}

pub fn admin() -> ActingUser {
    ActingUser::new(41, "admin")
}

pub fn text(field_id: i64, property: PropertyKey, value: &str) -> ChangeEntry {
    ChangeEntry::text(field_id, property, value)
}

pub fn upload(field_id: i64, index: usize, name: &str, bytes: &[u8]) -> ChangeEntry {
    ChangeEntry {
        field_id,
        property: PropertyKey::Index(index),
        value: format!(r#"{{"filename":"{}","description":"","modified":0,"created":0,"tags":""}}"#, name),
        file: Some(FileMeta {
            filename: name.to_string(),
            mime_type: "image/png".to_string(),
            size: bytes.len() as u64,
        }),
        blob: Some(bytes.to_vec()),
    }
}

pub fn png_name(bytes: &[u8]) -> String {
    format!("{}.png", content_hash(bytes))
}

pub fn table_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .expect("count query")
}
