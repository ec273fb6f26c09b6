// Integration tests for the revision ledger

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{admin, png_name, setup_test_env, table_count, text, upload};
use fieldrev_core::diff::PropertyKey;
use fieldrev_core::{EmptyRevisionPolicy, ExErrorKind};
use fieldrev_store::ledger::{self, CleanupOutcome};
use fieldrev_store::{db, integrity};
use std::time::Duration;

#[test]
fn test_append_and_read_back_in_order() {
    // Given: two revisions of one record
    let mut env = setup_test_env();
    let tx = db::write_transaction(&mut env.conn).unwrap();
    let r1 = ledger::append_revision(
        &tx,
        &env.blobs,
        1001,
        &admin(),
        1_000,
        &[text(1, PropertyKey::Data, "a test page")],
    )
    .unwrap();
    let r2 = ledger::append_revision(
        &tx,
        &env.blobs,
        1001,
        &admin(),
        2_000,
        &[
            text(1, PropertyKey::Data, "edited"),
            text(76, PropertyKey::Data, "body"),
            text(98, PropertyKey::Data, "1"),
        ],
    )
    .unwrap();
    tx.commit().unwrap();

    // Then: rows come back in ledger order and can be cut at a revision
    let all = ledger::data_as_of(&env.conn, 1001, None, None).unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].revision_id, r1.revision_id);
    assert_eq!(all[3].revision_id, r2.revision_id);

    let first = ledger::data_as_of(&env.conn, 1001, None, Some(r1.revision_id)).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].value, "a test page");

    let title = ledger::data_as_of(&env.conn, 1001, Some(1), None).unwrap();
    assert_eq!(title.len(), 2);

    assert_eq!(ledger::count_revisions(&env.conn, 1001).unwrap(), 2);
    assert_eq!(ledger::count_data_rows(&env.conn, 1001).unwrap(), 4);
    assert_eq!(
        ledger::revision_number(&env.conn, 1001).unwrap(),
        Some(r2.revision_id)
    );
}

#[test]
fn test_failed_append_leaves_nothing_behind() {
    // Given: an append whose second entry violates the unique property rule
    let mut env = setup_test_env();
    let tx = db::write_transaction(&mut env.conn).unwrap();
    let err = ledger::append_revision(
        &tx,
        &env.blobs,
        1001,
        &admin(),
        1_000,
        &[
            text(1, PropertyKey::Data, "a"),
            text(1, PropertyKey::Data, "b"),
        ],
    )
    .unwrap_err();
    drop(tx);

    // Then: the error is a storage failure and no rows are visible
    assert_eq!(err.kind(), ExErrorKind::StorageFailure);
    assert_eq!(table_count(&env.conn, "revisions"), 0);
    assert_eq!(table_count(&env.conn, "data"), 0);
}

#[test]
fn test_latest_revision_at_and_before() {
    let mut env = setup_test_env();
    let tx = db::write_transaction(&mut env.conn).unwrap();
    let mut ids = Vec::new();
    for (i, at) in [1_000, 2_000, 2_000, 3_000].iter().enumerate() {
        let outcome = ledger::append_revision(
            &tx,
            &env.blobs,
            1001,
            &admin(),
            *at,
            &[text(1, PropertyKey::Data, &format!("v{}", i))],
        )
        .unwrap();
        ids.push(outcome.revision_id);
    }
    tx.commit().unwrap();

    assert!(ledger::latest_revision_at(&env.conn, 1001, 999).unwrap().is_none());
    // ties on created_at go to the highest id
    let at_2000 = ledger::latest_revision_at(&env.conn, 1001, 2_500).unwrap().unwrap();
    assert_eq!(at_2000.id, ids[2]);

    let before = ledger::revision_before(&env.conn, &at_2000).unwrap().unwrap();
    assert_eq!(before.id, ids[1]);
    let first = ledger::revision_by_id(&env.conn, ids[0]).unwrap().unwrap();
    assert!(ledger::revision_before(&env.conn, &first).unwrap().is_none());
}

#[test]
fn test_history_newest_first() {
    let mut env = setup_test_env();
    let tx = db::write_transaction(&mut env.conn).unwrap();
    ledger::append_revision(&tx, &env.blobs, 1001, &admin(), 1, &[text(1, PropertyKey::Data, "a")])
        .unwrap();
    ledger::append_revision(
        &tx,
        &env.blobs,
        1001,
        &admin(),
        2,
        &[text(98, PropertyKey::Data, "1"), text(76, PropertyKey::Data, "b")],
    )
    .unwrap();
    tx.commit().unwrap();

    let history = ledger::history(&env.conn, 1001).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].field_ids, vec![76, 98]);
    assert_eq!(history[1].field_ids, vec![1]);
    assert_eq!(history[0].revision.username, "admin");
}

#[test]
fn test_duplicate_image_gets_two_files_rows() {
    // Given: the same bytes uploaded twice into one field under suffixed names
    let mut env = setup_test_env();
    let bytes = b"\x89PNG same image";
    let name = png_name(bytes);
    let suffixed = name.replace(".png", "-1.png");

    let tx = db::write_transaction(&mut env.conn).unwrap();
    let outcome = ledger::append_revision(
        &tx,
        &env.blobs,
        1001,
        &admin(),
        1,
        &[upload(99, 0, &name, bytes), upload(99, 1, &suffixed, bytes)],
    )
    .unwrap();
    tx.commit().unwrap();

    // Then: 2 data rows, 2 files rows, each referenced once
    assert_eq!(outcome.data_rows, 2);
    assert_eq!(outcome.files_created, 2);
    assert_eq!(table_count(&env.conn, "files"), 2);
    assert_eq!(table_count(&env.conn, "data_files"), 2);
    assert!(env.blobs.exists(&name));
    assert!(env.blobs.exists(&suffixed));

    let rows = ledger::data_as_of(&env.conn, 1001, Some(99), None).unwrap();
    assert_eq!(rows[1].file.as_ref().unwrap().filename, suffixed);
}

#[test]
fn test_delete_record_purges_unshared_blobs() {
    // Given: two records, one image shared between them and one private
    let mut env = setup_test_env();
    let shared = b"shared";
    let private = b"private";

    let tx = db::write_transaction(&mut env.conn).unwrap();
    ledger::append_revision(
        &tx,
        &env.blobs,
        1001,
        &admin(),
        1,
        &[
            upload(99, 0, &png_name(shared), shared),
            upload(99, 1, &png_name(private), private),
        ],
    )
    .unwrap();
    ledger::append_revision(
        &tx,
        &env.blobs,
        1002,
        &admin(),
        2,
        &[upload(99, 0, &png_name(shared), shared)],
    )
    .unwrap();
    tx.commit().unwrap();

    // When: the first record's history is deleted and blobs purged after commit
    let tx = db::write_transaction(&mut env.conn).unwrap();
    let outcome = ledger::delete_revisions_for_record(&tx, 1001).unwrap();
    tx.commit().unwrap();
    let removed = ledger::purge_blobs(&mut env.conn, &env.blobs, &outcome.orphaned_files).unwrap();

    // Then: only the private blob is gone
    assert_eq!(outcome.revisions_deleted, 1);
    assert_eq!(outcome.rows_deleted, 2);
    assert_eq!(outcome.orphaned_files, vec![png_name(private)]);
    assert_eq!(removed, 1);
    assert!(env.blobs.exists(&png_name(shared)));
    assert!(!env.blobs.exists(&png_name(private)));
    assert!(integrity::check_with_blobs(&env.conn, &env.blobs)
        .unwrap()
        .is_clean());
}

#[test]
fn test_data_as_of_follows_ledger_order_under_clock_skew() {
    // Given: a later revision stamped before an earlier one
    let mut env = setup_test_env();
    let tx = db::write_transaction(&mut env.conn).unwrap();
    let first = ledger::append_revision(
        &tx,
        &env.blobs,
        1001,
        &admin(),
        2_000,
        &[text(1, PropertyKey::Data, "stamped late")],
    )
    .unwrap();
    let second = ledger::append_revision(
        &tx,
        &env.blobs,
        1001,
        &admin(),
        1_000,
        &[text(1, PropertyKey::Data, "stamped early")],
    )
    .unwrap();
    tx.commit().unwrap();

    // When: reading up to the early-stamped revision
    let rows = ledger::data_as_of(&env.conn, 1001, None, Some(second.revision_id)).unwrap();

    // Then: the late-stamped revision is not folded in
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].revision_id, second.revision_id);

    // Then: reading up to the late-stamped one returns both in ledger order
    let rows = ledger::data_as_of(&env.conn, 1001, None, Some(first.revision_id)).unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r.revision_id).collect();
    assert_eq!(ids, vec![second.revision_id, first.revision_id]);
}

/// One image on record 1001, then its history deleted
fn orphaned_image(env: &mut common::TestEnv, bytes: &[u8]) -> CleanupOutcome {
    let tx = db::write_transaction(&mut env.conn).unwrap();
    ledger::append_revision(
        &tx,
        &env.blobs,
        1001,
        &admin(),
        1,
        &[upload(99, 0, &png_name(bytes), bytes)],
    )
    .unwrap();
    tx.commit().unwrap();

    let tx = db::write_transaction(&mut env.conn).unwrap();
    let outcome = ledger::delete_revisions_for_record(&tx, 1001).unwrap();
    tx.commit().unwrap();
    outcome
}

#[test]
fn test_purge_serializes_with_open_writer() {
    // Given: an orphaned blob and another connection linking the same name
    let mut env = setup_test_env();
    let bytes = b"contended image";
    let name = png_name(bytes);
    let outcome = orphaned_image(&mut env, bytes);
    assert_eq!(outcome.orphaned_files, vec![name.clone()]);

    let mut other = db::open_ledger(env.dir.path().join("vc.db")).unwrap();
    let other_tx = db::write_transaction(&mut other).unwrap();
    ledger::append_revision(
        &other_tx,
        &env.blobs,
        1002,
        &admin(),
        2,
        &[upload(99, 0, &name, bytes)],
    )
    .unwrap();

    // When: purging while that writer is still open
    env.conn.busy_timeout(Duration::from_millis(50)).unwrap();
    let err = ledger::purge_blobs(&mut env.conn, &env.blobs, &outcome.orphaned_files)
        .unwrap_err();

    // Then: the purge gives up and the blob stays
    assert_eq!(err.kind(), ExErrorKind::StorageFailure);
    assert!(env.blobs.exists(&name));

    // When: the writer commits and the purge is retried
    other_tx.commit().unwrap();
    let removed = ledger::purge_blobs(&mut env.conn, &env.blobs, &outcome.orphaned_files).unwrap();

    // Then: the referenced blob is kept
    assert_eq!(removed, 0);
    assert!(env.blobs.exists(&name));
    assert!(integrity::check_with_blobs(&env.conn, &env.blobs)
        .unwrap()
        .is_clean());
}

#[test]
fn test_append_after_purge_writes_blob_again() {
    // Given: a blob purged after its history was deleted
    let mut env = setup_test_env();
    let bytes = b"purged image";
    let name = png_name(bytes);
    let outcome = orphaned_image(&mut env, bytes);
    let removed = ledger::purge_blobs(&mut env.conn, &env.blobs, &outcome.orphaned_files).unwrap();
    assert_eq!(removed, 1);
    assert!(!env.blobs.exists(&name));

    // When: another record uploads the same bytes
    let tx = db::write_transaction(&mut env.conn).unwrap();
    let appended = ledger::append_revision(
        &tx,
        &env.blobs,
        1002,
        &admin(),
        2,
        &[upload(99, 0, &name, bytes)],
    )
    .unwrap();
    tx.commit().unwrap();

    // Then: the Files row and the blob exist again
    assert_eq!(appended.files_created, 1);
    assert_eq!(appended.blobs_written, vec![name.clone()]);
    assert!(env.blobs.exists(&name));
    assert!(integrity::check_with_blobs(&env.conn, &env.blobs)
        .unwrap()
        .is_clean());
}

fn seed_two_fields(env: &mut common::TestEnv) {
    let tx = db::write_transaction(&mut env.conn).unwrap();
    ledger::append_revision(
        &tx,
        &env.blobs,
        1001,
        &admin(),
        1,
        &[text(1, PropertyKey::Data, "t"), text(76, PropertyKey::Data, "b")],
    )
    .unwrap();
    ledger::append_revision(&tx, &env.blobs, 1001, &admin(), 2, &[text(76, PropertyKey::Data, "c")])
        .unwrap();
    ledger::append_revision(&tx, &env.blobs, 1002, &admin(), 3, &[text(76, PropertyKey::Data, "d")])
        .unwrap();
    tx.commit().unwrap();
}

#[test]
fn test_delete_field_retains_empty_revisions() {
    let mut env = setup_test_env();
    seed_two_fields(&mut env);

    let tx = db::write_transaction(&mut env.conn).unwrap();
    let outcome = ledger::delete_data_for_field(&tx, 76, EmptyRevisionPolicy::Retain).unwrap();
    tx.commit().unwrap();

    assert_eq!(outcome.rows_deleted, 3);
    assert_eq!(outcome.revisions_deleted, 0);
    assert_eq!(table_count(&env.conn, "revisions"), 3);
    assert_eq!(table_count(&env.conn, "data"), 1);
}

#[test]
fn test_delete_field_prunes_empty_revisions() {
    let mut env = setup_test_env();
    seed_two_fields(&mut env);

    let tx = db::write_transaction(&mut env.conn).unwrap();
    let outcome = ledger::delete_data_for_field(&tx, 76, EmptyRevisionPolicy::Prune).unwrap();
    tx.commit().unwrap();

    // the first revision still holds the title row
    assert_eq!(outcome.revisions_deleted, 2);
    assert_eq!(table_count(&env.conn, "revisions"), 1);
}

#[test]
fn test_delete_field_in_selected_records() {
    let mut env = setup_test_env();
    seed_two_fields(&mut env);

    let tx = db::write_transaction(&mut env.conn).unwrap();
    let outcome: CleanupOutcome =
        ledger::delete_data_for_field_in_records(&tx, 76, &[1002], EmptyRevisionPolicy::Retain)
            .unwrap();
    tx.commit().unwrap();

    assert_eq!(outcome.rows_deleted, 1);
    assert_eq!(ledger::count_data_rows(&env.conn, 1001).unwrap(), 3);
    assert_eq!(ledger::count_data_rows(&env.conn, 1002).unwrap(), 0);
    assert_eq!(ledger::count_revisions(&env.conn, 1002).unwrap(), 1);
}

#[test]
fn test_fields_with_history() {
    let mut env = setup_test_env();
    seed_two_fields(&mut env);
    let fields = ledger::fields_with_history(&env.conn, 1001).unwrap();
    assert_eq!(fields.into_iter().collect::<Vec<_>>(), vec![1, 76]);
}
