//! Stored filenames for uploaded files
//!
//! A stored name is the lowercase hex SHA-1 of the file bytes followed by the
//! lowercased extension of the uploaded name. Items of one field list that
//! would share a name get `-1`, `-2`, ... inserted before the extension, in
//! list order.

use crate::model::FileItem;
use sha1::{Digest, Sha1};
use std::collections::HashSet;

/// Lowercase hex SHA-1 digest of the bytes
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Lowercased extension of a filename, without the dot
pub fn extension(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.rfind('.') {
        Some(pos) if pos + 1 < base.len() => Some(base[pos + 1..].to_lowercase()),
        _ => None,
    }
}

/// `<hash>.<ext>`, or the bare hash when the upload has no extension
pub fn stored_name(hash: &str, original_name: &str) -> String {
    match extension(original_name) {
        Some(ext) => format!("{}.{}", hash, ext),
        None => hash.to_string(),
    }
}

/// Insert `-<n>` before the extension
pub fn with_suffix(name: &str, n: usize) -> String {
    match name.rfind('.') {
        Some(pos) => format!("{}-{}{}", &name[..pos], n, &name[pos..]),
        None => format!("{}-{}", name, n),
    }
}

/// Name every pending upload in a field list
///
/// Items that already carry a stored filename reserve it. Each pending
/// upload gets the first free name among `<hash>.<ext>`, `<hash>-1.<ext>`,
/// ... and its size and timestamps are filled in from the bytes and `now`
/// (unix seconds). Existing items are left untouched.
pub fn assign_stored_names(items: &mut [FileItem], now: i64) {
    let mut used: HashSet<String> = items
        .iter()
        .filter(|i| i.upload.is_none())
        .map(|i| i.filename.clone())
        .collect();

    for item in items.iter_mut() {
        let Some(upload) = item.upload.as_ref() else {
            continue;
        };
        let base = stored_name(&content_hash(&upload.bytes), &upload.original_name);
        let mut candidate = base.clone();
        let mut n = 0;
        while used.contains(&candidate) {
            n += 1;
            candidate = with_suffix(&base, n);
        }
        used.insert(candidate.clone());

        item.size = upload.bytes.len() as u64;
        item.filename = candidate;
        if item.created == 0 {
            item.created = now;
        }
        item.modified = now;
    }
}
