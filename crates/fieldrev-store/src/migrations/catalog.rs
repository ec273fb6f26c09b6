//! Migrations compiled into the binary

use sha2::{Digest, Sha256};

/// One schema step, applied at most once per database
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

impl Migration {
    /// Hex SHA-256 of the SQL text, recorded when the step is applied
    pub fn checksum(&self) -> String {
        hex::encode(Sha256::digest(self.sql.as_bytes()))
    }
}

/// Steps in application order
pub const MIGRATIONS: &[Migration] = &[Migration {
    id: "001_version_control",
    sql: include_str!("../../migrations/001_version_control.sql"),
}];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_tracks_sql_text() {
        let a = Migration { id: "a", sql: "SELECT 1" };
        let b = Migration { id: "a", sql: "SELECT 2" };
        assert_eq!(a.checksum().len(), 64);
        assert_eq!(a.checksum(), a.checksum());
        assert_ne!(a.checksum(), b.checksum());
    }

    #[test]
    fn test_ids_are_unique_and_ordered() {
        let ids: Vec<_> = MIGRATIONS.iter().map(|m| m.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(ids, sorted);
    }
}
