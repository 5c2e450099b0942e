//! Sample transfer inputs.

use std::path::{Path, PathBuf};

use ferry_core::{DeclaredMedia, MediaKind, MediaRef, Requester};

/// One mebibyte.
pub const MIB: u64 = 1024 * 1024;

/// Requester with a full profile.
#[must_use]
pub fn requester(user_id: i64) -> Requester {
    Requester {
        user_id,
        chat_id: user_id,
        first_name: "Ada".to_string(),
        last_name: Some("Lovelace".to_string()),
        username: Some("ada".to_string()),
    }
}

/// Document declaration with the given name and size.
#[must_use]
pub fn document(file_id: &str, name: &str, size: Option<u64>) -> DeclaredMedia {
    DeclaredMedia::new(
        MediaRef::new(file_id),
        MediaKind::Document,
        Some(name.to_string()),
        size,
    )
}

/// Deterministic payload of `len` bytes.
#[must_use]
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| u8::try_from(i % 251).unwrap_or(0)).collect()
}

/// Entries left in `dir`, for scratch leak assertions.
///
/// # Errors
///
/// Returns an error when the directory cannot be read.
pub fn dir_entries(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        entries.push(entry?.path());
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_deterministic() {
        assert_eq!(payload(4), vec![0, 1, 2, 3]);
        assert_eq!(payload(300)[251], 0);
    }

    #[test]
    fn dir_entries_lists_files() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        assert!(dir_entries(dir.path())?.is_empty());
        std::fs::write(dir.path().join("a"), b"x")?;
        assert_eq!(dir_entries(dir.path())?.len(), 1);
        Ok(())
    }

    #[test]
    fn document_keeps_declared_fields() {
        let media = document("f1", "report.pdf", Some(MIB));
        assert_eq!(media.name, "report.pdf");
        assert_eq!(media.size, Some(MIB));
        assert_eq!(requester(9).handle(), "ada");
    }
}
