//! URL validation and destination filename derivation.

mod path;
mod sanitize;

use std::path::{Path, PathBuf};

use crate::storage::{self, CHECKPOINT_SUFFIX};

pub use path::{filename_from_url_path, validate_url};
pub use sanitize::sanitize_filename;

/// Filename used when the URL path yields nothing usable.
const DEFAULT_FILENAME: &str = "download.bin";

/// Derives a safe local filename from the last path segment of `url`.
///
/// - `derive_filename("https://example.com/archive.zip")` → `"archive.zip"`
/// - `derive_filename("https://example.com/")` → `"download.bin"`
/// - `derive_filename("https://example.com/a.iso.rdmpart")` → `"a.iso"`
pub fn derive_filename(url: &str) -> String {
    let mut name = filename_from_url_path(url)
        .map(|raw| sanitize_filename(&raw))
        .unwrap_or_default();
    // Stripping can expose trailing dots, and trimming those can expose
    // another suffix.
    loop {
        let next = sanitize_filename(strip_reserved_suffixes(&name));
        if next == name {
            break;
        }
        name = next;
    }
    if name.is_empty() || name == "." || name == ".." {
        DEFAULT_FILENAME.to_string()
    } else {
        name
    }
}

/// Drops trailing `.rdmpart` and `.rdmpart.part<n>[-<start>]` suffixes, so a
/// destination never collides with another transfer's checkpoint or parts.
fn strip_reserved_suffixes(name: &str) -> &str {
    let mut name = name;
    while let Some(at) = name.rfind(CHECKPOINT_SUFFIX) {
        let tail = &name[at + CHECKPOINT_SUFFIX.len()..];
        let reserved = tail.is_empty()
            || tail.strip_prefix(storage::PART_INFIX).is_some_and(|rest| {
                storage::is_part_tail(rest)
                    || (!rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
            });
        if !reserved {
            break;
        }
        name = &name[..at];
    }
    name
}

/// `dir/name`, or `dir/stem (n).ext` with the smallest `n >= 1` that does not exist yet.
pub fn unique_destination(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match name.rfind('.') {
        Some(i) if i > 0 => (&name[..i], &name[i..]),
        _ => (name, ""),
    };
    (1u32..)
        .map(|n| dir.join(format!("{stem} ({n}){ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Unique destination in `dir` for `url`.
pub fn destination_for(dir: &Path, url: &str) -> PathBuf {
    unique_destination(dir, &derive_filename(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_filename_from_url_path() {
        assert_eq!(derive_filename("https://example.com/archive.zip"), "archive.zip");
        assert_eq!(
            derive_filename("https://cdn.example.com/path/to/debian-12.iso"),
            "debian-12.iso"
        );
    }

    #[test]
    fn derive_filename_fallbacks() {
        assert_eq!(derive_filename("https://example.com/"), "download.bin");
        assert_eq!(derive_filename("https://example.com/..."), "download.bin");
        assert_eq!(derive_filename("https://example.com/%2F"), "download.bin");
    }

    #[test]
    fn derive_filename_never_ends_in_temp_suffix() {
        assert_eq!(derive_filename("https://example.com/a.iso.rdmpart"), "a.iso");
        assert_eq!(derive_filename("https://example.com/a.iso.rdmpart.part2"), "a.iso");
        assert_eq!(
            derive_filename("https://example.com/a.iso.rdmpart.part1-716800"),
            "a.iso"
        );
        assert_eq!(derive_filename("https://example.com/b.rdmpart.rdmpart"), "b");
        assert_eq!(derive_filename("https://example.com/a.rdmpart..rdmpart"), "a");
        assert_eq!(derive_filename("https://example.com/x.rdmpart.part0-0"), "x");
        assert_eq!(
            derive_filename("https://example.com/notes.rdmpart.txt"),
            "notes.rdmpart.txt"
        );
        assert_eq!(
            derive_filename("https://example.com/a.rdmpart.partial"),
            "a.rdmpart.partial"
        );
    }

    #[test]
    fn destination_is_not_a_checkpoint_of_another_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let other = dir.path().join("a.iso");
        let dest = destination_for(dir.path(), "https://example.com/a.iso.rdmpart");
        assert_eq!(dest, other);
        assert_ne!(dest, storage::checkpoint_path(&other));
    }

    #[test]
    fn unique_destination_numbers_before_extension() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            unique_destination(dir.path(), "a.tar.gz"),
            dir.path().join("a.tar.gz")
        );
        std::fs::write(dir.path().join("a.tar.gz"), b"x").unwrap();
        assert_eq!(
            unique_destination(dir.path(), "a.tar.gz"),
            dir.path().join("a.tar (1).gz")
        );
        std::fs::write(dir.path().join("a.tar (1).gz"), b"x").unwrap();
        assert_eq!(
            unique_destination(dir.path(), "a.tar.gz"),
            dir.path().join("a.tar (2).gz")
        );
    }

    #[test]
    fn unique_destination_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README"), b"x").unwrap();
        assert_eq!(
            unique_destination(dir.path(), "README"),
            dir.path().join("README (1)")
        );
    }

    #[test]
    fn destination_for_joins_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            destination_for(dir.path(), "http://h/x/file.bin?q=1"),
            dir.path().join("file.bin")
        );
    }
}
