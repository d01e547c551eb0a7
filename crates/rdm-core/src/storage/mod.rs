//! On-disk layout and file lifecycle.
//!
//! `dest` is written as `dest.rdmpart` (the checkpoint) and renamed into
//! place on success. Parallel transfers write each chunk to
//! `dest.rdmpart.part<i>-<start>`, where `<start>` is the absolute offset of
//! the part's first byte; parts are appended to the checkpoint in index order
//! once every chunk worker has exited.

mod merge;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub use merge::{absorb_part, merge_parts};

/// Reserved checkpoint suffix.
pub const CHECKPOINT_SUFFIX: &str = ".rdmpart";

pub(crate) const PART_INFIX: &str = ".part";

/// Checkpoint path: `file.iso` → `file.iso.rdmpart`.
pub fn checkpoint_path(destination: &Path) -> PathBuf {
    let mut o = destination.as_os_str().to_owned();
    o.push(CHECKPOINT_SUFFIX);
    PathBuf::from(o)
}

/// Part file for chunk `index` whose first byte is at `start`:
/// `file.iso.rdmpart.part3-786432`.
pub fn part_path(checkpoint: &Path, index: usize, start: u64) -> PathBuf {
    let mut o = checkpoint.as_os_str().to_owned();
    o.push(format!("{PART_INFIX}{index}-{start}"));
    PathBuf::from(o)
}

/// True for `<digits>-<digits>`, the tail of a part file name after `.part`.
pub(crate) fn is_part_tail(rest: &str) -> bool {
    let Some((index, start)) = rest.split_once('-') else {
        return false;
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    digits(index) && digits(start)
}

/// Size of `path`, or 0 when it does not exist.
pub fn file_len(path: &Path) -> io::Result<u64> {
    match fs::metadata(path) {
        Ok(m) => Ok(m.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e),
    }
}

pub(crate) fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Promotes the checkpoint to `destination`, replacing any existing file,
/// then removes leftover part files.
pub fn finalize(checkpoint: &Path, destination: &Path) -> io::Result<()> {
    if !checkpoint.exists() {
        // Zero-byte resources never open the checkpoint.
        fs::File::create(checkpoint)?;
    }
    remove_if_exists(destination)?;
    fs::rename(checkpoint, destination)?;
    remove_parts(checkpoint)
}

/// Removes every `<checkpoint>.part<index>-<start>` file next to the checkpoint.
pub fn remove_parts(checkpoint: &Path) -> io::Result<()> {
    let (Some(dir), Some(name)) = (checkpoint.parent(), checkpoint.file_name()) else {
        return Ok(());
    };
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    let prefix = format!("{}{PART_INFIX}", name.to_string_lossy());
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        let is_part = file_name.strip_prefix(&prefix).is_some_and(is_part_tail);
        if is_part {
            remove_if_exists(&entry.path())?;
        }
    }
    Ok(())
}

/// Deletes the checkpoint and all part files. Failures are logged, not returned.
pub fn discard(checkpoint: &Path) {
    if let Err(e) = remove_if_exists(checkpoint) {
        tracing::warn!("failed to remove {}: {}", checkpoint.display(), e);
    }
    if let Err(e) = remove_parts(checkpoint) {
        tracing::warn!(
            "failed to remove part files of {}: {}",
            checkpoint.display(),
            e
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_and_part_paths() {
        let cp = checkpoint_path(Path::new("/tmp/archive.zip"));
        assert_eq!(cp, PathBuf::from("/tmp/archive.zip.rdmpart"));
        assert_eq!(
            part_path(&cp, 12, 4096),
            PathBuf::from("/tmp/archive.zip.rdmpart.part12-4096")
        );
    }

    #[test]
    fn finalize_replaces_destination_and_clears_parts() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let cp = checkpoint_path(&dest);
        fs::write(&dest, b"old").unwrap();
        fs::write(&cp, b"new contents").unwrap();
        fs::write(part_path(&cp, 0, 0), b"stale").unwrap();
        fs::write(part_path(&cp, 1, 700), b"stale").unwrap();

        finalize(&cp, &dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"new contents");
        assert!(!cp.exists());
        assert!(!part_path(&cp, 0, 0).exists());
        assert!(!part_path(&cp, 1, 700).exists());
    }

    #[test]
    fn finalize_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("empty");
        finalize(&checkpoint_path(&dest), &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap().len(), 0);
    }

    #[test]
    fn discard_leaves_unrelated_files() {
        let dir = tempfile::tempdir().unwrap();
        let cp = checkpoint_path(&dir.path().join("a.iso"));
        fs::write(&cp, b"x").unwrap();
        fs::write(part_path(&cp, 0, 0), b"x").unwrap();
        fs::write(part_path(&cp, 7, 91), b"x").unwrap();
        let other = dir.path().join("a.iso.rdmpart.partial-notes");
        fs::write(&other, b"keep").unwrap();
        let no_start = dir.path().join("a.iso.rdmpart.part3");
        fs::write(&no_start, b"keep").unwrap();

        discard(&cp);

        assert!(!cp.exists());
        assert!(!part_path(&cp, 0, 0).exists());
        assert!(!part_path(&cp, 7, 91).exists());
        assert!(other.exists());
        assert!(no_start.exists());
    }

    #[test]
    fn part_tail_needs_index_and_start() {
        assert!(is_part_tail("3-786432"));
        assert!(!is_part_tail("3"));
        assert!(!is_part_tail("3-"));
        assert!(!is_part_tail("-5"));
        assert!(!is_part_tail("ial-notes"));
    }

    #[test]
    fn file_len_missing_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(file_len(&dir.path().join("nope")).unwrap(), 0);
    }
}
