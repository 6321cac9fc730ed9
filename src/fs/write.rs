use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::{IoResultExt, Result};

/// write `content` to `dest` atomically
///
/// the bytes go to a uniquely named file in `tmp_dir` first, which is
/// fsynced and renamed over `dest`; the destination directory is fsynced
/// after the rename. readers observe either the old file or the new one.
pub fn atomic_write(tmp_dir: &Path, dest: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).with_path(parent)?;
    }

    let tmp_path = tmp_dir.join(uuid::Uuid::new_v4().to_string());
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        tmp_file.write_all(content).with_path(&tmp_path)?;
        tmp_file.sync_all().with_path(&tmp_path)?;
    }

    if let Err(e) = fs::rename(&tmp_path, dest) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e).with_path(dest);
    }

    if let Some(parent) = dest.parent() {
        fsync_dir(parent)?;
    }

    Ok(())
}

/// fsync a directory so a completed rename survives a crash
pub fn fsync_dir(path: &Path) -> Result<()> {
    let dir = File::open(path).with_path(path)?;
    dir.sync_all().with_path(path)
}

/// remove empty directories from `start` upwards, stopping at `stop`
pub fn prune_empty_dirs(start: &Path, stop: &Path) {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir == stop || !dir.starts_with(stop) {
            break;
        }
        // fails when not empty, which ends the climb
        if fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_creates_parents() {
        let dir = tempdir().unwrap();
        let tmp = dir.path().join("tmp");
        fs::create_dir(&tmp).unwrap();

        let dest = dir.path().join("a/b/c");
        atomic_write(&tmp, &dest, b"one").unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"one");

        atomic_write(&tmp, &dest, b"two").unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"two");

        // no temp files left behind
        assert_eq!(fs::read_dir(&tmp).unwrap().count(), 0);
    }

    #[test]
    fn test_prune_empty_dirs() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("refs");
        fs::create_dir_all(root.join("heads/feature/deep")).unwrap();
        fs::create_dir_all(root.join("heads/keep")).unwrap();
        fs::write(root.join("heads/keep/file"), "x").unwrap();

        prune_empty_dirs(&root.join("heads/feature/deep"), &root);

        assert!(!root.join("heads/feature").exists());
        assert!(root.join("heads/keep/file").exists());
        assert!(root.exists());
    }
}
