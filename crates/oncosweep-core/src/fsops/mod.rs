/// Filesystem adapter — the four primitive operations the engine performs
/// against the network store.
///
/// Everything here is synchronous and runs to completion or failure; jobs
/// only check cancellation *between* these calls, never inside them.
use std::fs;
use std::path::Path;

use crate::errors::{EngineError, Result};

/// List the names of the immediate subdirectories of `path`.
///
/// Fails with [`EngineError::Unreachable`] when the path itself cannot be
/// enumerated (dead network mount, missing drive). Non-directory entries
/// are skipped. Names are returned sorted so scan order is deterministic
/// across runs.
pub fn list_subdirectories(path: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(path).map_err(|source| EngineError::Unreachable {
        path: path.to_path_buf(),
        source,
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::io(path, e))?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Recursive size of a directory in bytes: the sum of the sizes of every
/// file below it.
///
/// Unreadable entries are skipped rather than failing the walk — this is
/// the same number whether it is computed for a progress display or for
/// the post-copy verification, so both sides of a comparison skip the same
/// way. Symlinks are not followed.
pub fn directory_size(path: &Path) -> u64 {
    let walker = jwalk::WalkDir::new(path)
        .skip_hidden(false)
        .follow_links(false)
        .parallelism(jwalk::Parallelism::RayonNewPool(num_cpus::get()));

    let mut total: u64 = 0;
    for entry in walker {
        let Ok(entry) = entry else { continue };
        if entry.file_type().is_dir() {
            continue;
        }
        if let Ok(meta) = fs::symlink_metadata(entry.path()) {
            total += meta.len();
        }
    }
    total
}

/// Copy the directory tree at `src` to `dst`.
///
/// Refuses with [`EngineError::AlreadyExists`] when `dst` exists, so a
/// previous partial archive attempt surfaces as an error instead of being
/// silently merged into. Any other failure aborts the copy where it stands;
/// partially-copied destinations are left for the operator (the source is
/// never touched by this call).
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    if dst.exists() {
        return Err(EngineError::AlreadyExists {
            path: dst.to_path_buf(),
        });
    }
    copy_tree_inner(src, dst)
}

fn copy_tree_inner(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).map_err(|e| EngineError::io(dst, e))?;
    let entries = fs::read_dir(src).map_err(|e| EngineError::io(src, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::io(src, e))?;
        let source = entry.path();
        let target = dst.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| EngineError::io(&source, e))?;
        if file_type.is_dir() {
            copy_tree_inner(&source, &target)?;
        } else {
            fs::copy(&source, &target).map_err(|e| EngineError::io(&source, e))?;
        }
    }
    Ok(())
}

/// Delete the directory tree at `path`.
///
/// A failure may leave the tree partially deleted — callers report that
/// state to the operator rather than attempting recovery.
pub fn delete_tree(path: &Path) -> Result<()> {
    fs::remove_dir_all(path).map_err(|e| EngineError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_bytes(path: &Path, n: usize) {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(&vec![0u8; n]).unwrap();
    }

    #[test]
    fn list_subdirectories_returns_only_directories_sorted() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("beta")).unwrap();
        fs::create_dir(tmp.path().join("alpha")).unwrap();
        write_bytes(&tmp.path().join("a_file.txt"), 10);

        let names = list_subdirectories(tmp.path()).unwrap();
        assert_eq!(names, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn list_subdirectories_of_missing_path_is_unreachable() {
        let tmp = TempDir::new().unwrap();
        let gone = tmp.path().join("no_such_mount");
        let err = list_subdirectories(&gone).unwrap_err();
        assert!(matches!(err, EngineError::Unreachable { .. }), "{err}");
    }

    #[test]
    fn directory_size_sums_all_files_recursively() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("inner/deeper")).unwrap();
        write_bytes(&tmp.path().join("a.img"), 100);
        write_bytes(&tmp.path().join("inner/b.img"), 200);
        write_bytes(&tmp.path().join("inner/deeper/c.img"), 300);

        assert_eq!(directory_size(tmp.path()), 600);
    }

    #[test]
    fn directory_size_of_empty_directory_is_zero() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(directory_size(tmp.path()), 0);
    }

    #[test]
    fn copy_tree_replicates_the_whole_tree() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("sub")).unwrap();
        write_bytes(&src.join("a.img"), 64);
        write_bytes(&src.join("sub/b.img"), 128);

        let dst = tmp.path().join("dst");
        copy_tree(&src, &dst).unwrap();

        assert_eq!(fs::read(dst.join("a.img")).unwrap().len(), 64);
        assert_eq!(fs::read(dst.join("sub/b.img")).unwrap().len(), 128);
        assert_eq!(directory_size(&src), directory_size(&dst));
    }

    #[test]
    fn copy_tree_refuses_existing_destination() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        fs::create_dir(&src).unwrap();
        fs::create_dir(&dst).unwrap();

        let err = copy_tree(&src, &dst).unwrap_err();
        assert!(matches!(err, EngineError::AlreadyExists { .. }), "{err}");
    }

    #[test]
    fn delete_tree_removes_everything() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("victim");
        fs::create_dir_all(target.join("sub")).unwrap();
        write_bytes(&target.join("sub/x.img"), 32);

        delete_tree(&target).unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn delete_tree_of_missing_path_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let gone = tmp.path().join("never_existed");
        assert!(delete_tree(&gone).is_err());
    }
}
