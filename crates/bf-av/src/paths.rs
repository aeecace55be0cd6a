//! Collision-free output path selection.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Picks the destination a conversion will write to.
///
/// Holds no state; the filesystem is the only thing consulted, so concurrent
/// callers never interfere through the allocator itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathAllocator;

impl PathAllocator {
    /// Decide the final output path for `desired`.
    ///
    /// With `overwrite` the path is returned unchanged (ffmpeg does the
    /// overwrite). Otherwise, if something already exists there, `-1`, `-2`,
    /// ... is inserted before the extension until a free name is found.
    pub fn allocate(&self, desired: &Path, overwrite: bool) -> PathBuf {
        if overwrite || !occupied(desired) {
            return desired.to_path_buf();
        }

        let stem = desired
            .file_stem()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("output"));
        let extension = desired.extension();

        (1u64..)
            .map(|n| {
                let mut name = stem.clone();
                name.push(format!("-{n}"));
                if let Some(ext) = extension {
                    name.push(".");
                    name.push(ext);
                }
                desired.with_file_name(name)
            })
            .find(|candidate| !occupied(candidate))
            .unwrap_or_else(|| desired.to_path_buf())
    }
}

/// Anything at `path` counts, including a dangling symlink.
fn occupied(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn free_path_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let desired = dir.path().join("clip.mp4");
        assert_eq!(PathAllocator.allocate(&desired, false), desired);
    }

    #[test]
    fn overwrite_is_always_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let desired = dir.path().join("clip.mp4");
        fs::write(&desired, b"x").unwrap();
        assert_eq!(PathAllocator.allocate(&desired, true), desired);
    }

    #[test]
    fn skips_every_taken_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let desired = dir.path().join("base.ext");
        fs::write(&desired, b"x").unwrap();
        for n in 1..4 {
            fs::write(dir.path().join(format!("base-{n}.ext")), b"x").unwrap();
        }
        assert_eq!(
            PathAllocator.allocate(&desired, false),
            dir.path().join("base-4.ext")
        );
    }

    #[test]
    fn first_collision_gets_dash_one() {
        let dir = tempfile::tempdir().unwrap();
        let desired = dir.path().join("clip.mp4");
        fs::write(&desired, b"x").unwrap();
        assert_eq!(
            PathAllocator.allocate(&desired, false),
            dir.path().join("clip-1.mp4")
        );
    }

    #[test]
    fn existing_directory_counts_as_collision() {
        let dir = tempfile::tempdir().unwrap();
        let desired = dir.path().join("render");
        fs::create_dir(&desired).unwrap();
        assert_eq!(
            PathAllocator.allocate(&desired, false),
            dir.path().join("render-1")
        );
    }

    #[test]
    fn only_last_extension_is_kept_after_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let desired = dir.path().join("movie.final.mkv");
        fs::write(&desired, b"x").unwrap();
        assert_eq!(
            PathAllocator.allocate(&desired, false),
            dir.path().join("movie.final-1.mkv")
        );
    }
}
