use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::{
    foundation::core::FrameIndex,
    foundation::error::{MarkerError, MarkerResult},
};

/// Digits in a frame file name. Indices below `10^FRAME_NAME_WIDTH` sort the same
/// lexicographically and numerically.
pub const FRAME_NAME_WIDTH: usize = 6;

/// How an existing output directory is emptied before a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearMode {
    /// Delete files with the frame extension, recursively. Anything else is left alone.
    #[default]
    MatchingFiles,
    /// Remove the whole directory and create it again.
    Recreate,
}

/// `000042.png` for frame 42.
pub fn frame_file_name(frame: FrameIndex, ext: &str) -> String {
    format!("{:0width$}.{ext}", frame.0, width = FRAME_NAME_WIDTH)
}

pub fn frame_path(dir: &Path, frame: FrameIndex, ext: &str) -> PathBuf {
    dir.join(frame_file_name(frame, ext))
}

/// Create `dir` (and parents) if it does not exist yet.
pub fn ensure_output_dir(dir: &Path) -> MarkerResult<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;
    if !dir.is_dir() {
        return Err(MarkerError::validation(format!(
            "output path '{}' exists but is not a directory",
            dir.display()
        )));
    }
    Ok(())
}

/// Remove the leftovers of a previous run from `dir`.
///
/// Returns the number of files deleted (`Recreate` counts nothing).
pub fn clear_output_dir(dir: &Path, ext: &str, mode: ClearMode) -> MarkerResult<usize> {
    match mode {
        ClearMode::MatchingFiles => remove_matching(dir, ext),
        ClearMode::Recreate => {
            if dir.exists() {
                refuse_working_dir(dir)?;
                std::fs::remove_dir_all(dir)
                    .with_context(|| format!("failed to remove '{}'", dir.display()))?;
            }
            ensure_output_dir(dir)?;
            Ok(0)
        }
    }
}

/// Fail when `path` lies inside `dir`, where clearing the directory would delete it.
///
/// A `dir` that does not exist yet cannot contain anything and passes.
pub fn ensure_outside_output_dir(dir: &Path, path: &Path) -> MarkerResult<()> {
    if !dir.exists() {
        return Ok(());
    }
    let dir_abs = canonical(dir)?;
    let path_abs = canonical(path)?;
    if path_abs.starts_with(&dir_abs) {
        return Err(MarkerError::validation(format!(
            "'{}' is inside output directory '{}', which is cleared before rendering",
            path.display(),
            dir.display()
        )));
    }
    Ok(())
}

fn refuse_working_dir(dir: &Path) -> MarkerResult<()> {
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    let cwd = canonical(&cwd)?;
    if cwd.starts_with(canonical(dir)?) {
        return Err(MarkerError::validation(format!(
            "refusing to recreate output directory '{}': it contains the current directory",
            dir.display()
        )));
    }
    Ok(())
}

fn canonical(path: &Path) -> MarkerResult<PathBuf> {
    Ok(std::fs::canonicalize(path)
        .with_context(|| format!("failed to resolve '{}'", path.display()))?)
}

/// [`ensure_output_dir`] followed by [`clear_output_dir`].
pub fn prepare_output_dir(dir: &Path, ext: &str, mode: ClearMode) -> MarkerResult<usize> {
    ensure_output_dir(dir)?;
    let removed = clear_output_dir(dir, ext, mode)?;
    tracing::debug!(dir = %dir.display(), removed, ?mode, "output directory ready");
    Ok(removed)
}

fn remove_matching(dir: &Path, ext: &str) -> MarkerResult<usize> {
    let mut removed = 0usize;
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read output directory '{}'", dir.display()))?;

    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in '{}'", dir.display()))?;
        let path = entry.path();
        // file_type() does not follow symlinks, so a linked directory is never descended into.
        let ft = entry
            .file_type()
            .with_context(|| format!("failed to stat '{}'", path.display()))?;

        if ft.is_dir() {
            removed += remove_matching(&path, ext)?;
        } else if has_extension(&path, ext) {
            std::fs::remove_file(&path)
                .with_context(|| format!("failed to delete '{}'", path.display()))?;
            removed += 1;
        }
    }

    Ok(removed)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().is_some_and(|e| e == ext)
}

/// Frame files directly inside `dir`, sorted by name.
pub fn list_frames(dir: &Path, ext: &str) -> MarkerResult<Vec<PathBuf>> {
    let mut out = Vec::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read output directory '{}'", dir.display()))?;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in '{}'", dir.display()))?;
        let path = entry.path();
        if path.is_file() && has_extension(&path, ext) {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = PathBuf::from("target").join("output_tests").join(name);
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn file_names_are_zero_padded() {
        assert_eq!(frame_file_name(FrameIndex(0), "png"), "000000.png");
        assert_eq!(frame_file_name(FrameIndex(4542), "png"), "004542.png");
        assert_eq!(frame_file_name(FrameIndex(999_999), "jpg"), "999999.jpg");
    }

    #[test]
    fn lexicographic_order_matches_numeric_order() {
        let mut names: Vec<String> = [0u64, 9, 10, 99, 100, 1_000, 99_999, 100_000, 999_999]
            .into_iter()
            .rev()
            .map(|i| frame_file_name(FrameIndex(i), "png"))
            .collect();
        names.sort();
        let numeric: Vec<u64> = names
            .iter()
            .map(|n| n.trim_end_matches(".png").parse().unwrap())
            .collect();
        let mut sorted = numeric.clone();
        sorted.sort_unstable();
        assert_eq!(numeric, sorted);

        for i in (0..999_999u64).step_by(977) {
            let a = frame_file_name(FrameIndex(i), "png");
            let b = frame_file_name(FrameIndex(i + 1), "png");
            assert!(a < b, "{a} !< {b}");
        }
    }

    #[test]
    fn ensure_creates_nested_dirs() {
        let dir = scratch("ensure").join("a").join("b");
        ensure_output_dir(&dir).unwrap();
        assert!(dir.is_dir());
        ensure_output_dir(&dir).unwrap();
    }

    #[test]
    fn ensure_rejects_regular_file() {
        let dir = scratch("ensure_file");
        touch(&dir);
        assert!(ensure_output_dir(&dir).is_err());
    }

    #[test]
    fn matching_clear_keeps_other_files_and_is_idempotent() {
        let dir = scratch("clear_matching");
        touch(&dir.join("000000.png"));
        touch(&dir.join("000001.png"));
        touch(&dir.join("notes.txt"));
        touch(&dir.join("nested").join("old.png"));

        let removed = prepare_output_dir(&dir, "png", ClearMode::MatchingFiles).unwrap();
        assert_eq!(removed, 3);
        assert!(dir.join("notes.txt").exists());
        assert!(dir.join("nested").is_dir());
        assert!(list_frames(&dir, "png").unwrap().is_empty());

        let removed = prepare_output_dir(&dir, "png", ClearMode::MatchingFiles).unwrap();
        assert_eq!(removed, 0);
        assert!(dir.join("notes.txt").exists());
    }

    #[test]
    fn recreate_clear_empties_directory() {
        let dir = scratch("clear_recreate");
        touch(&dir.join("000000.png"));
        touch(&dir.join("notes.txt"));

        prepare_output_dir(&dir, "png", ClearMode::Recreate).unwrap();
        assert!(dir.is_dir());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn recreate_refuses_working_directory() {
        let err = clear_output_dir(Path::new("."), "png", ClearMode::Recreate).unwrap_err();
        assert!(matches!(err, MarkerError::Validation(_)), "{err}");
        assert!(Path::new("Cargo.toml").exists());

        let cwd = std::env::current_dir().unwrap();
        let parent = cwd.parent().unwrap();
        let err = clear_output_dir(parent, "png", ClearMode::Recreate).unwrap_err();
        assert!(matches!(err, MarkerError::Validation(_)), "{err}");
    }

    #[test]
    fn file_inside_output_dir_is_detected() {
        let dir = scratch("outside_check");
        let inner = dir.join("nested").join("graph.png");
        touch(&inner);
        let outside = scratch("outside_check_other").join("graph.png");
        touch(&outside);

        let err = ensure_outside_output_dir(&dir, &inner).unwrap_err();
        assert!(matches!(err, MarkerError::Validation(_)), "{err}");
        // Same directory, spelled differently.
        let dotted = dir.join(".").join("nested").join("..").join("nested").join("graph.png");
        assert!(ensure_outside_output_dir(&dir, &dotted).is_err());

        ensure_outside_output_dir(&dir, &outside).unwrap();
        ensure_outside_output_dir(&dir.join("not-created"), &inner).unwrap();
    }

    #[test]
    fn list_frames_is_sorted() {
        let dir = scratch("list");
        for i in [3u64, 1, 2] {
            touch(&frame_path(&dir, FrameIndex(i), "png"));
        }
        touch(&dir.join("other.txt"));
        let frames = list_frames(&dir, "png").unwrap();
        let names: Vec<_> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["000001.png", "000002.png", "000003.png"]);
    }

    #[test]
    fn clear_mode_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ClearMode::MatchingFiles).unwrap(),
            "\"matching_files\""
        );
        let m: ClearMode = serde_json::from_str("\"recreate\"").unwrap();
        assert_eq!(m, ClearMode::Recreate);
    }
}
