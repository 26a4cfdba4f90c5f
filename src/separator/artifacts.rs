use std::path::{Path, PathBuf};

use glob::{Pattern, glob};

use crate::config::SeparatorConfig;
use crate::errors::SeparationError;

/// File demucs writes for the isolated vocal stem.
pub const VOCALS_STEM: &str = "vocals.mp3";
/// File demucs writes for everything except vocals.
pub const INSTRUMENTAL_STEM: &str = "no_vocals.mp3";

/// The two relocated stems of a finished job.
#[derive(Debug, Clone, PartialEq)]
pub struct StemArtifacts {
    pub vocals: PathBuf,
    pub instrumental: PathBuf,
}

/// Find the most recently modified file named `file_name` anywhere under
/// `root`. Returns `None` when nothing matches.
pub fn find_newest(root: &Path, file_name: &str) -> Option<PathBuf> {
    let pattern = format!(
        "{}/**/{}",
        Pattern::escape(&root.to_string_lossy()),
        Pattern::escape(file_name)
    );

    let mut matches: Vec<PathBuf> = glob(&pattern)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();

    // Sort by modification time (most recent first)
    matches.sort_by(|a, b| {
        let a_time = a.metadata().and_then(|m| m.modified()).ok();
        let b_time = b.metadata().and_then(|m| m.modified()).ok();
        b_time.cmp(&a_time)
    });

    matches.into_iter().next()
}

/// Locate both stems under `search_root` and copy them to their fixed names
/// inside `job_dir`.
pub fn collect_stems(
    search_root: &Path,
    job_dir: &Path,
    separator: &SeparatorConfig,
) -> Result<StemArtifacts, SeparationError> {
    let vocals_src =
        find_newest(search_root, VOCALS_STEM).ok_or_else(|| SeparationError::MissingArtifact {
            stem: VOCALS_STEM,
            search_root: search_root.to_path_buf(),
        })?;
    let instrumental_src = find_newest(search_root, INSTRUMENTAL_STEM).ok_or_else(|| {
        SeparationError::MissingArtifact {
            stem: INSTRUMENTAL_STEM,
            search_root: search_root.to_path_buf(),
        }
    })?;

    let vocals = job_dir.join(separator.vocals_file_name());
    let instrumental = job_dir.join(separator.instrumental_file_name());
    copy_stem(&vocals_src, &vocals)?;
    copy_stem(&instrumental_src, &instrumental)?;

    Ok(StemArtifacts {
        vocals,
        instrumental,
    })
}

fn copy_stem(from: &Path, to: &Path) -> Result<(), SeparationError> {
    std::fs::copy(from, to).map_err(|source| SeparationError::CopyFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    fn write_stem(dir: &Path, name: &str, content: &str) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn set_mtime(path: &Path, when: SystemTime) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(when).unwrap();
    }

    #[test]
    fn test_find_newest_in_nested_dirs() {
        let dir = tempdir().unwrap();
        let path = write_stem(&dir.path().join("htdemucs_ft/song"), VOCALS_STEM, "v");
        assert_eq!(find_newest(dir.path(), VOCALS_STEM), Some(path));
    }

    #[test]
    fn test_find_newest_prefers_latest_mtime() {
        let dir = tempdir().unwrap();
        let stale = write_stem(&dir.path().join("old/run"), VOCALS_STEM, "old");
        let fresh = write_stem(&dir.path().join("new/run"), VOCALS_STEM, "new");

        let now = SystemTime::now();
        set_mtime(&stale, now - Duration::from_secs(3600));
        set_mtime(&fresh, now);

        assert_eq!(find_newest(dir.path(), VOCALS_STEM), Some(fresh));
    }

    #[test]
    fn test_find_newest_does_not_confuse_stems() {
        let dir = tempdir().unwrap();
        write_stem(&dir.path().join("m/s"), INSTRUMENTAL_STEM, "i");
        assert_eq!(find_newest(dir.path(), VOCALS_STEM), None);
    }

    #[test]
    fn test_find_newest_escapes_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("job [1]");
        let path = write_stem(&root.join("m/s"), VOCALS_STEM, "v");
        assert_eq!(find_newest(&root, VOCALS_STEM), Some(path));
    }

    #[test]
    fn test_collect_stems_copies_to_fixed_names() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        write_stem(&out.join("htdemucs_ft/song"), VOCALS_STEM, "vocals-data");
        write_stem(&out.join("htdemucs_ft/song"), INSTRUMENTAL_STEM, "inst-data");

        let artifacts = collect_stems(&out, dir.path(), &SeparatorConfig::default()).unwrap();
        assert_eq!(artifacts.vocals, dir.path().join("vocals_320.mp3"));
        assert_eq!(artifacts.instrumental, dir.path().join("instrumental_320.mp3"));
        assert_eq!(fs::read_to_string(&artifacts.vocals).unwrap(), "vocals-data");
        assert_eq!(fs::read_to_string(&artifacts.instrumental).unwrap(), "inst-data");
    }

    #[test]
    fn test_collect_stems_missing_instrumental() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        write_stem(&out.join("m/s"), VOCALS_STEM, "v");

        let err = collect_stems(&out, dir.path(), &SeparatorConfig::default()).unwrap_err();
        match err {
            SeparationError::MissingArtifact { stem, .. } => assert_eq!(stem, INSTRUMENTAL_STEM),
            other => panic!("Expected MissingArtifact, got {:?}", other),
        }
        assert!(!dir.path().join("vocals_320.mp3").exists());
    }
}
