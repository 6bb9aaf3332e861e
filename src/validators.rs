//! Input validators: file, index and directory existence checks.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ValidationError;

/// Resolve `path` against the current directory without touching the filesystem.
pub fn absolutize(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

/// `<path><suffix>`, e.g. `tumor.bam` + `.bai` -> `tumor.bam.bai`.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// Make sure the BAM exists and has a `.bai` index next to it.
pub fn validate_bam(path: impl AsRef<Path>) -> Result<PathBuf, ValidationError> {
    let bam = absolutize(path);
    let index = with_suffix(&bam, ".bai");

    if !bam.is_file() {
        return Err(ValidationError::MissingFile(bam));
    }
    if !index.is_file() {
        return Err(ValidationError::MissingIndex(index));
    }

    Ok(bam)
}

/// Make sure the reference FASTA has a `.fai` index next to it.
///
/// Only the index is checked; the FASTA itself is consumed by the tools.
pub fn validate_reference(path: impl AsRef<Path>) -> Result<PathBuf, ValidationError> {
    let fasta = absolutize(path);
    let index = with_suffix(&fasta, ".fai");

    if !index.is_file() {
        return Err(ValidationError::MissingIndex(index));
    }

    Ok(fasta)
}

/// Check that every path is an existing file, optionally non-empty.
pub fn validate_paths_are_files<P: AsRef<Path>>(
    paths: &[P],
    check_size: bool,
) -> Result<(), ValidationError> {
    for path in paths {
        let path = path.as_ref();
        let meta = fs::metadata(path).map_err(|_| ValidationError::MissingFile(path.into()))?;

        if !meta.is_file() {
            return Err(ValidationError::NotAFile(path.into()));
        }
        if check_size && meta.len() == 0 {
            return Err(ValidationError::EmptyFile(path.into()));
        }
    }
    Ok(())
}

/// Check that every path is an existing directory.
pub fn validate_paths_are_dirs<P: AsRef<Path>>(paths: &[P]) -> Result<(), ValidationError> {
    for path in paths {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(ValidationError::NotADirectory(path.into()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_validate_bam_requires_index() {
        let dir = TempDir::new().unwrap();
        let bam = touch(&dir, "tumor.bam", "BAM");

        let err = validate_bam(&bam).unwrap_err();
        assert!(matches!(err, ValidationError::MissingIndex(p) if p.ends_with("tumor.bam.bai")));

        touch(&dir, "tumor.bam.bai", "BAI");
        assert_eq!(validate_bam(&bam).unwrap(), bam);
    }

    #[test]
    fn test_validate_bam_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = validate_bam(dir.path().join("absent.bam")).unwrap_err();
        assert!(matches!(err, ValidationError::MissingFile(_)));
    }

    #[test]
    fn test_validate_reference_only_checks_index() {
        let dir = TempDir::new().unwrap();
        let fasta = dir.path().join("gr37.fasta");

        assert!(validate_reference(&fasta).is_err());

        touch(&dir, "gr37.fasta.fai", "1\t249250621\t52\t60\t61\n");
        assert_eq!(validate_reference(&fasta).unwrap(), fasta);
    }

    #[test]
    fn test_validate_paths_are_files() {
        let dir = TempDir::new().unwrap();
        let full = touch(&dir, "full.txt", "x");
        let empty = touch(&dir, "empty.txt", "");

        assert!(validate_paths_are_files(&[&full], true).is_ok());
        assert!(validate_paths_are_files(&[&empty], false).is_ok());
        assert!(matches!(
            validate_paths_are_files(&[&full, &empty], true),
            Err(ValidationError::EmptyFile(_))
        ));
        assert!(matches!(
            validate_paths_are_files(&[dir.path()], false),
            Err(ValidationError::NotAFile(_))
        ));
    }

    #[test]
    fn test_validate_paths_are_dirs() {
        let dir = TempDir::new().unwrap();
        let file = touch(&dir, "f", "x");

        assert!(validate_paths_are_dirs(&[dir.path()]).is_ok());
        assert!(matches!(
            validate_paths_are_dirs(&[file]),
            Err(ValidationError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_absolutize_keeps_absolute_paths() {
        assert_eq!(absolutize("/tmp/x"), PathBuf::from("/tmp/x"));
        assert!(absolutize("x.bam").is_absolute());
    }
}
