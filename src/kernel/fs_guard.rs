use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

// Resolves an `@include` target against the directory of the including file,
// never against the process working directory.
pub fn include_target(current_file: &Path, requested: &str) -> PathBuf {
    let requested = Path::new(requested.trim());
    if requested.is_absolute() {
        return requested.to_path_buf();
    }
    match current_file.parent() {
        Some(dir) => dir.join(requested),
        None => requested.to_path_buf(),
    }
}

// Canonical form used for cycle detection; fails when the file does not exist.
pub fn canonical(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("cannot open '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn resolves_relative_to_including_file() {
        let base = Path::new("/scripts/suite/main.txt");
        assert_eq!(
            include_target(base, "parts/login.txt"),
            PathBuf::from("/scripts/suite/parts/login.txt")
        );
        assert_eq!(
            include_target(base, "../shared.txt"),
            PathBuf::from("/scripts/suite/../shared.txt")
        );
        assert_eq!(include_target(base, "/abs/x.txt"), PathBuf::from("/abs/x.txt"));
    }

    #[test]
    fn canonical_collapses_dot_segments() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("a"))?;
        fs::write(dir.path().join("x.txt"), "")?;
        let a = canonical(&dir.path().join("a/../x.txt"))?;
        let b = canonical(&dir.path().join("x.txt"))?;
        assert_eq!(a, b);
        assert!(canonical(&dir.path().join("missing.txt")).is_err());
        Ok(())
    }
}
