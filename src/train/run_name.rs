use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use rand::Rng;

const MAX_ATTEMPTS: usize = 8;

/// Creates `<log_root>/<log_name>_run_<UTC timestamp>_<suffix>` and returns it.
///
/// The random suffix keeps concurrent runs started in the same millisecond
/// apart; an existing directory is never reused.
pub fn unique_run_dir(log_root: &Path, log_name: &str) -> Result<PathBuf> {
    fs::create_dir_all(log_root)
        .with_context(|| format!("Cannot create log root '{}'", log_root.display()))?;

    let mut rng = rand::thread_rng();
    for _ in 0..MAX_ATTEMPTS {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ");
        let suffix: u32 = rng.gen();
        let dir = log_root.join(format!("{log_name}_run_{stamp}_{suffix:08x}"));

        match fs::create_dir(&dir) {
            Ok(()) => {
                tracing::debug!("Run directory: {}", dir.display());
                return Ok(dir);
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Cannot create run directory '{}'", dir.display()))
            }
        }
    }

    bail!(
        "Could not find a free run directory name under '{}'",
        log_root.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn run_dirs_are_created_and_named_after_the_log() {
        let root = tempfile::tempdir().unwrap();

        let dir = unique_run_dir(root.path(), "flowers").unwrap();

        assert!(dir.is_dir());
        assert_eq!(dir.parent(), Some(root.path()));
        let name = dir.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("flowers_run_"), "{name}");
    }

    #[test]
    fn rapid_calls_never_collide() {
        let root = tempfile::tempdir().unwrap();

        let dirs: HashSet<PathBuf> = (0..50)
            .map(|_| unique_run_dir(root.path(), "vit").unwrap())
            .collect();

        assert_eq!(dirs.len(), 50);
    }

    #[test]
    fn missing_log_root_is_created() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("logs").join("fit");

        let dir = unique_run_dir(&nested, "vit").unwrap();

        assert!(dir.starts_with(&nested));
    }
}
