/// Fast parallel directory count used as the progress denominator.
///
/// Uses `jwalk`'s rayon-backed traversal, which is considerably faster than
/// the sequential walker but yields entries in no useful order, so it is
/// only good for counting. The count includes directories the sequential
/// walker may later fail to read, so it is an upper bound.
use super::CancellationToken;
use std::path::Path;
use tracing::debug;

/// How many entries to visit between cancellation checks.
const CANCEL_CHECK_EVERY: u64 = 1_000;

/// Count directories under `root`, including `root` itself.
///
/// Returns the partial count if cancelled.
pub fn count_dirs(root: &Path, cancel: &CancellationToken) -> usize {
    let walker = jwalk::WalkDir::new(root)
        .skip_hidden(false)
        .follow_links(false)
        .parallelism(jwalk::Parallelism::RayonNewPool(num_cpus::get()));

    let mut dirs = 0usize;
    let mut visited = 0u64;
    for entry in walker {
        visited += 1;
        if visited % CANCEL_CHECK_EVERY == 0 && cancel.is_cancelled() {
            debug!("Precount of {} cancelled at {dirs} dirs", root.display());
            break;
        }
        if let Ok(entry) = entry {
            if entry.file_type().is_dir() {
                dirs += 1;
            }
        }
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn counts_root_and_nested_dirs() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a/b")).unwrap();
        fs::create_dir_all(tmp.path().join("c")).unwrap();
        fs::write(tmp.path().join("a/file"), b"x").unwrap();

        assert_eq!(count_dirs(tmp.path(), &CancellationToken::new()), 4);
    }
}
