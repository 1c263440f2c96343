//! Data root resolution
//!
//! Recordings are registered with a directory relative to a data root so the
//! same database works across machines that mount the data differently.

use crate::error::{IngestError, IngestResult};
use crate::models::ResolvedLocation;
use mscope_common::RootPolicy;
use std::path::{Component, Path, PathBuf};

/// Locate `relative` under the configured roots, in configured order.
///
/// An absolute `relative` is accepted only when it lies under one of the
/// roots. Declared paths containing `..` never resolve. Relative roots are
/// made absolute against the working directory before use.
pub fn resolve(roots: &[PathBuf], relative: &str, policy: RootPolicy) -> IngestResult<ResolvedLocation> {
    let declared = Path::new(relative);
    let not_found = || IngestError::DataRootNotFound {
        relative: relative.to_string(),
        roots: roots.to_vec(),
    };

    if declared.components().any(|c| c == Component::ParentDir) {
        tracing::warn!(directory = relative, "Recording directory escapes its data root");
        return Err(not_found());
    }

    let mut matches: Vec<ResolvedLocation> = Vec::new();
    for root in roots {
        let root = std::path::absolute(root).map_err(|e| IngestError::io(root, e))?;
        let candidate = if declared.is_absolute() {
            if !declared.starts_with(&root) {
                continue;
            }
            declared.to_path_buf()
        } else {
            root.join(declared)
        };

        if candidate.is_dir() {
            tracing::trace!(root = %root.display(), directory = %candidate.display(), "Data root match");
            matches.push(ResolvedLocation {
                root,
                directory: candidate,
            });
            if policy == RootPolicy::FirstMatch {
                break;
            }
        }
    }

    match matches.len() {
        0 => Err(not_found()),
        1 => Ok(matches.remove(0)),
        _ => Err(IngestError::AmbiguousDataRoot {
            relative: relative.to_string(),
            matches: matches.into_iter().map(|m| m.root).collect(),
        }),
    }
}

/// `path` relative to `root`, with `/` separators.
///
/// Falls back to the full path when `path` is not under `root`.
pub fn relative_to_root(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) => rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn roots_with(dirs: &[(&TempDir, bool)], relative: &str) -> Vec<PathBuf> {
        dirs.iter()
            .map(|(root, create)| {
                if *create {
                    std::fs::create_dir_all(root.path().join(relative)).unwrap();
                }
                root.path().to_path_buf()
            })
            .collect()
    }

    #[test]
    fn test_second_root_wins_when_first_lacks_directory() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let roots = roots_with(&[(&a, false), (&b, true)], "mouse1/s1");

        let loc = resolve(&roots, "mouse1/s1", RootPolicy::FirstMatch).unwrap();
        assert_eq!(loc.root, b.path());
        assert_eq!(loc.directory, b.path().join("mouse1/s1"));
    }

    #[test]
    fn test_first_match_prefers_earlier_root() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let roots = roots_with(&[(&a, true), (&b, true)], "rec");

        let loc = resolve(&roots, "rec", RootPolicy::FirstMatch).unwrap();
        assert_eq!(loc.root, a.path());
    }

    #[test]
    fn test_ambiguous_policy_errors() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let roots = roots_with(&[(&a, true), (&b, true)], "rec");

        let err = resolve(&roots, "rec", RootPolicy::ErrorOnAmbiguous).unwrap_err();
        match err {
            IngestError::AmbiguousDataRoot { matches, .. } => assert_eq!(matches.len(), 2),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_not_found() {
        let a = TempDir::new().unwrap();
        let err = resolve(&[a.path().to_path_buf()], "missing", RootPolicy::FirstMatch).unwrap_err();
        assert!(matches!(err, IngestError::DataRootNotFound { .. }));

        let err = resolve(&[], "missing", RootPolicy::FirstMatch).unwrap_err();
        assert!(matches!(err, IngestError::DataRootNotFound { .. }));
    }

    #[test]
    fn test_absolute_path_must_be_under_a_root() {
        let a = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::fs::create_dir_all(a.path().join("rec")).unwrap();
        let roots = vec![a.path().to_path_buf()];

        let inside = a.path().join("rec");
        let loc = resolve(&roots, inside.to_str().unwrap(), RootPolicy::FirstMatch).unwrap();
        assert_eq!(loc.directory, inside);

        let err = resolve(&roots, outside.path().to_str().unwrap(), RootPolicy::FirstMatch).unwrap_err();
        assert!(matches!(err, IngestError::DataRootNotFound { .. }));
    }

    #[test]
    fn test_parent_components_rejected() {
        let base = TempDir::new().unwrap();
        let root = base.path().join("root");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(base.path().join("outside")).unwrap();
        let roots = vec![root.clone()];

        let err = resolve(&roots, "../outside", RootPolicy::FirstMatch).unwrap_err();
        assert!(matches!(err, IngestError::DataRootNotFound { .. }));

        let escaping = root.join("..").join("outside");
        let err = resolve(&roots, escaping.to_str().unwrap(), RootPolicy::FirstMatch).unwrap_err();
        assert!(matches!(err, IngestError::DataRootNotFound { .. }));
    }

    #[test]
    fn test_relative_root_made_absolute() {
        // Created under the working directory so its bare name is a relative root
        let local = TempDir::new_in(".").unwrap();
        std::fs::create_dir_all(local.path().join("rec")).unwrap();
        let name = local.path().file_name().unwrap();
        let roots = vec![PathBuf::from(name)];

        let loc = resolve(&roots, "rec", RootPolicy::FirstMatch).unwrap();
        assert!(loc.root.is_absolute());
        assert!(loc.directory.is_absolute());
        assert_eq!(loc.directory, std::env::current_dir().unwrap().join(name).join("rec"));
    }

    #[test]
    fn test_relative_to_root() {
        let root = Path::new("/data/a");
        assert_eq!(relative_to_root(root, Path::new("/data/a/m1/s1/0.avi")), "m1/s1/0.avi");
        assert_eq!(relative_to_root(root, Path::new("/other/0.avi")), "/other/0.avi");
    }
}
