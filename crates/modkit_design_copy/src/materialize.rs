//! Destination folder creation.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::rename::SpecRenamePlan;
use crate::report::ReportDesignCopyBuilder;
use crate::spec::EnumFailureKind;
use crate::util::validate_destination_path_safety;

/// Relative folders to mirror: every scanned folder plus each assignment's ancestors.
///
/// The set is ordered so parents come before their children.
pub fn derive_directory_set(dirs: &[PathBuf], spec_plan: &SpecRenamePlan) -> BTreeSet<PathBuf> {
    let mut set_dirs: BTreeSet<PathBuf> = dirs.iter().cloned().collect();
    for spec_assignment in &spec_plan.assignments {
        let mut path_cursor = spec_assignment.relative_path.parent();
        while let Some(path_dir) = path_cursor {
            if path_dir.as_os_str().is_empty() {
                break;
            }
            set_dirs.insert(path_dir.to_path_buf());
            path_cursor = path_dir.parent();
        }
    }
    set_dirs
}

/// Ensure every folder in `set_dirs` exists under `path_dir_dst`.
///
/// Existing folders are left alone and not counted. Each failure is recorded
/// as `DirectoryCreateFailed` and the remaining folders are still attempted.
/// Returns the number of folders created.
pub fn materialize_directories(
    path_dir_dst: &Path,
    set_dirs: &BTreeSet<PathBuf>,
    builder_report: &mut ReportDesignCopyBuilder,
) -> usize {
    let mut n_created = 0;
    for path_rel in set_dirs {
        let path_target = path_dir_dst.join(path_rel);
        if let Err(message) = validate_destination_path_safety(&path_target, path_dir_dst) {
            warn!(path = %path_target.display(), "{message}");
            builder_report.add_failure(path_target, EnumFailureKind::DirectoryCreateFailed, message);
            continue;
        }
        if path_target.is_dir() {
            continue;
        }
        if path_target.exists() {
            let message = format!(
                "Destination is a file, expected directory: {}",
                path_target.display()
            );
            warn!(path = %path_target.display(), "{message}");
            builder_report.add_failure(path_target, EnumFailureKind::DirectoryCreateFailed, message);
            continue;
        }
        match fs::create_dir_all(&path_target) {
            Ok(()) => {
                debug!(path = %path_target.display(), "folder created");
                builder_report.add_folder_created();
                n_created += 1;
            }
            Err(e) => {
                warn!(path = %path_target.display(), error = %e, "folder not created");
                builder_report.add_failure(
                    path_target,
                    EnumFailureKind::DirectoryCreateFailed,
                    e.to_string(),
                );
            }
        }
    }
    n_created
}
