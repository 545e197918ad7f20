use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::spec::{DesignCopyError, EnumPatternMode};

////////////////////////////////////////////////////////////////////////////////
// #region PatternMatching

/// Compiled user pattern list (exclusions, CLI selections).
#[derive(Debug, Clone)]
pub enum TypePatternSeq {
    Literal(Vec<String>),
    Glob(Vec<GlobMatcher>),
    Regex(Vec<Regex>),
}

impl TypePatternSeq {
    /// Compile `patterns`; `None` when the list is absent or empty.
    pub fn compile(
        patterns: Option<&[String]>,
        rule_pattern: EnumPatternMode,
    ) -> Result<Option<Self>, DesignCopyError> {
        let Some(patterns) = patterns else {
            return Ok(None);
        };
        if patterns.is_empty() {
            return Ok(None);
        }

        match rule_pattern {
            EnumPatternMode::Literal => Ok(Some(Self::Literal(patterns.to_vec()))),
            EnumPatternMode::Glob => {
                let mut l_glob = Vec::with_capacity(patterns.len());
                for pattern in patterns {
                    let matcher = Glob::new(pattern)
                        .map_err(|e| DesignCopyError::InvalidPattern {
                            pattern: pattern.clone(),
                            message: e.to_string(),
                        })?
                        .compile_matcher();
                    l_glob.push(matcher);
                }
                Ok(Some(Self::Glob(l_glob)))
            }
            EnumPatternMode::Regex => {
                let mut l_regex = Vec::with_capacity(patterns.len());
                for pattern in patterns {
                    let regex =
                        Regex::new(pattern).map_err(|e| DesignCopyError::InvalidPattern {
                            pattern: pattern.clone(),
                            message: e.to_string(),
                        })?;
                    l_regex.push(regex);
                }
                Ok(Some(Self::Regex(l_regex)))
            }
        }
    }

    pub fn is_match(&self, value: &str) -> bool {
        match self {
            Self::Literal(v) => v.iter().any(|p| value.contains(p.as_str())),
            Self::Glob(v) => v.iter().any(|p| p.is_match(value)),
            Self::Regex(v) => v.iter().any(|p| p.is_match(value)),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PathKeys

/// Paths name the same file regardless of case only on Windows volumes.
pub(crate) const IF_PATHS_IGNORE_CASE: bool = cfg!(windows);

/// Identity key of a path with `/` separators, case-folded only where the
/// file system ignores case.
pub(crate) fn derive_path_key(path: &Path) -> String {
    _derive_key(path, IF_PATHS_IGNORE_CASE)
}

/// Case-folded key with `/` separators, for ordering and destination
/// collision checks.
pub(crate) fn derive_folded_key(path: &Path) -> String {
    _derive_key(path, true)
}

fn _derive_key(path: &Path, if_fold_case: bool) -> String {
    let mut c_key = String::new();
    for component in path.components() {
        if matches!(component, Component::RootDir) {
            if !c_key.ends_with('/') {
                c_key.push('/');
            }
            continue;
        }
        if !c_key.is_empty() && !c_key.ends_with('/') {
            c_key.push('/');
        }
        c_key.push_str(&_component_text(component, if_fold_case));
    }
    c_key
}

fn _component_text(component: Component<'_>, if_fold_case: bool) -> String {
    let c_text = component.as_os_str().to_string_lossy();
    if if_fold_case {
        c_text.to_lowercase()
    } else {
        c_text.into_owned()
    }
}

/// Source-relative path with `/` separators, original casing.
pub fn derive_relative_key(relative_path: &Path) -> String {
    relative_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Component-wise `path` strictly under `path_root`, using path identity.
pub(crate) fn is_under_root(path: &Path, path_root: &Path) -> bool {
    let l_parts_path = _identity_components(path);
    let l_parts_root = _identity_components(path_root);
    l_parts_path.len() > l_parts_root.len() && l_parts_path.starts_with(&l_parts_root)
}

/// `path` relative to `path_root` when it lies under it.
pub(crate) fn strip_root(path: &Path, path_root: &Path) -> Option<PathBuf> {
    if !is_under_root(path, path_root) {
        return None;
    }
    let n_skip = path_root
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .count();
    Some(
        path.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .skip(n_skip)
            .collect(),
    )
}

fn _identity_components(path: &Path) -> Vec<String> {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| _component_text(c, IF_PATHS_IGNORE_CASE))
        .collect()
}

fn _eq_char_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// `value` without a leading `prefix`, compared case-insensitively.
pub(crate) fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let mut iter_value = value.char_indices();
    for c_prefix in prefix.chars() {
        let (_, c_value) = iter_value.next()?;
        if !_eq_char_ignore_case(c_value, c_prefix) {
            return None;
        }
    }
    let n_byte = iter_value.next().map_or(value.len(), |(n, _)| n);
    Some(&value[n_byte..])
}

/// `value` without a trailing `suffix`, compared case-insensitively.
pub(crate) fn strip_suffix_ignore_case<'a>(value: &'a str, suffix: &str) -> Option<&'a str> {
    let mut iter_value = value.char_indices().rev();
    let mut n_byte = value.len();
    for c_suffix in suffix.chars().rev() {
        let (n, c_value) = iter_value.next()?;
        if !_eq_char_ignore_case(c_value, c_suffix) {
            return None;
        }
        n_byte = n;
    }
    Some(&value[..n_byte])
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PathSafety

fn _normalize_path(path: &Path) -> PathBuf {
    if let Ok(resolved) = fs::canonicalize(path) {
        return resolved;
    }
    _absolutize_path(path)
}

fn _absolutize_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(path)
}

pub(crate) fn is_overlap(src: &Path, dst: &Path) -> bool {
    let src_resolved = _normalize_path(src);
    let dst_resolved = _normalize_path(dst);
    dst_resolved.starts_with(&src_resolved) || src_resolved.starts_with(&dst_resolved)
}

/// Reject destinations that leave the root or traverse a symlink.
pub(crate) fn validate_destination_path_safety(
    path_dst_item: &Path,
    path_dir_dst_root: &Path,
) -> Result<(), String> {
    let path_dir_dst_root_abs = _absolutize_path(path_dir_dst_root);
    let path_dst_item_abs = _absolutize_path(path_dst_item);

    let path_rel = path_dst_item_abs
        .strip_prefix(&path_dir_dst_root_abs)
        .map_err(|_| {
            format!(
                "Unsafe destination path escapes destination root: {} (root={})",
                path_dst_item.display(),
                path_dir_dst_root.display()
            )
        })?;
    if path_rel
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(format!(
            "Unsafe destination path contains parent traversal: {}",
            path_dst_item.display()
        ));
    }

    let mut path_cursor = path_dir_dst_root_abs.clone();
    for part_rel in path_rel.components() {
        path_cursor.push(part_rel.as_os_str());
        match fs::symlink_metadata(&path_cursor) {
            Ok(meta_cursor) => {
                if meta_cursor.file_type().is_symlink() {
                    return Err(format!(
                        "Unsafe destination path traverses symlink component: {}",
                        path_cursor.display()
                    ));
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => break,
            Err(e) => {
                return Err(format!(
                    "Failed to inspect destination path component {} ({e})",
                    path_cursor.display()
                ));
            }
        }
    }

    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ByteCopy

pub(crate) fn copy_file_with_metadata(
    path_file_src: &Path,
    path_file_dst: &Path,
) -> Result<(), io::Error> {
    fs::copy(path_file_src, path_file_dst)?;
    #[cfg(target_os = "linux")]
    {
        apply_metadata_linux(path_file_src, path_file_dst)?;
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn apply_metadata_linux(path_file_src: &Path, path_file_dst: &Path) -> Result<(), io::Error> {
    use filetime::{FileTime, set_file_times};

    let stat_src = fs::metadata(path_file_src)?;
    fs::set_permissions(path_file_dst, stat_src.permissions())?;

    let file_time_access = FileTime::from_last_access_time(&stat_src);
    let file_time_modify = FileTime::from_last_modification_time(&stat_src);
    set_file_times(path_file_dst, file_time_access, file_time_modify)?;

    copy_xattrs_linux(path_file_src, path_file_dst);
    Ok(())
}

#[cfg(target_os = "linux")]
fn copy_xattrs_linux(path_file_src: &Path, path_file_dst: &Path) {
    let Ok(iter_xattr_names) = xattr::list(path_file_src) else {
        return;
    };
    for name in iter_xattr_names {
        let Some(raw_value) = xattr::get(path_file_src, &name).ok().flatten() else {
            continue;
        };
        if let Err(e) = xattr::set(path_file_dst, &name, &raw_value) {
            tracing::debug!(
                path = %path_file_dst.display(),
                attribute = %name.to_string_lossy(),
                error = %e,
                "extended attribute not copied"
            );
        }
    }
}

pub(crate) fn calculate_worker_limit(num_workers_max: Option<usize>) -> usize {
    let n_cpu = std::thread::available_parallelism()
        .map(|v| v.get())
        .unwrap_or(1);

    match num_workers_max {
        Some(n) => n.clamp(1, n_cpu),
        None => n_cpu.clamp(1, 8),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
