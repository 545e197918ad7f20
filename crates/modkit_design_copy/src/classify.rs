//! Source tree scan: exclusion pre-pass, deterministic enumeration and role
//! assignment.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::conf::{C_PATTERN_VERSION_MARKER, TUP_PATTERNS_MAIN_PROJECT_FILE};
use crate::spec::{
    DesignCopyError, DesignCopyResult, EnumDocumentKind, EnumFileRole, EnumSelection,
    EnumSourceMode, SpecClassifiedFile, SpecExclusionRules, SpecMasterRules, SpecSourceFile,
};
use crate::util::{TypePatternSeq, derive_folded_key};

/// Result of scanning one source root.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SpecSourceScan {
    pub path_dir_src: PathBuf,
    /// Classified files ordered by relative path.
    pub files: Vec<SpecClassifiedFile>,
    /// Non-excluded directories relative to the source root, parents first.
    pub dirs: Vec<PathBuf>,
    pub cnt_excluded: u64,
    pub warnings: Vec<String>,
}

impl SpecSourceScan {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn top_master(&self) -> Option<&SpecClassifiedFile> {
        self.files.iter().find(|f| f.role == EnumFileRole::TopMaster)
    }

    pub fn project_master(&self) -> Option<&SpecClassifiedFile> {
        self.files
            .iter()
            .find(|f| f.role == EnumFileRole::ProjectMaster)
    }

    pub fn cnt_selected(&self) -> usize {
        self.files.iter().filter(|f| f.is_selected).count()
    }

    /// Mark files selected or not; roles are unaffected.
    pub fn apply_selection(&mut self, selection: &EnumSelection) {
        for spec_file in &mut self.files {
            spec_file.is_selected = selection.is_selected(&spec_file.source.relative_path);
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region Exclusions

#[derive(Debug)]
struct SpecExclusionMatcher {
    l_prefixes_temp: Vec<String>,
    set_extensions: HashSet<String>,
    set_names_dir: HashSet<String>,
    regex_version_marker: Regex,
    patterns_exclude_files: Option<TypePatternSeq>,
}

impl SpecExclusionMatcher {
    fn from_rules(spec_exclusions: &SpecExclusionRules) -> DesignCopyResult<Self> {
        let regex_version_marker = Regex::new(C_PATTERN_VERSION_MARKER).map_err(|e| {
            DesignCopyError::InvalidPattern {
                pattern: C_PATTERN_VERSION_MARKER.to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(Self {
            l_prefixes_temp: spec_exclusions.prefixes_temp_file.clone(),
            set_extensions: spec_exclusions
                .extensions_transient
                .iter()
                .map(|v| v.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            set_names_dir: spec_exclusions
                .names_excluded_dir
                .iter()
                .map(|v| v.to_lowercase())
                .collect(),
            regex_version_marker,
            patterns_exclude_files: TypePatternSeq::compile(
                spec_exclusions.patterns_exclude_files.as_deref(),
                spec_exclusions.rule_pattern,
            )?,
        })
    }

    fn is_excluded_dir(&self, name_dir: &str) -> bool {
        self.set_names_dir.contains(&name_dir.to_lowercase())
    }

    fn is_excluded_file(&self, name_file: &str) -> bool {
        if self
            .l_prefixes_temp
            .iter()
            .any(|p| !p.is_empty() && name_file.starts_with(p.as_str()))
        {
            return true;
        }
        let c_extension = Path::new(name_file)
            .extension()
            .map(|v| v.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if self.set_extensions.contains(&c_extension) {
            return true;
        }
        if self.regex_version_marker.is_match(name_file) {
            return true;
        }
        self.patterns_exclude_files
            .as_ref()
            .is_some_and(|p| p.is_match(name_file))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Scan

/// Scan `path_dir_src` and classify every surviving file.
///
/// A missing or empty root yields an empty scan; only invalid exclusion
/// patterns are errors.
pub fn scan_source(
    path_dir_src: &Path,
    enum_mode: EnumSourceMode,
    spec_exclusions: &SpecExclusionRules,
    spec_masters: &SpecMasterRules,
) -> DesignCopyResult<SpecSourceScan> {
    let spec_matcher = SpecExclusionMatcher::from_rules(spec_exclusions)?;
    let l_regex_main_project = _compile_main_project_patterns()?;

    let mut spec_scan = SpecSourceScan {
        path_dir_src: path_dir_src.to_path_buf(),
        ..SpecSourceScan::default()
    };
    if !path_dir_src.is_dir() {
        debug!(path = %path_dir_src.display(), "source root missing; nothing to scan");
        return Ok(spec_scan);
    }

    let mut l_files = Vec::new();
    walk_directory(
        path_dir_src,
        Path::new(""),
        &spec_matcher,
        &mut spec_scan,
        &mut l_files,
    );
    l_files.sort_by(|a, b| {
        derive_folded_key(&a.relative_path)
            .cmp(&derive_folded_key(&b.relative_path))
            .then_with(|| a.relative_path.cmp(&b.relative_path))
    });

    spec_scan.files = assign_roles(l_files, enum_mode, spec_masters, &l_regex_main_project);
    debug!(
        n_files = spec_scan.files.len(),
        n_dirs = spec_scan.dirs.len(),
        cnt_excluded = spec_scan.cnt_excluded,
        "source scanned"
    );
    Ok(spec_scan)
}

fn walk_directory(
    path_dir: &Path,
    path_rel: &Path,
    spec_matcher: &SpecExclusionMatcher,
    spec_scan: &mut SpecSourceScan,
    l_files: &mut Vec<SpecSourceFile>,
) {
    let iter_entries = match fs::read_dir(path_dir) {
        Ok(iter) => iter,
        Err(e) => {
            _add_scan_warning(
                spec_scan,
                format!("Failed to read directory {} ({e})", path_dir.display()),
            );
            return;
        }
    };

    let mut l_dirs: Vec<(String, PathBuf)> = Vec::new();
    let mut l_names_file: Vec<(String, PathBuf)> = Vec::new();
    for _entry_res in iter_entries {
        let entry = match _entry_res {
            Ok(v) => v,
            Err(e) => {
                _add_scan_warning(
                    spec_scan,
                    format!(
                        "Failed to read directory entry under {} ({e})",
                        path_dir.display()
                    ),
                );
                continue;
            }
        };
        let path_entry = entry.path();
        let c_name = entry.file_name().to_string_lossy().to_string();
        let cfg_file_type = match entry.file_type() {
            Ok(v) => v,
            Err(e) => {
                _add_scan_warning(
                    spec_scan,
                    format!("Failed to inspect {} ({e})", path_entry.display()),
                );
                continue;
            }
        };

        if cfg_file_type.is_dir() {
            l_dirs.push((c_name, path_entry));
        } else if cfg_file_type.is_symlink() && path_entry.is_dir() {
            _add_scan_warning(
                spec_scan,
                format!("Symlinked directory skipped: {}", path_entry.display()),
            );
        } else if cfg_file_type.is_file() || (cfg_file_type.is_symlink() && path_entry.is_file())
        {
            l_names_file.push((c_name, path_entry));
        } else {
            _add_scan_warning(
                spec_scan,
                format!("Special file skipped: {}", path_entry.display()),
            );
        }
    }

    l_dirs.sort_by(|a, b| a.0.cmp(&b.0));
    l_names_file.sort_by(|a, b| a.0.cmp(&b.0));

    for (c_name, path_file) in l_names_file {
        if spec_matcher.is_excluded_file(&c_name) {
            debug!(path = %path_file.display(), "excluded file");
            spec_scan.cnt_excluded += 1;
            continue;
        }
        l_files.push(SpecSourceFile::from_paths(path_file, path_rel.join(&c_name)));
    }

    for (c_name, path_dir_sub) in l_dirs {
        if spec_matcher.is_excluded_dir(&c_name) {
            debug!(path = %path_dir_sub.display(), "excluded folder");
            spec_scan.cnt_excluded += 1;
            continue;
        }
        let path_rel_sub = path_rel.join(&c_name);
        spec_scan.dirs.push(path_rel_sub.clone());
        walk_directory(&path_dir_sub, &path_rel_sub, spec_matcher, spec_scan, l_files);
    }
}

fn _add_scan_warning(spec_scan: &mut SpecSourceScan, warning: String) {
    warn!("{warning}");
    spec_scan.warnings.push(warning);
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Roles

fn _compile_main_project_patterns() -> DesignCopyResult<Vec<Regex>> {
    TUP_PATTERNS_MAIN_PROJECT_FILE
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| DesignCopyError::InvalidPattern {
                pattern: (*pattern).to_string(),
                message: e.to_string(),
            })
        })
        .collect()
}

fn _is_named_any(spec_file: &SpecSourceFile, l_names: &[String]) -> bool {
    let c_name = spec_file.file_name().to_lowercase();
    l_names.iter().any(|n| n.to_lowercase() == c_name)
}

fn _is_main_project_file(spec_file: &SpecSourceFile, l_regex: &[Regex]) -> bool {
    let c_stem = spec_file
        .original_path
        .file_stem()
        .map(|v| v.to_string_lossy().to_string())
        .unwrap_or_default();
    l_regex.iter().any(|r| r.is_match(&c_stem))
}

/// Assign roles to `l_files`, which must already be in enumeration order.
fn assign_roles(
    l_files: Vec<SpecSourceFile>,
    enum_mode: EnumSourceMode,
    spec_masters: &SpecMasterRules,
    l_regex_main_project: &[Regex],
) -> Vec<SpecClassifiedFile> {
    let idx_top = match enum_mode {
        EnumSourceMode::FromTemplate => l_files
            .iter()
            .position(|f| _is_named_any(f, &spec_masters.names_sentinel_top)),
        EnumSourceMode::FromExistingProject => l_files
            .iter()
            .position(|f| f.is_at_root() && f.document_kind == EnumDocumentKind::Assembly),
    };
    let idx_project = match enum_mode {
        EnumSourceMode::FromTemplate => {
            let is_candidate = |f: &SpecSourceFile| {
                f.is_at_root() && f.document_kind == EnumDocumentKind::ProjectFile
            };
            l_files
                .iter()
                .position(|f| {
                    is_candidate(f) && _is_named_any(f, &spec_masters.names_sentinel_project)
                })
                .or_else(|| {
                    if !spec_masters.if_match_main_project_pattern {
                        return None;
                    }
                    l_files.iter().position(|f| {
                        is_candidate(f) && _is_main_project_file(f, l_regex_main_project)
                    })
                })
        }
        EnumSourceMode::FromExistingProject => l_files
            .iter()
            .position(|f| f.is_at_root() && f.document_kind == EnumDocumentKind::ProjectFile),
    };

    l_files
        .into_iter()
        .enumerate()
        .map(|(n_idx, source)| {
            let role = if Some(n_idx) == idx_top {
                EnumFileRole::TopMaster
            } else if Some(n_idx) == idx_project {
                EnumFileRole::ProjectMaster
            } else if source.document_kind.is_cad_document() {
                EnumFileRole::Satellite
            } else {
                EnumFileRole::PassThrough
            };
            SpecClassifiedFile {
                source,
                role,
                is_selected: true,
            }
        })
        .collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::path::{Path, PathBuf};

    use super::scan_source;
    use crate::spec::{
        EnumFileRole, EnumSelection, EnumSourceMode, SpecExclusionRules, SpecMasterRules,
    };
    use crate::test_util::{TestDir, write_text};

    fn relative_names(src: &Path, mode: EnumSourceMode) -> Vec<String> {
        scan_source(
            src,
            mode,
            &SpecExclusionRules::default(),
            &SpecMasterRules::default(),
        )
        .expect("scan")
        .files
        .iter()
        .map(|f| f.source.relative_path.to_string_lossy().replace('\\', "/"))
        .collect()
    }

    #[test]
    fn scan_excludes_transient_files_and_folders() {
        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        write_text(&src.join("Module_.iam"), "top");
        write_text(&src.join("~lock.iam"), "x");
        write_text(&src.join(".hidden.ipt"), "x");
        write_text(&src.join("Bracket.ipt.bak"), "x");
        write_text(&src.join("Bracket.v1"), "x");
        write_text(&src.join("Bracket.v3.ipt"), "x");
        write_text(&src.join("Session.lck"), "x");
        write_text(&src.join("_V/Bracket.ipt"), "x");
        write_text(&src.join("Parts/OldVersions/Bracket.ipt"), "x");
        write_text(&src.join("Parts/oldversions/Plate.ipt"), "x");
        write_text(&src.join("Parts/Bracket.ipt"), "ok");

        let names = relative_names(&src, EnumSourceMode::FromTemplate);
        assert_eq!(names, vec!["Module_.iam", "Parts/Bracket.ipt"]);
    }

    #[test]
    fn version_marker_must_be_a_whole_segment() {
        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        write_text(&src.join("Shaft.v2mount.ipt"), "x");
        write_text(&src.join("Shaft.ipt.V12"), "x");
        write_text(&src.join("Shaft.v7.ipt"), "x");
        write_text(&src.join("Valve.ipt"), "x");

        let names = relative_names(&src, EnumSourceMode::FromTemplate);
        assert_eq!(names, vec!["Shaft.v2mount.ipt", "Valve.ipt"]);
    }

    #[test]
    fn scan_user_patterns_extend_exclusions() {
        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        write_text(&src.join("Module_.iam"), "top");
        write_text(&src.join("Notes.docx"), "x");
        write_text(&src.join("Readme.txt"), "x");

        let spec_exclusions = SpecExclusionRules {
            patterns_exclude_files: Some(vec!["*.docx".to_string()]),
            ..SpecExclusionRules::default()
        };
        let spec_scan = scan_source(
            &src,
            EnumSourceMode::FromTemplate,
            &spec_exclusions,
            &SpecMasterRules::default(),
        )
        .expect("scan");
        assert_eq!(spec_scan.files.len(), 2);
        assert_eq!(spec_scan.cnt_excluded, 1);
    }

    #[test]
    fn scan_order_is_deterministic_by_relative_path() {
        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        write_text(&src.join("b.ipt"), "x");
        write_text(&src.join("A/z.ipt"), "x");
        write_text(&src.join("a.ipt"), "x");
        write_text(&src.join("C/sub/k.ipt"), "x");

        let names_first = relative_names(&src, EnumSourceMode::FromTemplate);
        let names_second = relative_names(&src, EnumSourceMode::FromTemplate);
        assert_eq!(names_first, names_second);
        assert_eq!(names_first, vec!["a.ipt", "A/z.ipt", "b.ipt", "C/sub/k.ipt"]);
    }

    #[test]
    fn scan_template_masters_by_sentinel() {
        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        write_text(&src.join("Module_.iam"), "top");
        write_text(&src.join("Sub/Module_.iam"), "second sentinel");
        write_text(&src.join("Module_.ipj"), "project");
        write_text(&src.join("Bracket.ipt"), "x");
        write_text(&src.join("Readme.txt"), "x");

        let spec_scan = scan_source(
            &src,
            EnumSourceMode::FromTemplate,
            &SpecExclusionRules::default(),
            &SpecMasterRules::default(),
        )
        .expect("scan");

        let n_top = spec_scan
            .files
            .iter()
            .filter(|f| f.role == EnumFileRole::TopMaster)
            .count();
        let n_project = spec_scan
            .files
            .iter()
            .filter(|f| f.role == EnumFileRole::ProjectMaster)
            .count();
        assert_eq!(n_top, 1);
        assert_eq!(n_project, 1);
        assert_eq!(
            spec_scan.top_master().expect("top").source.relative_path,
            PathBuf::from("Module_.iam")
        );
        let role_of = |name: &str| {
            spec_scan
                .files
                .iter()
                .find(|f| f.source.relative_path == Path::new(name))
                .map(|f| f.role)
        };
        assert_eq!(role_of("Sub/Module_.iam"), Some(EnumFileRole::Satellite));
        assert_eq!(role_of("Bracket.ipt"), Some(EnumFileRole::Satellite));
        assert_eq!(role_of("Readme.txt"), Some(EnumFileRole::PassThrough));
    }

    #[test]
    fn scan_template_project_file_matches_library_pattern() {
        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        write_text(&src.join("Module_.iam"), "top");
        write_text(&src.join("Library_2023.ipj"), "project");
        write_text(&src.join("Other.ipj"), "other");

        let spec_scan = scan_source(
            &src,
            EnumSourceMode::FromTemplate,
            &SpecExclusionRules::default(),
            &SpecMasterRules::default(),
        )
        .expect("scan");
        assert_eq!(
            spec_scan
                .project_master()
                .expect("project master")
                .source
                .relative_path,
            PathBuf::from("Library_2023.ipj")
        );
    }

    #[test]
    fn scan_existing_project_takes_first_root_documents() {
        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        write_text(&src.join("Zeta.iam"), "x");
        write_text(&src.join("Alpha.iam"), "x");
        write_text(&src.join("Sub/Aaa.iam"), "x");
        write_text(&src.join("Proj.ipj"), "x");

        let spec_scan = scan_source(
            &src,
            EnumSourceMode::FromExistingProject,
            &SpecExclusionRules::default(),
            &SpecMasterRules::default(),
        )
        .expect("scan");
        assert_eq!(
            spec_scan.top_master().expect("top").source.relative_path,
            PathBuf::from("Alpha.iam")
        );
        assert_eq!(
            spec_scan
                .project_master()
                .expect("project")
                .source
                .relative_path,
            PathBuf::from("Proj.ipj")
        );
    }

    #[test]
    fn scan_missing_root_is_empty() {
        let tmp = TestDir::new();
        let spec_scan = scan_source(
            &tmp.path().join("missing"),
            EnumSourceMode::FromTemplate,
            &SpecExclusionRules::default(),
            &SpecMasterRules::default(),
        )
        .expect("scan");
        assert!(spec_scan.is_empty());
        assert!(spec_scan.dirs.is_empty());
    }

    #[test]
    fn scan_collects_empty_folders_and_applies_selection() {
        let tmp = TestDir::new();
        let src = tmp.path().join("src");
        write_text(&src.join("Module_.iam"), "top");
        write_text(&src.join("Parts/Bracket.ipt"), "x");
        std::fs::create_dir_all(src.join("Docs/Empty")).expect("mkdir");

        let mut spec_scan = scan_source(
            &src,
            EnumSourceMode::FromTemplate,
            &SpecExclusionRules::default(),
            &SpecMasterRules::default(),
        )
        .expect("scan");
        assert_eq!(
            spec_scan.dirs,
            vec![
                PathBuf::from("Docs"),
                PathBuf::from("Docs/Empty"),
                PathBuf::from("Parts")
            ]
        );

        spec_scan.apply_selection(&EnumSelection::Except(BTreeSet::from([PathBuf::from(
            "Parts/Bracket.ipt",
        )])));
        assert_eq!(spec_scan.cnt_selected(), 1);
        assert_eq!(
            spec_scan.top_master().expect("top").role,
            EnumFileRole::TopMaster
        );
    }
}
