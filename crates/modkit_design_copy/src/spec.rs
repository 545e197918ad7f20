//! Design-copy models, options and top-level error types.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conf::{
    N_WIDTH_MODULE, N_WIDTH_PROJECT, N_WIDTH_REFERENCE, TUP_EXTENSIONS_ASSEMBLY,
    TUP_EXTENSIONS_DRAWING, TUP_EXTENSIONS_PART, TUP_EXTENSIONS_PRESENTATION,
    TUP_EXTENSIONS_PROJECT_FILE, TUP_EXTENSIONS_TRANSIENT, TUP_FIXED_SUFFIXES,
    TUP_NAMES_EXCLUDED_DIR, TUP_NAMES_SENTINEL_PROJECT, TUP_NAMES_SENTINEL_TOP,
    TUP_PREFIXES_TEMP_FILE, TUP_SUFFIXES_SPECIAL,
};

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Where the source directory comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumSourceMode {
    /// Library template module; masters are found by sentinel names.
    #[default]
    FromTemplate,
    /// Existing project module; masters are the first root-level documents.
    FromExistingProject,
}

/// Document kind derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumDocumentKind {
    Assembly,
    Part,
    Drawing,
    Presentation,
    ProjectFile,
    Other,
}

impl EnumDocumentKind {
    /// Classify a lowercase extension without the leading dot.
    pub fn from_extension(extension: &str) -> Self {
        let c_ext = extension.to_ascii_lowercase();
        let c_ext = c_ext.as_str();
        if TUP_EXTENSIONS_ASSEMBLY.contains(&c_ext) {
            Self::Assembly
        } else if TUP_EXTENSIONS_PART.contains(&c_ext) {
            Self::Part
        } else if TUP_EXTENSIONS_DRAWING.contains(&c_ext) {
            Self::Drawing
        } else if TUP_EXTENSIONS_PRESENTATION.contains(&c_ext) {
            Self::Presentation
        } else if TUP_EXTENSIONS_PROJECT_FILE.contains(&c_ext) {
            Self::ProjectFile
        } else {
            Self::Other
        }
    }

    /// Documents opened through the authoring service.
    pub fn is_cad_document(self) -> bool {
        matches!(
            self,
            Self::Assembly | Self::Part | Self::Drawing | Self::Presentation
        )
    }

    /// Documents that reference others but are never referenced themselves.
    pub fn is_secondary(self) -> bool {
        matches!(self, Self::Drawing | Self::Presentation)
    }
}

/// Role of a file in a design copy run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumFileRole {
    TopMaster,
    ProjectMaster,
    Satellite,
    PassThrough,
}

impl EnumFileRole {
    pub fn is_master(self) -> bool {
        matches!(self, Self::TopMaster | Self::ProjectMaster)
    }
}

/// Pattern matching mode for user exclusion and selection lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumPatternMode {
    /// Shell-like wildcards (`*`, `?`, character classes).
    #[default]
    Glob,
    /// Regular expression pattern.
    Regex,
    /// Substring match.
    Literal,
}

/// Per-item failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumFailureKind {
    DirectoryCreateFailed,
    FileCopyFailed,
    ReferenceRepairFailed,
    PropertyStampFailed,
}

/// Final state of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumRunStatus {
    #[default]
    Completed,
    CompletedWithFailures,
    NoFilesFound,
    Cancelled,
    Failed,
}

/// Fixed suffix appended to renamed satellites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EnumFixedSuffix {
    /// One of [`TUP_FIXED_SUFFIXES`].
    Listed(String),
    /// Free-form value, always starting with `_`.
    Custom(String),
}

impl EnumFixedSuffix {
    /// Parse user input, matching the built-in list case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        let c_value = value.trim();
        if c_value.is_empty() || c_value == "_" {
            return None;
        }
        let c_normalized = if c_value.starts_with('_') {
            c_value.to_string()
        } else {
            format!("_{c_value}")
        };
        let listed = TUP_FIXED_SUFFIXES
            .iter()
            .find(|c_listed| c_listed.eq_ignore_ascii_case(&c_normalized));
        Some(match listed {
            Some(c_listed) => Self::Listed((*c_listed).to_string()),
            None => Self::Custom(c_normalized),
        })
    }

    pub fn as_suffix(&self) -> &str {
        match self {
            Self::Listed(v) | Self::Custom(v) => v,
        }
    }
}

/// Which discovered files take part in the run, by source-relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EnumSelection {
    #[default]
    All,
    Only(BTreeSet<PathBuf>),
    Except(BTreeSet<PathBuf>),
}

impl EnumSelection {
    pub fn is_selected(&self, relative_path: &Path) -> bool {
        match self {
            Self::All => true,
            Self::Only(set_paths) => set_paths.contains(relative_path),
            Self::Except(set_paths) => !set_paths.contains(relative_path),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Identity

/// Target project / reference / module numbers, zero-padded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecIdentity {
    project: String,
    reference: String,
    module: String,
}

impl SpecIdentity {
    /// Validate and pad the three identity parts.
    ///
    /// Each part must be ASCII digits and fit its width once leading zeros are
    /// dropped (project 5, reference 2, module 2).
    pub fn new(project: &str, reference: &str, module: &str) -> Result<Self, DesignCopyError> {
        Ok(Self {
            project: _normalize_identity_part("project", project, N_WIDTH_PROJECT)?,
            reference: _normalize_identity_part("reference", reference, N_WIDTH_REFERENCE)?,
            module: _normalize_identity_part("module", module, N_WIDTH_MODULE)?,
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// `12345` / `1` / `2` -> `123450102`.
    pub fn identity_number(&self) -> String {
        format!("{}{}{}", self.project, self.reference, self.module)
    }

    /// Properties stamped on the copied top master.
    pub fn derive_properties(&self, date_created: NaiveDate) -> Vec<(String, String)> {
        let c_identity_number = self.identity_number();
        vec![
            ("Part Number".to_string(), c_identity_number.clone()),
            ("Title".to_string(), c_identity_number),
            ("Project".to_string(), self.project.clone()),
            ("Reference".to_string(), self.reference.clone()),
            ("Module".to_string(), self.module.clone()),
            (
                "Creation Date".to_string(),
                date_created.format("%Y-%m-%d").to_string(),
            ),
        ]
    }

    /// `{base}/{project}/REF{reference}/M{module}`.
    pub fn derive_destination_root(&self, path_dir_base: &Path) -> PathBuf {
        path_dir_base
            .join(&self.project)
            .join(format!("REF{}", self.reference))
            .join(format!("M{}", self.module))
    }
}

fn _normalize_identity_part(
    field: &'static str,
    value: &str,
    n_width: usize,
) -> Result<String, DesignCopyError> {
    let c_value = value.trim();
    let err = |reason: String| DesignCopyError::InvalidIdentity {
        field,
        value: value.to_string(),
        reason,
    };
    if c_value.is_empty() {
        return Err(err("must not be empty".to_string()));
    }
    if !c_value.chars().all(|c| c.is_ascii_digit()) {
        return Err(err("must contain digits only".to_string()));
    }
    let c_significant = c_value.trim_start_matches('0');
    if c_significant.len() > n_width {
        return Err(err(format!("must fit in {n_width} digits")));
    }
    Ok(format!("{c_significant:0>n_width$}"))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Options

/// Exclusion pre-pass rules; matching entries never reach later stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecExclusionRules {
    /// File-name prefixes of lock and hidden files.
    pub prefixes_temp_file: Vec<String>,
    /// Lowercase extensions without dot; `v1`..`v9` style markers are always excluded.
    pub extensions_transient: Vec<String>,
    /// Folder names skipped at any depth (case-insensitive).
    pub names_excluded_dir: Vec<String>,
    /// Extra patterns applied to file basenames.
    pub patterns_exclude_files: Option<Vec<String>>,
    /// Interpretation of `patterns_exclude_files`.
    pub rule_pattern: EnumPatternMode,
}

impl Default for SpecExclusionRules {
    fn default() -> Self {
        Self {
            prefixes_temp_file: _to_strings(&TUP_PREFIXES_TEMP_FILE),
            extensions_transient: _to_strings(&TUP_EXTENSIONS_TRANSIENT),
            names_excluded_dir: _to_strings(&TUP_NAMES_EXCLUDED_DIR),
            patterns_exclude_files: None,
            rule_pattern: EnumPatternMode::Glob,
        }
    }
}

/// How the top assembly and the project file are detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecMasterRules {
    pub names_sentinel_top: Vec<String>,
    pub names_sentinel_project: Vec<String>,
    /// Also accept template project files matching the library naming patterns.
    pub if_match_main_project_pattern: bool,
}

impl Default for SpecMasterRules {
    fn default() -> Self {
        Self {
            names_sentinel_top: _to_strings(&TUP_NAMES_SENTINEL_TOP),
            names_sentinel_project: _to_strings(&TUP_NAMES_SENTINEL_PROJECT),
            if_match_main_project_pattern: true,
        }
    }
}

/// Case-insensitive substring replacement on the assembled file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSearchReplace {
    pub search: String,
    pub replace: String,
}

/// Rename rules for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRenameOptions {
    /// `false` keeps master names unchanged (equipment placement).
    pub if_rename_masters: bool,
    /// Apply satellite rules to non-CAD files as well.
    pub if_include_non_cad: bool,
    /// Prefix satellites with `{identity_number}_`.
    pub if_apply_project_prefix: bool,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub fixed_suffix: Option<EnumFixedSuffix>,
    /// Append `_01`, `_02`, ... in processing order.
    pub if_apply_incremental_suffix: bool,
    pub search_replace: Option<SpecSearchReplace>,
    /// Original-name endings that force `{identity_number}{suffix}`.
    pub suffixes_special: Vec<String>,
}

impl Default for SpecRenameOptions {
    fn default() -> Self {
        Self {
            if_rename_masters: true,
            if_include_non_cad: false,
            if_apply_project_prefix: false,
            prefix: None,
            suffix: None,
            fixed_suffix: None,
            if_apply_incremental_suffix: false,
            search_replace: None,
            suffixes_special: _to_strings(&TUP_SUFFIXES_SPECIAL),
        }
    }
}

/// Input options for `copy_design`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecDesignCopyOptions {
    pub exclusions: SpecExclusionRules,
    pub masters: SpecMasterRules,
    pub rename: SpecRenameOptions,
    /// Maximum worker threads for pass-through byte copies.
    pub num_workers_max: Option<usize>,
    /// Write identity properties into the copied top master.
    pub if_stamp_properties: bool,
    /// Folder whose first root-level project file is copied as
    /// `{identity_number}.ipj` when the destination root ends up without one.
    pub dir_project_template: Option<PathBuf>,
}

impl Default for SpecDesignCopyOptions {
    fn default() -> Self {
        Self {
            exclusions: SpecExclusionRules::default(),
            masters: SpecMasterRules::default(),
            rename: SpecRenameOptions::default(),
            num_workers_max: None,
            if_stamp_properties: true,
            dir_project_template: None,
        }
    }
}

/// Everything one design copy run needs besides the authoring service.
#[derive(Debug, Clone)]
pub struct SpecDesignCopyRequest {
    pub dir_source: PathBuf,
    pub dir_destination: PathBuf,
    pub identity: SpecIdentity,
    pub enum_mode: EnumSourceMode,
    pub selection: EnumSelection,
    pub options: SpecDesignCopyOptions,
}

fn _to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Files

/// One file discovered under the source root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecSourceFile {
    pub original_path: PathBuf,
    /// Path relative to the source root.
    pub relative_path: PathBuf,
    /// Lowercase extension without dot; empty when absent.
    pub extension: String,
    pub document_kind: EnumDocumentKind,
}

impl SpecSourceFile {
    pub fn from_paths(original_path: PathBuf, relative_path: PathBuf) -> Self {
        let extension = original_path
            .extension()
            .map(|v| v.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let document_kind = EnumDocumentKind::from_extension(&extension);
        Self {
            original_path,
            relative_path,
            extension,
            document_kind,
        }
    }

    pub fn file_name(&self) -> String {
        self.original_path
            .file_name()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// `true` when the file sits directly under the source root.
    pub fn is_at_root(&self) -> bool {
        self.relative_path
            .parent()
            .is_none_or(|p| p.as_os_str().is_empty())
    }
}

/// A source file with its run role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecClassifiedFile {
    #[serde(flatten)]
    pub source: SpecSourceFile,
    pub role: EnumFileRole,
    pub is_selected: bool,
}

/// One successfully written destination file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecCopiedFile {
    pub original_path: PathBuf,
    pub new_path: PathBuf,
}

/// One per-item failure with path and error text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecCopyFailure {
    pub path: PathBuf,
    pub kind: EnumFailureKind,
    pub message: String,
}

/// A reference rewritten inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecReferenceLink {
    pub from_path: PathBuf,
    pub to_path: PathBuf,
    pub to_new_path: PathBuf,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Errors that abort a run before or outside per-file work.
#[derive(Debug, Error)]
pub enum DesignCopyError {
    #[error("Source directory not found: {}", path.display())]
    SourceNotFound { path: PathBuf },
    #[error(
        "Source and destination directories overlap: {} <-> {}",
        path_source.display(),
        path_destination.display()
    )]
    SourceDestinationOverlap {
        path_source: PathBuf,
        path_destination: PathBuf,
    },
    #[error("Authoring service unavailable: {message}")]
    AuthoringServiceUnavailable { message: String },
    #[error("Invalid {field} number {value:?}: {reason}")]
    InvalidIdentity {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("Invalid pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("Failed to initialize destination {}: {message}", path.display())]
    DestinationInitFailed { path: PathBuf, message: String },
    #[error("I/O error during {operation} at {}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type DesignCopyResult<T> = Result<T, DesignCopyError>;

// #endregion
////////////////////////////////////////////////////////////////////////////////
