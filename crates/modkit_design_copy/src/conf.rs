//! Built-in constants for classification and naming.

////////////////////////////////////////////////////////////////////////////////
// #region MasterDetection

/// File names that mark the template top assembly.
pub const TUP_NAMES_SENTINEL_TOP: [&str; 1] = ["Module_.iam"];

/// File names that mark the template project file.
pub const TUP_NAMES_SENTINEL_PROJECT: [&str; 1] = ["Module_.ipj"];

/// Name patterns of the main project file shipped with template libraries.
pub const TUP_PATTERNS_MAIN_PROJECT_FILE: [&str; 4] =
    [r"_202", r"^\d{5}-\d{2}-\d{2}", r"(?i)module", r"^\d{9}$"];

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Exclusions

/// Leading characters of editor lock files and hidden files.
pub const TUP_PREFIXES_TEMP_FILE: [&str; 2] = ["~", "."];

/// Lowercase extensions of transient, backup and PLM work files.
pub const TUP_EXTENSIONS_TRANSIENT: [&str; 6] = ["bak", "vbak", "v", "lck", "log", "tmp"];

/// PLM version marker as a whole dot segment (`Part.v3.ipt`, `Part.ipt.v1`).
pub const C_PATTERN_VERSION_MARKER: &str = r"(?i)\.v\d+(?:\.|$)";

/// Folder names never descended into.
pub const TUP_NAMES_EXCLUDED_DIR: [&str; 2] = ["_V", "OldVersions"];

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Naming

pub const N_WIDTH_PROJECT: usize = 5;
pub const N_WIDTH_REFERENCE: usize = 2;
pub const N_WIDTH_MODULE: usize = 2;

/// Trailing two-digit counter added by the incremental suffix rule.
pub const C_PATTERN_INCREMENTAL_SUFFIX: &str = r"_\d{2}$";

/// Fixed suffixes offered by default.
pub const TUP_FIXED_SUFFIXES: [&str; 6] = ["_A", "_B", "_C", "_LH", "_RH", "_TYP"];

/// Spreadsheet companions renamed to `{identity_number}{suffix}`.
pub const TUP_SUFFIXES_SPECIAL: [&str; 2] = [
    "_Décompte de DXF_DXF Count.xlsx",
    "_Liste de vérification_Check List.xlsm",
];

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Documents

pub const TUP_EXTENSIONS_ASSEMBLY: [&str; 1] = ["iam"];
pub const TUP_EXTENSIONS_PART: [&str; 1] = ["ipt"];
pub const TUP_EXTENSIONS_DRAWING: [&str; 2] = ["idw", "dwg"];
pub const TUP_EXTENSIONS_PRESENTATION: [&str; 1] = ["ipn"];
pub const TUP_EXTENSIONS_PROJECT_FILE: [&str; 1] = ["ipj"];

/// Marker of a reference line in a text link document.
pub const C_MARKER_REFERENCE_LINE: &str = "@ref";

/// Marker of a `name=value` property line in a text link document.
pub const C_MARKER_PROPERTY_LINE: &str = "@prop";

// #endregion
////////////////////////////////////////////////////////////////////////////////
