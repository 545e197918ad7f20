//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "modkit-design-copy",
    version,
    about = "Copy a CAD module design under a new project identity",
    long_about = "Copy a CAD module template or an existing module to a new location.\n\n\
                  Masters are renamed to the target identity number, satellites get the\n\
                  configured affixes, and every in-tree reference is repointed to the copy."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for warnings only).
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// TOML configuration file; flags override its values.
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Classify the source tree and preview destination names.
    Scan(ScanArgs),

    /// Copy the design to its destination.
    Copy(CopyArgs),
}

#[derive(Args, Clone)]
pub struct SourceArgs {
    /// Template or existing module folder.
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// How masters are detected in the source.
    #[arg(long = "mode", value_enum, default_value = "template")]
    pub mode: SourceModeArg,

    /// Extra exclusion glob on file names (repeatable).
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Leave files whose source-relative path matches this glob (repeatable).
    #[arg(long = "deselect", value_name = "GLOB")]
    pub deselect: Vec<String>,
}

#[derive(Args, Clone, Default)]
pub struct NamingArgs {
    /// Literal prefix for renamed satellites.
    #[arg(long = "prefix")]
    pub prefix: Option<String>,

    /// Literal suffix for renamed satellites.
    #[arg(long = "suffix")]
    pub suffix: Option<String>,

    /// Prefix satellites with the identity number.
    #[arg(long = "project-prefix")]
    pub project_prefix: bool,

    /// Fixed suffix such as A, B, C, LH, RH, TYP or a custom value.
    #[arg(long = "fixed-suffix", value_name = "S")]
    pub fixed_suffix: Option<String>,

    /// Append `_01`, `_02`, ... to renamed satellites.
    #[arg(long = "incremental")]
    pub incremental: bool,

    /// Case-insensitive text to replace in new file names.
    #[arg(long = "search", value_name = "S")]
    pub search: Option<String>,

    /// Replacement for `--search`.
    #[arg(long = "replace", value_name = "R", requires = "search")]
    pub replace: Option<String>,

    /// Apply satellite rules to non-CAD files as well.
    #[arg(long = "include-non-cad")]
    pub include_non_cad: bool,

    /// Keep master file names unchanged.
    #[arg(long = "keep-master-names")]
    pub keep_master_names: bool,
}

#[derive(Parser)]
pub struct ScanArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Project number (up to 5 digits); enables the name preview.
    #[arg(long = "project", requires_all = ["reference", "module"])]
    pub project: Option<String>,

    /// Reference number (up to 2 digits).
    #[arg(long = "reference", requires = "project")]
    pub reference: Option<String>,

    /// Module number (up to 2 digits).
    #[arg(long = "module", requires = "project")]
    pub module: Option<String>,

    #[command(flatten)]
    pub naming: NamingArgs,

    /// Print the classification as JSON instead of a table.
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Parser)]
pub struct CopyArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Exact destination folder.
    #[arg(long = "dest", value_name = "DIR", conflicts_with = "dest_base")]
    pub dest: Option<PathBuf>,

    /// Base folder; the destination becomes `{base}/{project}/REF{rr}/M{mm}`.
    #[arg(long = "dest-base", value_name = "DIR")]
    pub dest_base: Option<PathBuf>,

    /// Project number (up to 5 digits).
    #[arg(long = "project")]
    pub project: String,

    /// Reference number (up to 2 digits).
    #[arg(long = "reference")]
    pub reference: String,

    /// Module number (up to 2 digits).
    #[arg(long = "module")]
    pub module: String,

    #[command(flatten)]
    pub naming: NamingArgs,

    /// Maximum worker threads for non-document copies.
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Folder holding a project file to use when the copy has none.
    #[arg(long = "project-template", value_name = "DIR")]
    pub project_template: Option<PathBuf>,

    /// Do not write identity properties into the top assembly.
    #[arg(long = "no-properties")]
    pub no_properties: bool,

    /// Print the report as JSON instead of a summary.
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SourceModeArg {
    /// Library template; masters are found by sentinel name.
    Template,
    /// Existing module; masters are the root assembly and project file.
    Existing,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
