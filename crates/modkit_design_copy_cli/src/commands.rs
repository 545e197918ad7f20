//! `scan` and `copy` command implementations.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use modkit_design_copy::{
    CancelToken, EnumDocumentKind, EnumFileRole, EnumPatternMode, EnumSelection, EnumSourceMode,
    ProgressSink, ReportDesignCopy, SpecClassifiedFile, SpecDesignCopyOptions,
    SpecDesignCopyRequest, SpecIdentity, SpecProgressEvent, SpecSearchReplace, SpecSourceScan,
    TextLinkDocumentService, TypePatternSeq, copy_design, derive_relative_key,
    resolve_names, scan_source,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::cli::{CopyArgs, NamingArgs, ScanArgs, SourceArgs, SourceModeArg};
use crate::config::{FileConfig, parse_fixed_suffix};

/// One row of the scan preview.
#[derive(Debug, Clone, Serialize)]
pub struct ScanRow {
    pub relative_path: String,
    pub document_kind: EnumDocumentKind,
    pub role: EnumFileRole,
    pub is_selected: bool,
    /// Destination name; `None` without an identity or for deselected files.
    pub new_file_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub source: PathBuf,
    pub identity_number: Option<String>,
    pub rows: Vec<ScanRow>,
    pub cnt_excluded: u64,
    pub warnings: Vec<String>,
}

/// Classify the source and, with an identity, preview destination names.
pub fn run_scan(args: &ScanArgs, config: &FileConfig) -> Result<ScanResult> {
    let options = build_options(config, &args.source, &args.naming, None)?;
    let mut spec_scan = scan_for_args(&args.source, &options)?;
    let selection = build_selection(&spec_scan.files, &args.source.deselect)?;
    spec_scan.apply_selection(&selection);

    let identity = match (&args.project, &args.reference, &args.module) {
        (Some(project), Some(reference), Some(module)) => {
            Some(SpecIdentity::new(project, reference, module)?)
        }
        _ => None,
    };
    let spec_plan = match &identity {
        Some(identity) => Some(resolve_names(
            &spec_scan.files,
            identity,
            &options.rename,
            Path::new(""),
        )?),
        None => None,
    };

    let rows = spec_scan
        .files
        .iter()
        .map(|spec_file| ScanRow {
            relative_path: derive_relative_key(&spec_file.source.relative_path),
            document_kind: spec_file.source.document_kind,
            role: spec_file.role,
            is_selected: spec_file.is_selected,
            new_file_name: spec_plan
                .as_ref()
                .and_then(|plan| plan.lookup(&spec_file.source.original_path))
                .map(|v| v.new_file_name.clone()),
        })
        .collect();

    Ok(ScanResult {
        source: spec_scan.path_dir_src.clone(),
        identity_number: identity.map(|v| v.identity_number()),
        rows,
        cnt_excluded: spec_scan.cnt_excluded,
        warnings: spec_scan.warnings,
    })
}

/// Run a full design copy with the text link adapter.
pub fn run_copy(args: &CopyArgs, config: &FileConfig) -> Result<ReportDesignCopy> {
    let mut options = build_options(config, &args.source, &args.naming, args.workers)?;
    if let Some(v) = &args.project_template {
        options.dir_project_template = Some(v.clone());
    }
    if args.no_properties {
        options.if_stamp_properties = false;
    }
    let identity = SpecIdentity::new(&args.project, &args.reference, &args.module)?;
    let dir_destination = resolve_destination(args, config, &identity)?;

    let selection = if args.source.deselect.is_empty() {
        EnumSelection::All
    } else {
        let spec_scan = scan_for_args(&args.source, &options)?;
        build_selection(&spec_scan.files, &args.source.deselect)?
    };

    let request = SpecDesignCopyRequest {
        dir_source: args.source.source.clone(),
        dir_destination,
        identity,
        enum_mode: source_mode(args.source.mode),
        selection,
        options,
    };
    info!(
        source = %request.dir_source.display(),
        destination = %request.dir_destination.display(),
        "starting design copy"
    );

    let mut service = TextLinkDocumentService::new();
    let mut progress = LogProgress::default();
    Ok(copy_design(
        &mut service,
        &request,
        &mut progress,
        &CancelToken::new(),
    ))
}

/// Library defaults, then the config file, then command-line flags.
pub fn build_options(
    config: &FileConfig,
    source: &SourceArgs,
    naming: &NamingArgs,
    workers: Option<usize>,
) -> Result<SpecDesignCopyOptions> {
    let mut options = SpecDesignCopyOptions::default();
    config.apply_to(&mut options)?;

    if !source.exclude.is_empty() {
        if options.exclusions.rule_pattern != EnumPatternMode::Glob
            && options.exclusions.patterns_exclude_files.is_some()
        {
            bail!("--exclude takes globs but the config file sets another pattern_mode");
        }
        options.exclusions.rule_pattern = EnumPatternMode::Glob;
        options
            .exclusions
            .patterns_exclude_files
            .get_or_insert_with(Vec::new)
            .extend(source.exclude.iter().cloned());
    }

    let rename = &mut options.rename;
    if let Some(v) = &naming.prefix {
        rename.prefix = Some(v.clone());
    }
    if let Some(v) = &naming.suffix {
        rename.suffix = Some(v.clone());
    }
    if naming.project_prefix {
        rename.if_apply_project_prefix = true;
    }
    if let Some(v) = &naming.fixed_suffix {
        rename.fixed_suffix = Some(parse_fixed_suffix(v)?);
    }
    if naming.incremental {
        rename.if_apply_incremental_suffix = true;
    }
    if let Some(search) = &naming.search {
        rename.search_replace = Some(SpecSearchReplace {
            search: search.clone(),
            replace: naming.replace.clone().unwrap_or_default(),
        });
    }
    if naming.include_non_cad {
        rename.if_include_non_cad = true;
    }
    if naming.keep_master_names {
        rename.if_rename_masters = false;
    }

    if workers.is_some() {
        options.num_workers_max = workers;
    }
    Ok(options)
}

/// `Except` set of files whose relative path matches any `--deselect` glob.
pub fn build_selection(files: &[SpecClassifiedFile], deselect: &[String]) -> Result<EnumSelection> {
    let Some(patterns) = TypePatternSeq::compile(Some(deselect), EnumPatternMode::Glob)? else {
        return Ok(EnumSelection::All);
    };
    let set_paths: BTreeSet<PathBuf> = files
        .iter()
        .filter(|v| patterns.is_match(&derive_relative_key(&v.source.relative_path)))
        .map(|v| v.source.relative_path.clone())
        .collect();
    debug!(cnt_deselected = set_paths.len(), "selection built");
    Ok(EnumSelection::Except(set_paths))
}

fn resolve_destination(
    args: &CopyArgs,
    config: &FileConfig,
    identity: &SpecIdentity,
) -> Result<PathBuf> {
    if let Some(dest) = &args.dest {
        return Ok(dest.clone());
    }
    match args.dest_base.as_ref().or(config.paths.dest_base.as_ref()) {
        Some(base) => Ok(identity.derive_destination_root(base)),
        None => bail!("no destination: pass --dest or --dest-base, or set [paths] dest_base"),
    }
}

fn scan_for_args(source: &SourceArgs, options: &SpecDesignCopyOptions) -> Result<SpecSourceScan> {
    if !source.source.is_dir() {
        bail!("source directory not found: {}", source.source.display());
    }
    scan_source(
        &source.source,
        source_mode(source.mode),
        &options.exclusions,
        &options.masters,
    )
    .with_context(|| format!("failed to scan {}", source.source.display()))
}

fn source_mode(mode: SourceModeArg) -> EnumSourceMode {
    match mode {
        SourceModeArg::Template => EnumSourceMode::FromTemplate,
        SourceModeArg::Existing => EnumSourceMode::FromExistingProject,
    }
}

/// Forwards progress to the log, once per percent step.
#[derive(Debug, Default)]
struct LogProgress {
    n_percent_last: Option<u8>,
}

impl ProgressSink for LogProgress {
    fn on_progress(&mut self, event: &SpecProgressEvent) {
        if !event.file_current.is_empty() {
            debug!(percent = event.percent, file = %event.file_current, "{}", event.message);
        }
        if self.n_percent_last != Some(event.percent) {
            self.n_percent_last = Some(event.percent);
            info!(percent = event.percent, "{}", event.message);
        }
    }
}

