//! Design copy orchestration.
//!
//! One run walks these phases in order:
//! 1. validation, source scan and selection,
//! 2. name resolution and destination folder creation,
//! 3. orphan byte copies, then reachable documents leaves first,
//! 4. drawings and presentations, then non-document files,
//! 5. the project file fallback, then a repair pass over every copied
//!    document,
//! 6. identity properties stamped into the copied top master.
//!
//! Setup errors abort the run with a `Failed` report. Per-file errors are
//! recorded and the run moves on.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{debug, error, info, info_span, warn};

use crate::authoring::{DocumentAuthoringService, SilentSession, with_document};
use crate::conf::TUP_EXTENSIONS_PROJECT_FILE;
use crate::classify::scan_source;
use crate::materialize::{derive_directory_set, materialize_directories};
use crate::progress::{CancelToken, EnumPhase, ProgressSink, ProgressTracker};
use crate::relink::{collect_reachable, copy_document, repair_document};
use crate::rename::{SpecRenameAssignment, SpecRenamePlan, resolve_names};
use crate::report::{ReportDesignCopy, ReportDesignCopyBuilder};
use crate::resolve::{FolderLookupCache, ReferenceResolver};
use crate::spec::{
    DesignCopyError, DesignCopyResult, EnumFailureKind, EnumFileRole, SpecDesignCopyRequest,
};
use crate::util::{
    calculate_worker_limit, copy_file_with_metadata, derive_path_key, derive_relative_key,
    is_overlap, validate_destination_path_safety,
};

#[derive(Debug, Clone)]
struct SpecByteCopyTask {
    path_file_src: PathBuf,
    path_file_dst: PathBuf,
    c_label: String,
    if_skip_existing: bool,
}

#[derive(Debug)]
enum EnumByteCopyOutcome {
    Copied,
    Skipped,
    Cancelled,
    Failed(String),
}

struct SpecRunContext<'a> {
    path_dir_src: &'a Path,
    path_dir_dst: &'a Path,
    spec_plan: &'a SpecRenamePlan,
    cancel: &'a CancelToken,
    n_workers_max: usize,
    cache: FolderLookupCache,
}

/// Copy a design from `request.dir_source` to `request.dir_destination`.
///
/// Every authoring call goes through `service` on the calling thread inside a
/// silent session. `progress` receives at least one event per processed file
/// and a final 100% event. `cancel` is checked between files.
///
/// Never returns an error: setup failures produce a `Failed` report carrying
/// the message, and per-file failures are listed in the report.
pub fn copy_design<S, P>(
    service: &mut S,
    request: &SpecDesignCopyRequest,
    progress: &mut P,
    cancel: &CancelToken,
) -> ReportDesignCopy
where
    S: DocumentAuthoringService + ?Sized,
    P: ProgressSink + ?Sized,
{
    let span = info_span!(
        "copy_design",
        identity = %request.identity.identity_number(),
        source = %request.dir_source.display(),
        destination = %request.dir_destination.display(),
    );
    let _guard = span.enter();

    let mut builder_report = ReportDesignCopyBuilder::start();
    let mut tracker = ProgressTracker::new(progress);
    if let Err(e) = run_design_copy(service, request, &mut tracker, cancel, &mut builder_report) {
        error!(error = %e, "design copy aborted");
        builder_report.set_fatal(e.to_string());
    }

    let report = builder_report.build();
    tracker.report(100, "Done", "");
    info!("{report}");
    report
}

fn run_design_copy<S, P>(
    service: &mut S,
    request: &SpecDesignCopyRequest,
    tracker: &mut ProgressTracker<'_, P>,
    cancel: &CancelToken,
    builder_report: &mut ReportDesignCopyBuilder,
) -> DesignCopyResult<()>
where
    S: DocumentAuthoringService + ?Sized,
    P: ProgressSink + ?Sized,
{
    let path_dir_src = request.dir_source.as_path();
    let path_dir_dst = request.dir_destination.as_path();

    tracker.report_phase(EnumPhase::Scan);
    if !path_dir_src.is_dir() {
        return Err(DesignCopyError::SourceNotFound {
            path: path_dir_src.to_path_buf(),
        });
    }
    if is_overlap(path_dir_src, path_dir_dst) {
        return Err(DesignCopyError::SourceDestinationOverlap {
            path_source: path_dir_src.to_path_buf(),
            path_destination: path_dir_dst.to_path_buf(),
        });
    }

    let mut spec_scan = scan_source(
        path_dir_src,
        request.enum_mode,
        &request.options.exclusions,
        &request.options.masters,
    )?;
    spec_scan.apply_selection(&request.selection);
    for c_warning in spec_scan.warnings.drain(..) {
        builder_report.add_warning(c_warning);
    }
    let (_, n_scan_end) = EnumPhase::Scan.span();
    tracker.report(n_scan_end, "Scan complete", "");
    info!(
        cnt_files = spec_scan.files.len(),
        cnt_selected = spec_scan.cnt_selected(),
        cnt_excluded = spec_scan.cnt_excluded,
        "source scanned"
    );
    if spec_scan.cnt_selected() == 0 {
        info!("no files selected; nothing to copy");
        builder_report.mark_no_files();
        return Ok(());
    }

    let spec_plan = resolve_names(
        &spec_scan.files,
        &request.identity,
        &request.options.rename,
        path_dir_dst,
    )?;
    for spec_assignment in spec_plan.assignments.iter().filter(|v| v.disambiguated) {
        builder_report.add_warning(format!(
            "Destination name collision: {} renamed to {}",
            spec_assignment.relative_path.display(),
            spec_assignment.new_file_name
        ));
    }

    service
        .connect()
        .map_err(|e| DesignCopyError::AuthoringServiceUnavailable {
            message: e.to_string(),
        })?;
    init_destination_root(path_dir_dst)?;

    let mut session = SilentSession::enter(service).map_err(|e| {
        DesignCopyError::AuthoringServiceUnavailable {
            message: e.to_string(),
        }
    })?;
    let svc: &mut S = &mut session;

    tracker.report_phase(EnumPhase::Directories);
    let set_dirs = derive_directory_set(&spec_scan.dirs, &spec_plan);
    let n_dirs_created = materialize_directories(path_dir_dst, &set_dirs, builder_report);
    info!(cnt_created = n_dirs_created, cnt_total = set_dirs.len(), "folders ready");

    let mut spec_ctx = SpecRunContext {
        path_dir_src,
        path_dir_dst,
        spec_plan: &spec_plan,
        cancel,
        n_workers_max: calculate_worker_limit(request.options.num_workers_max),
        cache: FolderLookupCache::new(path_dir_dst),
    };

    let l_reachable: Vec<PathBuf> = match spec_plan
        .assignments
        .iter()
        .find(|v| v.role == EnumFileRole::TopMaster && v.document_kind.is_cad_document())
    {
        Some(spec_top) => collect_reachable(&mut *svc, &spec_top.original_path, &spec_plan, path_dir_src),
        None => Vec::new(),
    };
    let set_reachable: HashSet<String> = l_reachable.iter().map(|v| derive_path_key(v)).collect();

    let l_orphans: Vec<SpecByteCopyTask> = spec_plan
        .assignments
        .iter()
        .filter(|v| v.document_kind.is_cad_document() && !v.document_kind.is_secondary())
        .filter(|v| !set_reachable.contains(&derive_path_key(&v.original_path)))
        .map(|v| _to_byte_copy_task(v, true))
        .collect();
    let l_primary: Vec<&SpecRenameAssignment> = l_reachable
        .iter()
        .filter_map(|v| spec_plan.lookup(v))
        .collect();
    let l_secondary: Vec<&SpecRenameAssignment> = spec_plan
        .assignments
        .iter()
        .filter(|v| v.document_kind.is_secondary())
        .collect();
    let (l_project_master, l_pass_through): (Vec<&SpecRenameAssignment>, Vec<&SpecRenameAssignment>) =
        spec_plan
            .assignments
            .iter()
            .filter(|v| !v.document_kind.is_cad_document())
            .partition(|v| v.role == EnumFileRole::ProjectMaster);
    let l_pass_through: Vec<SpecByteCopyTask> = l_pass_through
        .into_iter()
        .chain(l_project_master)
        .map(|v| _to_byte_copy_task(v, false))
        .collect();

    info!(
        cnt_orphans = l_orphans.len(),
        cnt_primary = l_primary.len(),
        cnt_secondary = l_secondary.len(),
        cnt_pass_through = l_pass_through.len(),
        "copy plan ready"
    );

    if !flush_byte_copy_tasks(l_orphans, EnumPhase::Orphans, &mut spec_ctx, tracker, builder_report)
        || !copy_documents(svc, &l_primary, EnumPhase::Primary, &mut spec_ctx, tracker, builder_report)
        || !copy_documents(svc, &l_secondary, EnumPhase::Secondary, &mut spec_ctx, tracker, builder_report)
        || !flush_byte_copy_tasks(l_pass_through, EnumPhase::PassThrough, &mut spec_ctx, tracker, builder_report)
    {
        return Ok(());
    }
    if let Some(path_dir_template) = request.options.dir_project_template.as_deref() {
        ensure_project_file(path_dir_template, &request.identity.identity_number(), &mut spec_ctx, builder_report);
    }
    if !repair_copied_documents(svc, &mut spec_ctx, tracker, builder_report) {
        return Ok(());
    }
    if request.options.if_stamp_properties {
        stamp_top_master(svc, request, &spec_plan, builder_report);
    }
    Ok(())
}

fn init_destination_root(path_dir_dst: &Path) -> DesignCopyResult<()> {
    fs::create_dir_all(path_dir_dst).map_err(|e| DesignCopyError::DestinationInitFailed {
        path: path_dir_dst.to_path_buf(),
        message: e.to_string(),
    })?;
    let meta_dir_dst =
        fs::symlink_metadata(path_dir_dst).map_err(|e| DesignCopyError::DestinationInitFailed {
            path: path_dir_dst.to_path_buf(),
            message: e.to_string(),
        })?;
    if meta_dir_dst.file_type().is_symlink() {
        return Err(DesignCopyError::DestinationInitFailed {
            path: path_dir_dst.to_path_buf(),
            message: "Destination root path must not be a symbolic link.".to_string(),
        });
    }
    Ok(())
}

fn _to_byte_copy_task(spec_assignment: &SpecRenameAssignment, if_skip_existing: bool) -> SpecByteCopyTask {
    SpecByteCopyTask {
        path_file_src: spec_assignment.original_path.clone(),
        path_file_dst: spec_assignment.destination_path.clone(),
        c_label: derive_relative_key(&spec_assignment.relative_path),
        if_skip_existing,
    }
}

fn _is_cancel_requested(spec_ctx: &SpecRunContext<'_>, builder_report: &mut ReportDesignCopyBuilder) -> bool {
    if spec_ctx.cancel.is_cancelled() {
        info!("cancellation requested; stopping between files");
        builder_report.mark_cancelled();
        return true;
    }
    false
}

////////////////////////////////////////////////////////////////////////////////
// #region ByteCopies

fn run_byte_copy_task(
    spec_task: &SpecByteCopyTask,
    path_dir_dst: &Path,
    cancel: &CancelToken,
) -> EnumByteCopyOutcome {
    if cancel.is_cancelled() {
        return EnumByteCopyOutcome::Cancelled;
    }
    if spec_task.if_skip_existing && spec_task.path_file_dst.exists() {
        return EnumByteCopyOutcome::Skipped;
    }
    let res_copy = validate_destination_path_safety(&spec_task.path_file_dst, path_dir_dst)
        .and_then(|_| {
            copy_file_with_metadata(&spec_task.path_file_src, &spec_task.path_file_dst)
                .map_err(|e| e.to_string())
        });
    match res_copy {
        Ok(()) => EnumByteCopyOutcome::Copied,
        Err(message) => EnumByteCopyOutcome::Failed(message),
    }
}

/// Byte-copy `l_tasks`, on a rayon pool when more than one worker is allowed.
///
/// Outcomes are applied in task order. Returns `false` when the run was cancelled.
fn flush_byte_copy_tasks<P>(
    l_tasks: Vec<SpecByteCopyTask>,
    enum_phase: EnumPhase,
    spec_ctx: &mut SpecRunContext<'_>,
    tracker: &mut ProgressTracker<'_, P>,
    builder_report: &mut ReportDesignCopyBuilder,
) -> bool
where
    P: ProgressSink + ?Sized,
{
    tracker.report_phase(enum_phase);
    if _is_cancel_requested(spec_ctx, builder_report) {
        return false;
    }
    if l_tasks.is_empty() {
        return true;
    }
    info!(phase = enum_phase.label(), cnt_files = l_tasks.len(), "byte copy started");

    let path_dir_dst = spec_ctx.path_dir_dst;
    let cancel = spec_ctx.cancel;
    let run_serial = |l_tasks: &[SpecByteCopyTask]| -> Vec<EnumByteCopyOutcome> {
        l_tasks
            .iter()
            .map(|spec_task| run_byte_copy_task(spec_task, path_dir_dst, cancel))
            .collect()
    };

    let l_outcomes = if spec_ctx.n_workers_max <= 1 {
        run_serial(&l_tasks)
    } else {
        match ThreadPoolBuilder::new()
            .num_threads(spec_ctx.n_workers_max)
            .build()
        {
            Ok(thread_pool) => thread_pool.install(|| {
                l_tasks
                    .par_iter()
                    .map(|spec_task| run_byte_copy_task(spec_task, path_dir_dst, cancel))
                    .collect::<Vec<_>>()
            }),
            Err(e) => {
                let c_warning = format!(
                    "Failed to initialize thread pool (workers={}); fallback to serial copy.",
                    spec_ctx.n_workers_max
                );
                warn!(error = %e, "{c_warning}");
                builder_report.add_warning(c_warning);
                run_serial(&l_tasks)
            }
        }
    };

    let n_total = l_tasks.len();
    let mut if_cancelled = false;
    for (idx, (spec_task, enum_outcome)) in l_tasks.into_iter().zip(l_outcomes).enumerate() {
        match enum_outcome {
            EnumByteCopyOutcome::Copied => {
                debug!(from = %spec_task.path_file_src.display(), to = %spec_task.path_file_dst.display(), "file copied");
                spec_ctx.cache.record(&spec_task.path_file_dst);
                builder_report.add_copied(spec_task.path_file_src, spec_task.path_file_dst);
            }
            EnumByteCopyOutcome::Skipped => {
                debug!(path = %spec_task.path_file_dst.display(), "destination exists; skipped");
                builder_report.add_skipped();
            }
            EnumByteCopyOutcome::Cancelled => {
                if_cancelled = true;
                continue;
            }
            EnumByteCopyOutcome::Failed(message) => {
                warn!(path = %spec_task.path_file_src.display(), error = %message, "file copy failed");
                builder_report.add_failure(spec_task.path_file_src, EnumFailureKind::FileCopyFailed, message);
            }
        }
        tracker.report_step(enum_phase, idx + 1, n_total, &spec_task.c_label);
    }
    if if_cancelled {
        info!("cancellation requested; stopping between files");
        builder_report.mark_cancelled();
        return false;
    }
    true
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DocumentCopies

/// Open, repoint and save each document to its destination, in order.
///
/// Returns `false` when the run was cancelled.
fn copy_documents<S, P>(
    service: &mut S,
    l_assignments: &[&SpecRenameAssignment],
    enum_phase: EnumPhase,
    spec_ctx: &mut SpecRunContext<'_>,
    tracker: &mut ProgressTracker<'_, P>,
    builder_report: &mut ReportDesignCopyBuilder,
) -> bool
where
    S: DocumentAuthoringService + ?Sized,
    P: ProgressSink + ?Sized,
{
    tracker.report_phase(enum_phase);
    if !l_assignments.is_empty() {
        info!(phase = enum_phase.label(), cnt_documents = l_assignments.len(), "document copy started");
    }

    let n_total = l_assignments.len();
    for (idx, spec_assignment) in l_assignments.iter().enumerate() {
        if _is_cancel_requested(spec_ctx, builder_report) {
            return false;
        }
        let c_label = derive_relative_key(&spec_assignment.relative_path);
        let res_copy = validate_destination_path_safety(
            &spec_assignment.destination_path,
            spec_ctx.path_dir_dst,
        )
        .and_then(|_| {
            let mut resolver = ReferenceResolver::for_copy(
                spec_ctx.spec_plan,
                spec_ctx.path_dir_src,
                spec_ctx.path_dir_dst,
                &mut spec_ctx.cache,
            );
            copy_document(&mut *service, spec_assignment, &mut resolver).map_err(|e| e.to_string())
        });
        match res_copy {
            Ok(spec_outcome) => {
                debug!(
                    from = %spec_assignment.original_path.display(),
                    to = %spec_assignment.destination_path.display(),
                    cnt_repointed = spec_outcome.l_links.len(),
                    "document copied"
                );
                spec_ctx.cache.record(&spec_assignment.destination_path);
                builder_report.add_references_repointed(spec_outcome.l_links.len());
                builder_report.add_copied(
                    spec_assignment.original_path.clone(),
                    spec_assignment.destination_path.clone(),
                );
            }
            Err(message) => {
                warn!(path = %spec_assignment.original_path.display(), error = %message, "document copy failed");
                builder_report.add_failure(
                    spec_assignment.original_path.clone(),
                    EnumFailureKind::FileCopyFailed,
                    message,
                );
            }
        }
        tracker.report_step(enum_phase, idx + 1, n_total, &c_label);
    }
    true
}

/// Re-open every copied document and fix references still pointing at the source.
///
/// The top master goes last so its children are settled first. Unresolved
/// references flag the document; it stays counted as copied.
///
/// Returns `false` when the run was cancelled.
fn repair_copied_documents<S, P>(
    service: &mut S,
    spec_ctx: &mut SpecRunContext<'_>,
    tracker: &mut ProgressTracker<'_, P>,
    builder_report: &mut ReportDesignCopyBuilder,
) -> bool
where
    S: DocumentAuthoringService + ?Sized,
    P: ProgressSink + ?Sized,
{
    tracker.report_phase(EnumPhase::Repair);

    let mut l_docs: Vec<(PathBuf, bool)> = builder_report
        .copied
        .iter()
        .filter_map(|spec_copied| spec_ctx.spec_plan.lookup(&spec_copied.original_path))
        .filter(|v| v.document_kind.is_cad_document())
        .map(|v| (v.destination_path.clone(), v.role == EnumFileRole::TopMaster))
        .collect();
    l_docs.sort_by_key(|(_, if_top)| *if_top);
    if l_docs.is_empty() {
        return true;
    }
    info!(cnt_documents = l_docs.len(), "reference repair started");

    let n_total = l_docs.len();
    let mut n_repointed = 0usize;
    for (idx, (path_doc, _)) in l_docs.iter().enumerate() {
        if _is_cancel_requested(spec_ctx, builder_report) {
            return false;
        }
        let mut resolver = ReferenceResolver::for_repair(
            spec_ctx.spec_plan,
            spec_ctx.path_dir_src,
            spec_ctx.path_dir_dst,
            &mut spec_ctx.cache,
        );
        match repair_document(&mut *service, path_doc, &mut resolver) {
            Ok(spec_outcome) => {
                n_repointed += spec_outcome.l_links.len();
                builder_report.add_references_repointed(spec_outcome.l_links.len());
                for path_ref in spec_outcome.l_unresolved {
                    let message = format!("Unresolved reference: {}", path_ref.display());
                    warn!(path = %path_doc.display(), "{message}");
                    builder_report.add_failure(
                        path_doc.clone(),
                        EnumFailureKind::ReferenceRepairFailed,
                        message,
                    );
                }
            }
            Err(e) => {
                warn!(path = %path_doc.display(), error = %e, "reference repair failed");
                builder_report.add_failure(
                    path_doc.clone(),
                    EnumFailureKind::ReferenceRepairFailed,
                    e.to_string(),
                );
            }
        }
        let c_label = path_doc
            .file_name()
            .map(|v| v.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracker.report_step(EnumPhase::Repair, idx + 1, n_total, &c_label);
    }
    info!(cnt_repointed = n_repointed, "reference repair finished");
    true
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Finalize

/// Copy the first root-level project file of `path_dir_template` as
/// `{identity_number}.ipj` when the destination root has none.
fn ensure_project_file(
    path_dir_template: &Path,
    identity_number: &str,
    spec_ctx: &mut SpecRunContext<'_>,
    builder_report: &mut ReportDesignCopyBuilder,
) {
    if _find_root_project_file(spec_ctx.path_dir_dst).is_some() {
        return;
    }
    let Some(path_template) = _find_root_project_file(path_dir_template) else {
        let message = format!(
            "No project file found in template folder {}",
            path_dir_template.display()
        );
        warn!("{message}");
        builder_report.add_warning(message);
        return;
    };
    let path_new = spec_ctx
        .path_dir_dst
        .join(format!("{identity_number}.{}", TUP_EXTENSIONS_PROJECT_FILE[0]));
    let res_copy = validate_destination_path_safety(&path_new, spec_ctx.path_dir_dst)
        .and_then(|_| copy_file_with_metadata(&path_template, &path_new).map_err(|e| e.to_string()));
    match res_copy {
        Ok(()) => {
            info!(from = %path_template.display(), to = %path_new.display(), "project file added from template");
            spec_ctx.cache.record(&path_new);
            builder_report.add_copied(path_template, path_new);
        }
        Err(message) => {
            warn!(path = %path_template.display(), error = %message, "project file fallback failed");
            builder_report.add_failure(path_template, EnumFailureKind::FileCopyFailed, message);
        }
    }
}

fn _find_root_project_file(path_dir: &Path) -> Option<PathBuf> {
    let mut l_found: Vec<PathBuf> = fs::read_dir(path_dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|v| v.path())
        .filter(|v| v.is_file())
        .filter(|v| {
            v.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| TUP_EXTENSIONS_PROJECT_FILE.iter().any(|x| e.eq_ignore_ascii_case(x)))
        })
        .collect();
    l_found.sort();
    l_found.into_iter().next()
}

/// Write the identity properties into the copied top master and save it.
fn stamp_top_master<S>(
    service: &mut S,
    request: &SpecDesignCopyRequest,
    spec_plan: &SpecRenamePlan,
    builder_report: &mut ReportDesignCopyBuilder,
) where
    S: DocumentAuthoringService + ?Sized,
{
    let Some(spec_top) = spec_plan
        .assignments
        .iter()
        .find(|v| v.role == EnumFileRole::TopMaster && v.document_kind.is_cad_document())
    else {
        return;
    };
    if !builder_report
        .copied
        .iter()
        .any(|v| v.original_path == spec_top.original_path)
    {
        return;
    }
    let l_properties = request.identity.derive_properties(Local::now().date_naive());
    let res_stamp = with_document(service, &spec_top.destination_path, |svc, handle| {
        svc.set_properties(handle, &l_properties)?;
        svc.save(handle)
    });
    match res_stamp {
        Ok(()) => {
            debug!(path = %spec_top.destination_path.display(), cnt_properties = l_properties.len(), "identity properties stamped");
        }
        Err(e) => {
            warn!(path = %spec_top.destination_path.display(), error = %e, "property stamping failed");
            builder_report.add_failure(
                spec_top.destination_path.clone(),
                EnumFailureKind::PropertyStampFailed,
                e.to_string(),
            );
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
