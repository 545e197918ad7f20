//! `modkit_design_copy` v1:
//! Reference-aware design copy engine for CAD module templates.
//!
//! Modules:
//! - `classify`    : source scan, exclusions and master detection
//! - `rename`      : destination name resolution
//! - `materialize` : destination folder creation
//! - `copy`        : copy orchestration
//! - `authoring`   : document authoring service seam and text link adapter
//! - `resolve`     : reference target resolution strategies
//! - `progress`    : progress sinks and cancellation
//! - `report`      : run-time report model
//! - `spec`        : enums/options/errors
//! - `conf`        : default naming and exclusion tables

pub mod authoring;
pub mod classify;
pub mod conf;
pub mod copy;
pub mod materialize;
pub mod progress;
mod relink;
pub mod rename;
pub mod report;
pub mod resolve;
pub mod spec;
#[cfg(test)]
mod test_util;
mod util;

pub use authoring::{
    AuthoringError, AuthoringResult, DocumentAuthoringService, DocumentHandle, SilentSession,
    TextLinkDocumentService, with_document,
};
pub use classify::{SpecSourceScan, scan_source};
pub use copy::copy_design;
pub use materialize::{derive_directory_set, materialize_directories};
pub use progress::{
    CancelToken, EnumPhase, NoProgress, ProgressSink, ProgressTracker, SpecProgressEvent,
};
pub use rename::{SpecRenameAssignment, SpecRenamePlan, SpecRenameRules, resolve_names};
pub use report::{ReportDesignCopy, ReportDesignCopyBuilder};
pub use resolve::{EnumResolveStrategy, FolderLookupCache, ReferenceResolver};
pub use spec::{
    DesignCopyError, DesignCopyResult, EnumDocumentKind, EnumFailureKind, EnumFileRole,
    EnumFixedSuffix, EnumPatternMode, EnumRunStatus, EnumSelection, EnumSourceMode,
    SpecClassifiedFile, SpecCopiedFile, SpecCopyFailure, SpecDesignCopyOptions,
    SpecDesignCopyRequest, SpecExclusionRules, SpecIdentity, SpecMasterRules, SpecReferenceLink,
    SpecRenameOptions, SpecSearchReplace, SpecSourceFile,
};
pub use util::{TypePatternSeq, derive_relative_key};
