//! Design copy report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::spec::{EnumFailureKind, EnumRunStatus, SpecCopiedFile, SpecCopyFailure};

/// Aggregate counters and diagnostics for one `copy_design` run.
#[derive(Debug, Clone, Serialize)]
pub struct ReportDesignCopy {
    pub status: EnumRunStatus,
    /// Documents and files written to the destination.
    pub cnt_files_copied: u64,
    /// Files that could not be written.
    pub cnt_files_failed: u64,
    pub cnt_folders_created: u64,
    /// Files left alone because the destination already existed.
    pub cnt_files_skipped: u64,
    pub cnt_references_repointed: u64,
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
    /// `(original_path, new_path)` of every written file, in copy order.
    pub copied: Vec<SpecCopiedFile>,
    /// Directory and file failures.
    pub failures: Vec<SpecCopyFailure>,
    /// Copied documents whose references could not all be repaired.
    pub flagged: Vec<SpecCopyFailure>,
    pub warnings: Vec<String>,
    /// Message of the error that aborted a `Failed` run.
    pub fatal: Option<String>,
}

impl ReportDesignCopy {
    pub fn elapsed(&self) -> Duration {
        self.time_end - self.time_start
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            EnumRunStatus::Completed | EnumRunStatus::NoFilesFound
        )
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_files_copied".to_string(), self.cnt_files_copied);
        dict_counts.insert("cnt_files_failed".to_string(), self.cnt_files_failed);
        dict_counts.insert("cnt_folders_created".to_string(), self.cnt_folders_created);
        dict_counts.insert("cnt_files_skipped".to_string(), self.cnt_files_skipped);
        dict_counts.insert(
            "cnt_references_repointed".to_string(),
            self.cnt_references_repointed,
        );
        dict_counts.insert("cnt_failures".to_string(), self.failure_count() as u64);
        dict_counts.insert("cnt_flagged".to_string(), self.flagged.len() as u64);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} status={} copied={} failed={} folders={} skipped={} repointed={} flagged={} warnings={} elapsed_ms={}",
            _status_name(self.status),
            dict_counts["cnt_files_copied"],
            dict_counts["cnt_files_failed"],
            dict_counts["cnt_folders_created"],
            dict_counts["cnt_files_skipped"],
            dict_counts["cnt_references_repointed"],
            dict_counts["cnt_flagged"],
            dict_counts["cnt_warnings"],
            self.elapsed().num_milliseconds()
        )
    }
}

impl fmt::Display for ReportDesignCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[DESIGN-COPY]"))
    }
}

fn _status_name(status: EnumRunStatus) -> &'static str {
    match status {
        EnumRunStatus::Completed => "completed",
        EnumRunStatus::CompletedWithFailures => "completed_with_failures",
        EnumRunStatus::NoFilesFound => "no_files_found",
        EnumRunStatus::Cancelled => "cancelled",
        EnumRunStatus::Failed => "failed",
    }
}

/// Mutable accumulator for one run; only the orchestrator writes to it.
#[derive(Debug, Clone)]
pub struct ReportDesignCopyBuilder {
    pub time_start: DateTime<Utc>,
    pub cnt_files_copied: u64,
    pub cnt_files_failed: u64,
    pub cnt_folders_created: u64,
    pub cnt_files_skipped: u64,
    pub cnt_references_repointed: u64,
    pub copied: Vec<SpecCopiedFile>,
    pub failures: Vec<SpecCopyFailure>,
    pub flagged: Vec<SpecCopyFailure>,
    pub warnings: Vec<String>,
    pub fatal: Option<String>,
    pub if_cancelled: bool,
    pub if_no_files: bool,
}

impl Default for ReportDesignCopyBuilder {
    fn default() -> Self {
        Self::start()
    }
}

impl ReportDesignCopyBuilder {
    /// Empty builder stamped with the current time.
    pub fn start() -> Self {
        Self {
            time_start: Utc::now(),
            cnt_files_copied: 0,
            cnt_files_failed: 0,
            cnt_folders_created: 0,
            cnt_files_skipped: 0,
            cnt_references_repointed: 0,
            copied: Vec::new(),
            failures: Vec::new(),
            flagged: Vec::new(),
            warnings: Vec::new(),
            fatal: None,
            if_cancelled: false,
            if_no_files: false,
        }
    }

    pub fn add_copied(&mut self, original_path: PathBuf, new_path: PathBuf) {
        self.cnt_files_copied += 1;
        self.copied.push(SpecCopiedFile {
            original_path,
            new_path,
        });
    }

    pub fn add_folder_created(&mut self) {
        self.cnt_folders_created += 1;
    }

    pub fn add_skipped(&mut self) {
        self.cnt_files_skipped += 1;
    }

    pub fn add_references_repointed(&mut self, n_repointed: usize) {
        self.cnt_references_repointed += n_repointed as u64;
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Record one per-item failure.
    ///
    /// File failures count towards `cnt_files_failed`; reference repair and
    /// property stamp failures flag an already copied document instead.
    pub fn add_failure(&mut self, path: PathBuf, kind: EnumFailureKind, message: String) {
        let spec_failure = SpecCopyFailure {
            path,
            kind,
            message,
        };
        match kind {
            EnumFailureKind::FileCopyFailed => {
                self.cnt_files_failed += 1;
                self.failures.push(spec_failure);
            }
            EnumFailureKind::DirectoryCreateFailed => self.failures.push(spec_failure),
            EnumFailureKind::ReferenceRepairFailed | EnumFailureKind::PropertyStampFailed => {
                self.flagged.push(spec_failure)
            }
        }
    }

    pub fn set_fatal(&mut self, message: String) {
        self.fatal = Some(message);
    }

    pub fn mark_cancelled(&mut self) {
        self.if_cancelled = true;
    }

    pub fn mark_no_files(&mut self) {
        self.if_no_files = true;
    }

    fn derive_status(&self) -> EnumRunStatus {
        if self.fatal.is_some() {
            EnumRunStatus::Failed
        } else if self.if_cancelled {
            EnumRunStatus::Cancelled
        } else if self.if_no_files {
            EnumRunStatus::NoFilesFound
        } else if !self.failures.is_empty() {
            EnumRunStatus::CompletedWithFailures
        } else {
            EnumRunStatus::Completed
        }
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportDesignCopy {
        ReportDesignCopy {
            status: self.derive_status(),
            cnt_files_copied: self.cnt_files_copied,
            cnt_files_failed: self.cnt_files_failed,
            cnt_folders_created: self.cnt_folders_created,
            cnt_files_skipped: self.cnt_files_skipped,
            cnt_references_repointed: self.cnt_references_repointed,
            time_start: self.time_start,
            time_end: Utc::now(),
            copied: self.copied,
            failures: self.failures,
            flagged: self.flagged,
            warnings: self.warnings,
            fatal: self.fatal,
        }
    }
}
