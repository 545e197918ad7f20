//! Reference traversal and rewriting through the authoring service.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::authoring::{AuthoringResult, DocumentAuthoringService, DocumentHandle, with_document};
use crate::rename::{SpecRenameAssignment, SpecRenamePlan};
use crate::resolve::ReferenceResolver;
use crate::spec::SpecReferenceLink;
use crate::util::{derive_path_key, is_under_root};

#[derive(Debug, Default)]
pub(crate) struct SpecRewriteOutcome {
    pub(crate) l_links: Vec<SpecReferenceLink>,
    pub(crate) l_unresolved: Vec<PathBuf>,
}

/// Primary documents reachable from `path_top`, leaves first, `path_top` last.
///
/// Only selected, non-secondary CAD documents inside the source root are
/// followed. Documents that fail to open are kept as leaves.
pub(crate) fn collect_reachable<S>(
    service: &mut S,
    path_top: &Path,
    spec_plan: &SpecRenamePlan,
    path_dir_src: &Path,
) -> Vec<PathBuf>
where
    S: DocumentAuthoringService + ?Sized,
{
    let mut set_visited: HashSet<String> = HashSet::new();
    let mut l_order: Vec<PathBuf> = Vec::new();
    _visit(
        service,
        path_top,
        spec_plan,
        path_dir_src,
        &mut set_visited,
        &mut l_order,
    );
    l_order
}

fn _visit<S>(
    service: &mut S,
    path_doc: &Path,
    spec_plan: &SpecRenamePlan,
    path_dir_src: &Path,
    set_visited: &mut HashSet<String>,
    l_order: &mut Vec<PathBuf>,
) where
    S: DocumentAuthoringService + ?Sized,
{
    if !set_visited.insert(derive_path_key(path_doc)) {
        return;
    }
    let l_refs = match with_document(service, path_doc, |svc, handle| {
        svc.enumerate_references(handle)
    }) {
        Ok(v) => v,
        Err(e) => {
            warn!(path = %path_doc.display(), error = %e, "references not readable; treated as leaf");
            Vec::new()
        }
    };

    for path_ref in l_refs {
        if !is_under_root(&path_ref, path_dir_src) {
            continue;
        }
        let Some(spec_assignment) = spec_plan.lookup(&path_ref) else {
            continue;
        };
        let enum_kind = spec_assignment.document_kind;
        if !enum_kind.is_cad_document() || enum_kind.is_secondary() {
            continue;
        }
        let path_child = spec_assignment.original_path.clone();
        _visit(
            service,
            &path_child,
            spec_plan,
            path_dir_src,
            set_visited,
            l_order,
        );
    }

    if let Some(spec_assignment) = spec_plan.lookup(path_doc) {
        l_order.push(spec_assignment.original_path.clone());
    }
}

/// Repoint every candidate reference of an open document.
pub(crate) fn rewrite_references<S>(
    service: &mut S,
    handle: DocumentHandle,
    path_doc: &Path,
    resolver: &mut ReferenceResolver<'_>,
) -> AuthoringResult<SpecRewriteOutcome>
where
    S: DocumentAuthoringService + ?Sized,
{
    let mut spec_outcome = SpecRewriteOutcome::default();
    let mut set_seen: HashSet<PathBuf> = HashSet::new();
    for path_ref in service.enumerate_references(handle)? {
        if !set_seen.insert(path_ref.clone()) || !resolver.is_candidate(&path_ref) {
            continue;
        }
        match resolver.resolve(&path_ref) {
            Some((path_new, _)) if path_new == path_ref => {}
            Some((path_new, enum_strategy)) => {
                service.repoint_reference(handle, &path_ref, &path_new)?;
                debug!(
                    document = %path_doc.display(),
                    from = %path_ref.display(),
                    to = %path_new.display(),
                    strategy = ?enum_strategy,
                    "reference repointed"
                );
                spec_outcome.l_links.push(SpecReferenceLink {
                    from_path: path_doc.to_path_buf(),
                    to_path: path_ref,
                    to_new_path: path_new,
                });
            }
            None => spec_outcome.l_unresolved.push(path_ref),
        }
    }
    Ok(spec_outcome)
}

/// Open the source document, repoint its references and save it to its destination.
pub(crate) fn copy_document<S>(
    service: &mut S,
    spec_assignment: &SpecRenameAssignment,
    resolver: &mut ReferenceResolver<'_>,
) -> AuthoringResult<SpecRewriteOutcome>
where
    S: DocumentAuthoringService + ?Sized,
{
    with_document(service, &spec_assignment.original_path, |svc, handle| {
        let spec_outcome =
            rewrite_references(svc, handle, &spec_assignment.original_path, resolver)?;
        svc.save_as(handle, &spec_assignment.destination_path)?;
        Ok(spec_outcome)
    })
}

/// Re-open a copied document and fix references still pointing at the source.
///
/// The document is saved only when at least one reference changed.
pub(crate) fn repair_document<S>(
    service: &mut S,
    path_doc: &Path,
    resolver: &mut ReferenceResolver<'_>,
) -> AuthoringResult<SpecRewriteOutcome>
where
    S: DocumentAuthoringService + ?Sized,
{
    with_document(service, path_doc, |svc, handle| {
        let spec_outcome = rewrite_references(svc, handle, path_doc, resolver)?;
        if !spec_outcome.l_links.is_empty() {
            svc.save(handle)?;
        }
        Ok(spec_outcome)
    })
}
