//! Reference target resolution.
//!
//! A reference that still points into the source tree is resolved by trying
//! an ordered list of strategies; the first one that yields a target wins.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::rename::SpecRenamePlan;
use crate::util::{derive_path_key, is_under_root, strip_root};

////////////////////////////////////////////////////////////////////////////////
// #region FolderLookupCache

/// File-name index of the destination tree, built lazily once per run.
#[derive(Debug)]
pub struct FolderLookupCache {
    path_dir_root: PathBuf,
    dict_by_name: Option<HashMap<String, Vec<PathBuf>>>,
}

impl FolderLookupCache {
    pub fn new(path_dir_root: &Path) -> Self {
        Self {
            path_dir_root: path_dir_root.to_path_buf(),
            dict_by_name: None,
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.dict_by_name.is_some()
    }

    /// First file named `file_name` (case-insensitive) under the root.
    pub fn find_by_name(&mut self, file_name: &str) -> Option<PathBuf> {
        let path_dir_root = self.path_dir_root.clone();
        let dict_by_name = self
            .dict_by_name
            .get_or_insert_with(|| _index_tree(&path_dir_root));
        dict_by_name
            .get(&file_name.to_lowercase())
            .and_then(|l_paths| l_paths.first().cloned())
    }

    /// Add a file written after the index was built.
    pub fn record(&mut self, path: &Path) {
        let Some(dict_by_name) = self.dict_by_name.as_mut() else {
            return;
        };
        let Some(c_name) = path.file_name() else {
            return;
        };
        let l_paths = dict_by_name
            .entry(c_name.to_string_lossy().to_lowercase())
            .or_default();
        if l_paths.iter().any(|p| p == path) {
            return;
        }
        l_paths.push(path.to_path_buf());
        l_paths.sort_by_key(|p| derive_path_key(p));
    }

    /// Drop the index; the next lookup rebuilds it.
    pub fn invalidate(&mut self) {
        self.dict_by_name = None;
    }
}

fn _index_tree(path_dir_root: &Path) -> HashMap<String, Vec<PathBuf>> {
    let mut dict_by_name: HashMap<String, Vec<PathBuf>> = HashMap::new();
    let mut l_stack = vec![path_dir_root.to_path_buf()];
    while let Some(path_dir) = l_stack.pop() {
        let Ok(iter_entries) = fs::read_dir(&path_dir) else {
            debug!(path = %path_dir.display(), "lookup index skipped unreadable folder");
            continue;
        };
        for entry in iter_entries.flatten() {
            let Ok(cfg_file_type) = entry.file_type() else {
                continue;
            };
            if cfg_file_type.is_dir() {
                l_stack.push(entry.path());
            } else if cfg_file_type.is_file() {
                dict_by_name
                    .entry(entry.file_name().to_string_lossy().to_lowercase())
                    .or_default()
                    .push(entry.path());
            }
        }
    }
    for l_paths in dict_by_name.values_mut() {
        l_paths.sort_by_key(|p| derive_path_key(p));
    }
    debug!(
        root = %path_dir_root.display(),
        n_names = dict_by_name.len(),
        "destination lookup index built"
    );
    dict_by_name
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Strategies

/// One way of finding the new location of a referenced document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumResolveStrategy {
    /// Exact rename-plan entry of the referenced source path.
    RenameMap,
    /// Same relative folder under the destination, renamed file name.
    MirrorPath,
    /// Reference already moved to the destination but still carrying the old name.
    StaleDestination,
    /// Any file under the destination with the (renamed) file name.
    SearchDestination,
}

/// Strategies used while copying: plan entries only.
pub const TUP_STRATEGIES_COPY: [EnumResolveStrategy; 1] = [EnumResolveStrategy::RenameMap];

/// Strategies used by the repair pass, in order.
pub const TUP_STRATEGIES_REPAIR: [EnumResolveStrategy; 4] = [
    EnumResolveStrategy::RenameMap,
    EnumResolveStrategy::MirrorPath,
    EnumResolveStrategy::StaleDestination,
    EnumResolveStrategy::SearchDestination,
];

/// Resolves references of one run against its rename plan and destination.
pub struct ReferenceResolver<'a> {
    spec_plan: &'a SpecRenamePlan,
    path_dir_src: &'a Path,
    path_dir_dst: &'a Path,
    cache: &'a mut FolderLookupCache,
    l_strategies: &'a [EnumResolveStrategy],
    if_require_existing: bool,
}

impl<'a> ReferenceResolver<'a> {
    /// Resolver for the copy passes; plan targets may not exist yet.
    pub fn for_copy(
        spec_plan: &'a SpecRenamePlan,
        path_dir_src: &'a Path,
        path_dir_dst: &'a Path,
        cache: &'a mut FolderLookupCache,
    ) -> Self {
        Self {
            spec_plan,
            path_dir_src,
            path_dir_dst,
            cache,
            l_strategies: &TUP_STRATEGIES_COPY,
            if_require_existing: false,
        }
    }

    /// Resolver for the repair pass; only existing targets are accepted.
    pub fn for_repair(
        spec_plan: &'a SpecRenamePlan,
        path_dir_src: &'a Path,
        path_dir_dst: &'a Path,
        cache: &'a mut FolderLookupCache,
    ) -> Self {
        Self {
            spec_plan,
            path_dir_src,
            path_dir_dst,
            cache,
            l_strategies: &TUP_STRATEGIES_REPAIR,
            if_require_existing: true,
        }
    }

    /// `true` for references this resolver should rewrite.
    ///
    /// References outside the source root are never candidates. During
    /// repair, dangling references into the destination are candidates too.
    pub fn is_candidate(&self, path_ref: &Path) -> bool {
        if is_under_root(path_ref, self.path_dir_src) {
            return true;
        }
        self.if_require_existing
            && is_under_root(path_ref, self.path_dir_dst)
            && !path_ref.exists()
    }

    pub fn resolve(&mut self, path_ref: &Path) -> Option<(PathBuf, EnumResolveStrategy)> {
        if !self.is_candidate(path_ref) {
            return None;
        }
        for enum_strategy in self.l_strategies {
            if let Some(path_target) = self.apply_strategy(*enum_strategy, path_ref) {
                return Some((path_target, *enum_strategy));
            }
        }
        None
    }

    fn apply_strategy(
        &mut self,
        enum_strategy: EnumResolveStrategy,
        path_ref: &Path,
    ) -> Option<PathBuf> {
        match enum_strategy {
            EnumResolveStrategy::RenameMap => {
                let spec_assignment = self.spec_plan.lookup(path_ref)?;
                let path_target = spec_assignment.destination_path.clone();
                (!self.if_require_existing || path_target.is_file()).then_some(path_target)
            }
            EnumResolveStrategy::MirrorPath => {
                let path_rel = strip_root(path_ref, self.path_dir_src)?;
                self.find_in_folder(&path_rel, path_ref)
            }
            EnumResolveStrategy::StaleDestination => {
                let path_rel = strip_root(path_ref, self.path_dir_dst)?;
                self.find_in_folder(&path_rel, path_ref)
            }
            EnumResolveStrategy::SearchDestination => {
                let c_name = _file_name(path_ref)?;
                let c_renamed = self.renamed(&c_name);
                self.cache
                    .find_by_name(&c_renamed)
                    .or_else(|| self.cache.find_by_name(&c_name))
            }
        }
    }

    /// Destination folder of `path_rel`, renamed name first, then original name.
    fn find_in_folder(&self, path_rel: &Path, path_ref: &Path) -> Option<PathBuf> {
        let c_name = _file_name(path_ref)?;
        let path_dir_target = match path_rel.parent() {
            Some(path_parent) => self.path_dir_dst.join(path_parent),
            None => self.path_dir_dst.to_path_buf(),
        };
        let c_renamed = self.renamed(&c_name);
        [c_renamed, c_name]
            .into_iter()
            .map(|c| path_dir_target.join(c))
            .find(|p| p.is_file())
    }

    fn renamed(&self, file_name: &str) -> String {
        self.spec_plan
            .lookup_by_name(file_name)
            .map(|a| a.new_file_name.clone())
            .unwrap_or_else(|| file_name.to_string())
    }
}

fn _file_name(path: &Path) -> Option<String> {
    path.file_name().map(|v| v.to_string_lossy().to_string())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
