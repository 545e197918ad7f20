//! Name resolution: destination file name for every selected file.
//!
//! Rules are applied in a fixed precedence and each one is idempotent:
//! masters take `{identity_number}.{ext}`, satellites get project prefix,
//! literal prefix, literal suffix, fixed suffix and incremental counter,
//! then a global search/replace runs on the full name, and special
//! spreadsheet suffixes override everything else.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use regex::{NoExpand, Regex, RegexBuilder};
use serde::Serialize;
use tracing::{debug, warn};

use crate::conf::C_PATTERN_INCREMENTAL_SUFFIX;
use crate::spec::{
    DesignCopyError, DesignCopyResult, EnumDocumentKind, EnumFileRole, SpecClassifiedFile,
    SpecIdentity, SpecRenameOptions,
};
use crate::util::{
    derive_folded_key, derive_path_key, strip_prefix_ignore_case, strip_suffix_ignore_case,
};

/// Destination of one selected source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecRenameAssignment {
    pub original_path: PathBuf,
    pub relative_path: PathBuf,
    pub role: EnumFileRole,
    pub document_kind: EnumDocumentKind,
    pub new_file_name: String,
    pub destination_path: PathBuf,
    /// A `-N` counter was added to avoid a destination collision.
    pub disambiguated: bool,
}

impl SpecRenameAssignment {
    pub fn original_file_name(&self) -> String {
        self.original_path
            .file_name()
            .map(|v| v.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn is_renamed(&self) -> bool {
        self.original_file_name() != self.new_file_name
    }
}

/// All assignments of a run with case-insensitive lookups.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SpecRenamePlan {
    pub identity_number: String,
    pub path_dir_dst: PathBuf,
    /// Assignments in source enumeration order.
    pub assignments: Vec<SpecRenameAssignment>,
    #[serde(skip)]
    dict_by_path: HashMap<String, usize>,
    #[serde(skip)]
    dict_by_name: HashMap<String, usize>,
}

impl SpecRenamePlan {
    fn from_assignments(
        identity_number: String,
        path_dir_dst: PathBuf,
        assignments: Vec<SpecRenameAssignment>,
    ) -> Self {
        let mut dict_by_path = HashMap::with_capacity(assignments.len());
        let mut dict_by_name = HashMap::with_capacity(assignments.len());
        for (n_idx, spec_assignment) in assignments.iter().enumerate() {
            dict_by_path.insert(derive_path_key(&spec_assignment.original_path), n_idx);
            dict_by_name
                .entry(spec_assignment.original_file_name().to_lowercase())
                .or_insert(n_idx);
        }
        Self {
            identity_number,
            path_dir_dst,
            assignments,
            dict_by_path,
            dict_by_name,
        }
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Assignment of a source path.
    pub fn lookup(&self, original_path: &Path) -> Option<&SpecRenameAssignment> {
        self.dict_by_path
            .get(&derive_path_key(original_path))
            .map(|n_idx| &self.assignments[*n_idx])
    }

    /// First assignment whose original file name matches.
    pub fn lookup_by_name(&self, file_name: &str) -> Option<&SpecRenameAssignment> {
        self.dict_by_name
            .get(&file_name.to_lowercase())
            .map(|n_idx| &self.assignments[*n_idx])
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region RenameRules

/// Compiled rename rules for one identity.
#[derive(Debug, Clone)]
pub struct SpecRenameRules {
    identity_number: String,
    spec_options: SpecRenameOptions,
    regex_incremental: Regex,
    regex_search: Option<Regex>,
}

impl SpecRenameRules {
    pub fn new(identity: &SpecIdentity, spec_options: &SpecRenameOptions) -> DesignCopyResult<Self> {
        let regex_incremental = Regex::new(C_PATTERN_INCREMENTAL_SUFFIX).map_err(|e| {
            DesignCopyError::InvalidPattern {
                pattern: C_PATTERN_INCREMENTAL_SUFFIX.to_string(),
                message: e.to_string(),
            }
        })?;
        let regex_search = match &spec_options.search_replace {
            Some(spec_sr) if !spec_sr.search.is_empty() => Some(
                RegexBuilder::new(&regex::escape(&spec_sr.search))
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| DesignCopyError::InvalidPattern {
                        pattern: spec_sr.search.clone(),
                        message: e.to_string(),
                    })?,
            ),
            _ => None,
        };
        Ok(Self {
            identity_number: identity.identity_number(),
            spec_options: spec_options.clone(),
            regex_incremental,
            regex_search,
        })
    }

    pub fn identity_number(&self) -> &str {
        &self.identity_number
    }

    /// Satellite rules apply to CAD documents, or to everything when enabled.
    pub fn is_eligible(&self, enum_kind: EnumDocumentKind) -> bool {
        enum_kind.is_cad_document() || self.spec_options.if_include_non_cad
    }

    /// `{identity_number}.{extension}`, or the name unchanged when masters keep their names.
    pub fn rename_master(&self, file_name: &str) -> String {
        if !self.spec_options.if_rename_masters {
            return file_name.to_string();
        }
        let (_, c_ext) = split_file_name(file_name);
        match c_ext {
            Some(c_ext) => format!("{}.{}", self.identity_number, c_ext.to_lowercase()),
            None => self.identity_number.clone(),
        }
    }

    /// `{identity_number}{suffix}` when the original name ends with a special suffix.
    pub fn rename_special(&self, file_name: &str) -> Option<String> {
        self.spec_options
            .suffixes_special
            .iter()
            .filter(|c_suffix| !c_suffix.is_empty())
            .find(|c_suffix| strip_suffix_ignore_case(file_name, c_suffix).is_some())
            .map(|c_suffix| format!("{}{}", self.identity_number, c_suffix))
    }

    /// Apply the satellite affixes and the search/replace to `file_name`.
    ///
    /// `n_counter` is the 1-based position for the incremental suffix.
    /// Affixes already present are recognized and rebuilt in place, so
    /// feeding the result back in yields the same name.
    pub fn rename_satellite(&self, file_name: &str, n_counter: usize) -> String {
        let (c_stem, c_ext) = split_file_name(file_name);
        let spec_options = &self.spec_options;

        let c_prefix = _non_empty(spec_options.prefix.as_deref());
        let c_suffix = _non_empty(spec_options.suffix.as_deref());
        let c_fixed = spec_options
            .fixed_suffix
            .as_ref()
            .map(|v| v.as_suffix())
            .filter(|v| !v.is_empty());
        let c_project = spec_options
            .if_apply_project_prefix
            .then(|| format!("{}_", self.identity_number));

        let c_prefix_text = c_prefix.unwrap_or_default();
        let (c_lead, mut c_body) = match &c_project {
            Some(c_project) => {
                let c_lead_full = format!("{c_prefix_text}{c_project}");
                if let Some(c_rest) = strip_prefix_ignore_case(c_stem, &c_lead_full) {
                    (c_stem[..c_stem.len() - c_rest.len()].to_string(), c_rest)
                } else if let Some(c_rest) = strip_prefix_ignore_case(c_stem, c_project) {
                    let c_matched = &c_stem[..c_stem.len() - c_rest.len()];
                    (format!("{c_prefix_text}{c_matched}"), c_rest)
                } else {
                    (c_lead_full, c_stem)
                }
            }
            None => match strip_prefix_ignore_case(c_stem, c_prefix_text) {
                Some(c_rest) if !c_prefix_text.is_empty() => {
                    (c_stem[..c_stem.len() - c_rest.len()].to_string(), c_rest)
                }
                _ => (c_prefix_text.to_string(), c_stem),
            },
        };

        if spec_options.if_apply_incremental_suffix {
            if let Some(m) = self.regex_incremental.find(c_body) {
                c_body = &c_body[..m.start()];
            }
        }

        let c_suffix_text = c_suffix.unwrap_or_default();
        let c_fixed_text = c_fixed.unwrap_or_default();
        let c_tail_full = format!("{c_suffix_text}{c_fixed_text}");
        let mut c_tail = c_tail_full.clone();
        if !c_tail_full.is_empty() {
            if let Some(c_rest) = strip_suffix_ignore_case(c_body, &c_tail_full) {
                c_tail = c_body[c_rest.len()..].to_string();
                c_body = c_rest;
            } else if !c_suffix_text.is_empty() && !c_fixed_text.is_empty() {
                if let Some(c_rest) = strip_suffix_ignore_case(c_body, c_suffix_text) {
                    c_tail = format!("{}{c_fixed_text}", &c_body[c_rest.len()..]);
                    c_body = c_rest;
                }
            }
        }

        let mut c_stem_new = format!("{c_lead}{c_body}{c_tail}");
        if spec_options.if_apply_incremental_suffix {
            c_stem_new.push_str(&format!("_{n_counter:02}"));
        }

        let c_name_new = join_file_name(&c_stem_new, c_ext);
        self.apply_search_replace(&c_name_new)
    }

    fn apply_search_replace(&self, file_name: &str) -> String {
        match (&self.regex_search, &self.spec_options.search_replace) {
            (Some(regex_search), Some(spec_sr)) => regex_search
                .replace_all(file_name, NoExpand(&spec_sr.replace))
                .into_owned(),
            _ => file_name.to_string(),
        }
    }
}

fn _non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Split `Name.ext` into stem and extension; dot-files keep their whole name.
pub fn split_file_name(file_name: &str) -> (&str, Option<&str>) {
    match file_name.rsplit_once('.') {
        Some((c_stem, c_ext)) if !c_stem.is_empty() => (c_stem, Some(c_ext)),
        _ => (file_name, None),
    }
}

fn join_file_name(c_stem: &str, c_ext: Option<&str>) -> String {
    match c_ext {
        Some(c_ext) => format!("{c_stem}.{c_ext}"),
        None => c_stem.to_string(),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Resolve

/// Compute the destination name of every selected file.
///
/// Masters are resolved first so they always keep their names; any later
/// destination that collides (case-insensitively) with an earlier one gets
/// `-2`, `-3`, ... appended to its stem.
pub fn resolve_names(
    files: &[SpecClassifiedFile],
    identity: &SpecIdentity,
    spec_options: &SpecRenameOptions,
    path_dir_dst: &Path,
) -> DesignCopyResult<SpecRenamePlan> {
    let spec_rules = SpecRenameRules::new(identity, spec_options)?;

    let mut l_order: Vec<usize> = (0..files.len())
        .filter(|n_idx| files[*n_idx].is_selected)
        .collect();
    l_order.sort_by_key(|n_idx| match files[*n_idx].role {
        EnumFileRole::TopMaster => 0,
        EnumFileRole::ProjectMaster => 1,
        _ => 2,
    });

    let mut l_slots: Vec<Option<SpecRenameAssignment>> = vec![None; files.len()];
    let mut set_keys_dst: HashSet<String> = HashSet::with_capacity(l_order.len());
    let mut n_counter = 0_usize;

    for n_idx in l_order {
        let spec_file = &files[n_idx];
        let c_name = spec_file.source.file_name();
        let c_name_new = if spec_file.role.is_master() {
            spec_rules.rename_master(&c_name)
        } else if let Some(c_special) = spec_rules.rename_special(&c_name) {
            c_special
        } else if spec_rules.is_eligible(spec_file.source.document_kind) {
            n_counter += 1;
            spec_rules.rename_satellite(&c_name, n_counter)
        } else {
            c_name.clone()
        };

        let path_dir_rel = spec_file
            .source
            .relative_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let path_dir_target = path_dir_dst.join(&path_dir_rel);
        let (c_name_final, b_disambiguated) =
            _claim_destination(&path_dir_target, c_name_new, &mut set_keys_dst);
        if b_disambiguated {
            warn!(
                source = %spec_file.source.relative_path.display(),
                name = %c_name_final,
                "destination name collision; added counter"
            );
        }
        debug!(
            source = %spec_file.source.relative_path.display(),
            name = %c_name_final,
            "name resolved"
        );

        l_slots[n_idx] = Some(SpecRenameAssignment {
            original_path: spec_file.source.original_path.clone(),
            relative_path: spec_file.source.relative_path.clone(),
            role: spec_file.role,
            document_kind: spec_file.source.document_kind,
            destination_path: path_dir_target.join(&c_name_final),
            new_file_name: c_name_final,
            disambiguated: b_disambiguated,
        });
    }

    Ok(SpecRenamePlan::from_assignments(
        spec_rules.identity_number().to_string(),
        path_dir_dst.to_path_buf(),
        l_slots.into_iter().flatten().collect(),
    ))
}

fn _claim_destination(
    path_dir_target: &Path,
    c_name: String,
    set_keys_dst: &mut HashSet<String>,
) -> (String, bool) {
    if set_keys_dst.insert(derive_folded_key(&path_dir_target.join(&c_name))) {
        return (c_name, false);
    }
    let (c_stem, c_ext) = split_file_name(&c_name);
    let mut n_suffix = 2_usize;
    loop {
        let c_candidate = join_file_name(&format!("{c_stem}-{n_suffix}"), c_ext);
        if set_keys_dst.insert(derive_folded_key(&path_dir_target.join(&c_candidate))) {
            return (c_candidate, true);
        }
        n_suffix += 1;
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};

    use super::{SpecRenameRules, resolve_names, split_file_name};
    use crate::spec::{
        EnumFileRole, EnumFixedSuffix, SpecClassifiedFile, SpecIdentity, SpecRenameOptions,
        SpecSearchReplace, SpecSourceFile,
    };

    fn identity() -> SpecIdentity {
        SpecIdentity::new("12345", "1", "2").expect("identity")
    }

    fn classified(relative: &str, role: EnumFileRole) -> SpecClassifiedFile {
        SpecClassifiedFile {
            source: SpecSourceFile::from_paths(
                Path::new("/src").join(relative),
                PathBuf::from(relative),
            ),
            role,
            is_selected: true,
        }
    }

    fn names_of(
        files: &[SpecClassifiedFile],
        spec_options: &SpecRenameOptions,
    ) -> Vec<(String, String)> {
        resolve_names(files, &identity(), spec_options, Path::new("/dst"))
            .expect("resolve")
            .assignments
            .iter()
            .map(|a| {
                (
                    a.relative_path.to_string_lossy().replace('\\', "/"),
                    a.new_file_name.clone(),
                )
            })
            .collect()
    }

    #[test]
    fn masters_take_identity_number() {
        let files = vec![
            classified("Bracket.ipt", EnumFileRole::Satellite),
            classified("Module_.iam", EnumFileRole::TopMaster),
            classified("Module_.ipj", EnumFileRole::ProjectMaster),
            classified("Readme.txt", EnumFileRole::PassThrough),
        ];
        let l_names = names_of(&files, &SpecRenameOptions::default());
        assert_eq!(
            l_names,
            vec![
                ("Bracket.ipt".to_string(), "Bracket.ipt".to_string()),
                ("Module_.iam".to_string(), "123450102.iam".to_string()),
                ("Module_.ipj".to_string(), "123450102.ipj".to_string()),
                ("Readme.txt".to_string(), "Readme.txt".to_string()),
            ]
        );
    }

    #[test]
    fn masters_keep_names_in_equipment_mode() {
        let files = vec![classified("Conveyor.iam", EnumFileRole::TopMaster)];
        let spec_options = SpecRenameOptions {
            if_rename_masters: false,
            if_apply_project_prefix: true,
            ..SpecRenameOptions::default()
        };
        assert_eq!(names_of(&files, &spec_options)[0].1, "Conveyor.iam");
    }

    #[test]
    fn satellite_rules_apply_in_order() {
        let spec_options = SpecRenameOptions {
            if_apply_project_prefix: true,
            prefix: Some("P".to_string()),
            suffix: Some("_S".to_string()),
            fixed_suffix: EnumFixedSuffix::parse("LH"),
            if_apply_incremental_suffix: true,
            ..SpecRenameOptions::default()
        };
        let spec_rules = SpecRenameRules::new(&identity(), &spec_options).expect("rules");
        assert_eq!(
            spec_rules.rename_satellite("Bracket.ipt", 3),
            "P123450102_Bracket_S_LH_03.ipt"
        );
    }

    #[test]
    fn satellite_rules_are_idempotent() {
        let spec_options = SpecRenameOptions {
            if_apply_project_prefix: true,
            prefix: Some("P".to_string()),
            suffix: Some("_S".to_string()),
            fixed_suffix: EnumFixedSuffix::parse("custom"),
            if_apply_incremental_suffix: true,
            ..SpecRenameOptions::default()
        };
        let spec_rules = SpecRenameRules::new(&identity(), &spec_options).expect("rules");
        for (n_idx, c_name) in ["Bracket.ipt", "p_Plate_S.ipt", "Frame_07.iam", "Shaft"]
            .iter()
            .enumerate()
        {
            let c_once = spec_rules.rename_satellite(c_name, n_idx + 1);
            let c_twice = spec_rules.rename_satellite(&c_once, n_idx + 1);
            assert_eq!(c_once, c_twice, "{c_name}");
        }
    }

    #[test]
    fn present_affixes_are_kept_as_spelled() {
        let spec_options = SpecRenameOptions {
            prefix: Some("PRE_".to_string()),
            suffix: Some("_lh".to_string()),
            ..SpecRenameOptions::default()
        };
        let spec_rules = SpecRenameRules::new(&identity(), &spec_options).expect("rules");
        assert_eq!(spec_rules.rename_satellite("pre_Arm_LH.ipt", 1), "pre_Arm_LH.ipt");
        assert_eq!(spec_rules.rename_satellite("Arm.ipt", 1), "PRE_Arm_lh.ipt");
    }

    #[test]
    fn prefix_like_stem_still_gets_project_prefix() {
        let spec_options = SpecRenameOptions {
            if_apply_project_prefix: true,
            prefix: Some("P".to_string()),
            suffix: Some("_S".to_string()),
            fixed_suffix: EnumFixedSuffix::parse("A"),
            ..SpecRenameOptions::default()
        };
        let spec_rules = SpecRenameRules::new(&identity(), &spec_options).expect("rules");
        assert_eq!(spec_rules.rename_satellite("Plate.ipt", 1), "P123450102_Plate_S_A.ipt");
        assert_eq!(
            spec_rules.rename_satellite("123450102_Plate_S.ipt", 1),
            "P123450102_Plate_S_A.ipt"
        );
        assert_eq!(spec_rules.rename_satellite("Plate_A.ipt", 1), "P123450102_Plate_A_S_A.ipt");
    }

    #[test]
    fn incremental_suffix_replaces_existing_counter() {
        let files = vec![
            classified("Bracket_07.ipt", EnumFileRole::Satellite),
            classified("Plate.ipt", EnumFileRole::Satellite),
        ];
        let spec_options = SpecRenameOptions {
            if_apply_incremental_suffix: true,
            ..SpecRenameOptions::default()
        };
        let l_names = names_of(&files, &spec_options);
        assert_eq!(l_names[0].1, "Bracket_01.ipt");
        assert_eq!(l_names[1].1, "Plate_02.ipt");
    }

    #[test]
    fn search_replace_is_case_insensitive_and_literal() {
        let spec_options = SpecRenameOptions {
            search_replace: Some(SpecSearchReplace {
                search: "bracket".to_string(),
                replace: "Support$1".to_string(),
            }),
            ..SpecRenameOptions::default()
        };
        let spec_rules = SpecRenameRules::new(&identity(), &spec_options).expect("rules");
        assert_eq!(
            spec_rules.rename_satellite("Top BRACKET.ipt", 1),
            "Top Support$1.ipt"
        );
    }

    #[test]
    fn special_suffix_overrides_other_rules() {
        let files = vec![
            classified(
                "Template_Décompte de DXF_DXF Count.xlsx",
                EnumFileRole::PassThrough,
            ),
            classified(
                "Old_Liste de vérification_Check List.xlsm",
                EnumFileRole::PassThrough,
            ),
        ];
        let spec_options = SpecRenameOptions {
            if_include_non_cad: true,
            if_apply_project_prefix: true,
            if_apply_incremental_suffix: true,
            ..SpecRenameOptions::default()
        };
        let l_names = names_of(&files, &spec_options);
        assert_eq!(l_names[0].1, "123450102_Décompte de DXF_DXF Count.xlsx");
        assert_eq!(l_names[1].1, "123450102_Liste de vérification_Check List.xlsm");
    }

    #[test]
    fn non_cad_files_untouched_unless_included() {
        let files = vec![classified("Readme.txt", EnumFileRole::PassThrough)];
        let mut spec_options = SpecRenameOptions {
            if_apply_project_prefix: true,
            ..SpecRenameOptions::default()
        };
        assert_eq!(names_of(&files, &spec_options)[0].1, "Readme.txt");

        spec_options.if_include_non_cad = true;
        assert_eq!(names_of(&files, &spec_options)[0].1, "123450102_Readme.txt");
    }

    #[test]
    fn deselected_files_get_no_assignment() {
        let mut files = vec![
            classified("Module_.iam", EnumFileRole::TopMaster),
            classified("Bracket.ipt", EnumFileRole::Satellite),
        ];
        files[1].is_selected = false;
        let spec_plan = resolve_names(
            &files,
            &identity(),
            &SpecRenameOptions::default(),
            Path::new("/dst"),
        )
        .expect("resolve");
        assert_eq!(spec_plan.len(), 1);
        assert!(spec_plan.lookup(Path::new("/src/Bracket.ipt")).is_none());
        assert!(spec_plan.lookup(Path::new("/src/Module_.iam")).is_some());
    }

    #[cfg(not(windows))]
    #[test]
    fn paths_differing_only_by_case_keep_separate_assignments() {
        let files = vec![
            classified("Parts/Bracket.ipt", EnumFileRole::Satellite),
            classified("parts/bracket.ipt", EnumFileRole::Satellite),
        ];
        let spec_plan = resolve_names(
            &files,
            &identity(),
            &SpecRenameOptions::default(),
            Path::new("/dst"),
        )
        .expect("resolve");
        assert_eq!(spec_plan.len(), 2);

        let spec_upper = spec_plan
            .lookup(Path::new("/src/Parts/Bracket.ipt"))
            .expect("upper-case entry");
        let spec_lower = spec_plan
            .lookup(Path::new("/src/parts/bracket.ipt"))
            .expect("lower-case entry");
        assert_eq!(spec_upper.destination_path, PathBuf::from("/dst/Parts/Bracket.ipt"));
        assert_eq!(spec_lower.destination_path, PathBuf::from("/dst/parts/bracket-2.ipt"));
        assert!(spec_lower.disambiguated);
        assert!(spec_plan.lookup(Path::new("/src/PARTS/BRACKET.ipt")).is_none());
    }

    #[test]
    fn collisions_get_counter_and_masters_win() {
        let files = vec![
            classified("Frame.iam", EnumFileRole::Satellite),
            classified("Module_.iam", EnumFileRole::TopMaster),
            classified("frame_old.iam", EnumFileRole::Satellite),
        ];
        let spec_options = SpecRenameOptions {
            search_replace: Some(SpecSearchReplace {
                search: "_old".to_string(),
                replace: String::new(),
            }),
            ..SpecRenameOptions::default()
        };
        let spec_plan = resolve_names(&files, &identity(), &spec_options, Path::new("/dst"))
            .expect("resolve");
        let l_names: Vec<&str> = spec_plan
            .assignments
            .iter()
            .map(|a| a.new_file_name.as_str())
            .collect();
        assert_eq!(l_names, vec!["Frame.iam", "123450102.iam", "frame-2.iam"]);
        assert!(spec_plan.assignments[2].disambiguated);
        assert!(!spec_plan.assignments[0].disambiguated);

        let files = vec![
            classified("123450102.iam", EnumFileRole::Satellite),
            classified("Module_.iam", EnumFileRole::TopMaster),
        ];
        let spec_plan = resolve_names(
            &files,
            &identity(),
            &SpecRenameOptions::default(),
            Path::new("/dst"),
        )
        .expect("resolve");
        assert_eq!(spec_plan.assignments[0].new_file_name, "123450102-2.iam");
        assert_eq!(spec_plan.assignments[1].new_file_name, "123450102.iam");
    }

    #[test]
    fn same_name_in_different_folders_both_survive() {
        let files = vec![
            classified("A/Panel.ipt", EnumFileRole::Satellite),
            classified("B/Panel.ipt", EnumFileRole::Satellite),
        ];
        let spec_plan = resolve_names(
            &files,
            &identity(),
            &SpecRenameOptions::default(),
            Path::new("/dst"),
        )
        .expect("resolve");
        assert_eq!(
            spec_plan.assignments[0].destination_path,
            PathBuf::from("/dst/A/Panel.ipt")
        );
        assert_eq!(
            spec_plan.assignments[1].destination_path,
            PathBuf::from("/dst/B/Panel.ipt")
        );
        assert!(spec_plan.assignments.iter().all(|a| !a.disambiguated));
    }

    #[test]
    fn destinations_unique_under_randomized_rules() {
        fn derive_name(seed: u64, n_idx: usize) -> String {
            let mut value = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            value ^= (n_idx as u64).wrapping_mul(0x9E3779B97F4A7C15);
            format!("P{:x}.ipt", value % 4)
        }

        for n_seed in 0_u64..30 {
            let files: Vec<SpecClassifiedFile> = (0..16)
                .map(|n_idx| {
                    let c_dir = if n_idx % 2 == 0 { "a" } else { "A" };
                    classified(
                        &format!("{c_dir}/{}", derive_name(n_seed, n_idx)),
                        EnumFileRole::Satellite,
                    )
                })
                .collect();
            let spec_options = SpecRenameOptions {
                if_apply_incremental_suffix: n_seed % 2 == 0,
                search_replace: Some(SpecSearchReplace {
                    search: "p".to_string(),
                    replace: "Q".to_string(),
                }),
                ..SpecRenameOptions::default()
            };
            let spec_plan = resolve_names(&files, &identity(), &spec_options, Path::new("/dst"))
                .expect("resolve");
            let set_keys: HashSet<String> = spec_plan
                .assignments
                .iter()
                .map(|a| a.destination_path.to_string_lossy().to_lowercase())
                .collect();
            assert_eq!(set_keys.len(), files.len());
        }
    }

    #[test]
    fn split_file_name_handles_dots() {
        assert_eq!(split_file_name("a.b.ipt"), ("a.b", Some("ipt")));
        assert_eq!(split_file_name("Makefile"), ("Makefile", None));
        assert_eq!(split_file_name(".gitignore"), (".gitignore", None));
    }
}
