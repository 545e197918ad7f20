//! Optional TOML configuration file.
//!
//! Every table and key is optional; missing values keep the library
//! defaults and command-line flags override whatever the file sets.
//!
//! ```toml
//! [exclusions]
//! extensions_transient = ["bak", "lck", "tmp"]
//! patterns_exclude_files = ["*.pdf"]
//! pattern_mode = "glob"
//!
//! [masters]
//! names_sentinel_top = ["Module_.iam"]
//!
//! [naming]
//! project_prefix = true
//! fixed_suffix = "LH"
//!
//! [copy]
//! workers = 4
//! stamp_properties = true
//!
//! [paths]
//! dest_base = "/work/projects"
//! project_template = "/work/templates/projects"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use modkit_design_copy::{
    EnumFixedSuffix, EnumPatternMode, SpecDesignCopyOptions, SpecSearchReplace,
};
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub exclusions: ExclusionsSection,
    pub masters: MastersSection,
    pub naming: NamingSection,
    pub copy: CopySection,
    pub paths: PathsSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExclusionsSection {
    pub prefixes_temp_file: Option<Vec<String>>,
    pub extensions_transient: Option<Vec<String>>,
    pub names_excluded_dir: Option<Vec<String>>,
    pub patterns_exclude_files: Option<Vec<String>>,
    pub pattern_mode: Option<EnumPatternMode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MastersSection {
    pub names_sentinel_top: Option<Vec<String>>,
    pub names_sentinel_project: Option<Vec<String>>,
    pub match_main_project_pattern: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamingSection {
    pub rename_masters: Option<bool>,
    pub include_non_cad: Option<bool>,
    pub project_prefix: Option<bool>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub fixed_suffix: Option<String>,
    pub incremental: Option<bool>,
    pub search: Option<String>,
    pub replace: Option<String>,
    pub suffixes_special: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CopySection {
    pub workers: Option<usize>,
    pub stamp_properties: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsSection {
    pub dest_base: Option<PathBuf>,
    pub project_template: Option<PathBuf>,
}

/// Load the configuration file, or defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<FileConfig> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config = parse_config(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    tracing::info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<FileConfig> {
    Ok(toml::from_str(content)?)
}

impl FileConfig {
    /// Overlay the values present in the file onto `options`.
    pub fn apply_to(&self, options: &mut SpecDesignCopyOptions) -> Result<()> {
        let exclusions = &self.exclusions;
        if let Some(v) = &exclusions.prefixes_temp_file {
            options.exclusions.prefixes_temp_file = v.clone();
        }
        if let Some(v) = &exclusions.extensions_transient {
            options.exclusions.extensions_transient =
                v.iter().map(|ext| normalize_extension(ext)).collect();
        }
        if let Some(v) = &exclusions.names_excluded_dir {
            options.exclusions.names_excluded_dir = v.clone();
        }
        if let Some(v) = &exclusions.patterns_exclude_files {
            options.exclusions.patterns_exclude_files = Some(v.clone());
        }
        if let Some(v) = exclusions.pattern_mode {
            options.exclusions.rule_pattern = v;
        }

        let masters = &self.masters;
        if let Some(v) = &masters.names_sentinel_top {
            options.masters.names_sentinel_top = v.clone();
        }
        if let Some(v) = &masters.names_sentinel_project {
            options.masters.names_sentinel_project = v.clone();
        }
        if let Some(v) = masters.match_main_project_pattern {
            options.masters.if_match_main_project_pattern = v;
        }

        let naming = &self.naming;
        if let Some(v) = naming.rename_masters {
            options.rename.if_rename_masters = v;
        }
        if let Some(v) = naming.include_non_cad {
            options.rename.if_include_non_cad = v;
        }
        if let Some(v) = naming.project_prefix {
            options.rename.if_apply_project_prefix = v;
        }
        if let Some(v) = &naming.prefix {
            options.rename.prefix = Some(v.clone());
        }
        if let Some(v) = &naming.suffix {
            options.rename.suffix = Some(v.clone());
        }
        if let Some(v) = &naming.fixed_suffix {
            options.rename.fixed_suffix = Some(parse_fixed_suffix(v)?);
        }
        if let Some(v) = naming.incremental {
            options.rename.if_apply_incremental_suffix = v;
        }
        match (&naming.search, &naming.replace) {
            (Some(search), replace) => {
                options.rename.search_replace = Some(SpecSearchReplace {
                    search: search.clone(),
                    replace: replace.clone().unwrap_or_default(),
                });
            }
            (None, Some(_)) => bail!("[naming] `replace` requires `search`"),
            (None, None) => {}
        }
        if let Some(v) = &naming.suffixes_special {
            options.rename.suffixes_special = v.clone();
        }

        if let Some(v) = self.copy.workers {
            options.num_workers_max = Some(v);
        }
        if let Some(v) = self.copy.stamp_properties {
            options.if_stamp_properties = v;
        }
        if let Some(v) = &self.paths.project_template {
            options.dir_project_template = Some(v.clone());
        }
        Ok(())
    }
}

pub fn parse_fixed_suffix(value: &str) -> Result<EnumFixedSuffix> {
    match EnumFixedSuffix::parse(value) {
        Some(v) => Ok(v),
        None => bail!("invalid fixed suffix {value:?}"),
    }
}

fn normalize_extension(value: &str) -> String {
    value.trim().trim_start_matches('.').to_lowercase()
}

#[cfg(test)]
mod tests {
    use modkit_design_copy::{EnumFixedSuffix, EnumPatternMode, SpecDesignCopyOptions};

    use super::parse_config;

    #[test]
    fn empty_file_keeps_defaults() {
        let config = parse_config("").expect("parse");
        let mut options = SpecDesignCopyOptions::default();
        config.apply_to(&mut options).expect("apply");
        assert_eq!(options, SpecDesignCopyOptions::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse_config(
            r#"
[exclusions]
extensions_transient = [".BAK", "tmp"]
patterns_exclude_files = ["^draft_"]
pattern_mode = "regex"

[masters]
match_main_project_pattern = false

[naming]
project_prefix = true
fixed_suffix = "lh"
search = "Old"
replace = "New"

[copy]
workers = 3
stamp_properties = false

[paths]
dest_base = "/work/projects"
project_template = "/work/templates"
"#,
        )
        .expect("parse");
        let mut options = SpecDesignCopyOptions::default();
        config.apply_to(&mut options).expect("apply");

        assert_eq!(options.exclusions.extensions_transient, vec!["bak", "tmp"]);
        assert_eq!(options.exclusions.rule_pattern, EnumPatternMode::Regex);
        assert!(!options.masters.if_match_main_project_pattern);
        assert!(options.rename.if_apply_project_prefix);
        assert_eq!(
            options.rename.fixed_suffix,
            Some(EnumFixedSuffix::Listed("_LH".to_string()))
        );
        assert_eq!(
            options.rename.search_replace.as_ref().map(|v| v.replace.as_str()),
            Some("New")
        );
        assert_eq!(options.num_workers_max, Some(3));
        assert!(!options.if_stamp_properties);
        assert_eq!(
            options.dir_project_template.as_deref(),
            Some(std::path::Path::new("/work/templates"))
        );
        assert_eq!(
            config.paths.dest_base.as_deref(),
            Some(std::path::Path::new("/work/projects"))
        );
    }

    #[test]
    fn unknown_keys_and_orphan_replace_are_rejected() {
        assert!(parse_config("[naming]\nprefx = \"A\"\n").is_err());
        assert!(parse_config("[network]\nport = 1\n").is_err());

        let config = parse_config("[naming]\nreplace = \"X\"\n").expect("parse");
        let mut options = SpecDesignCopyOptions::default();
        assert!(config.apply_to(&mut options).is_err());
    }
}
