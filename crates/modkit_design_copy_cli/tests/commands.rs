//! Integration tests for the command layer.

use std::fs;
use std::path::Path;

use clap::Parser;
use modkit_design_copy::{EnumFileRole, EnumRunStatus, TextLinkDocumentService};
use modkit_design_copy_cli::cli::{Cli, Command};
use modkit_design_copy_cli::commands::{run_copy, run_scan};
use modkit_design_copy_cli::config::{FileConfig, parse_config};
use tempfile::TempDir;

fn write_text(path: &Path, txt: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, txt).expect("write");
}

fn build_template(src: &Path) {
    write_text(
        &src.join("Module_.iam"),
        &format!("@ref {}\n", src.join("Parts/Bracket.ipt").display()),
    );
    write_text(&src.join("Parts/Bracket.ipt"), "part\n");
    write_text(&src.join("Module_.ipj"), "project\n");
    write_text(&src.join("Docs/Readme.txt"), "notes\n");
    write_text(&src.join("Docs/Manual.pdf"), "pdf\n");
}

fn parse(args: &[&str]) -> Command {
    let mut l_args = vec!["modkit-design-copy"];
    l_args.extend_from_slice(args);
    Cli::try_parse_from(l_args).expect("parse").command
}

#[test]
fn scan_previews_names_with_identity() {
    let tmp = TempDir::new().expect("tempdir");
    let src = tmp.path().join("template");
    build_template(&src);
    let c_src = src.to_string_lossy().to_string();

    let Command::Scan(args) = parse(&[
        "scan",
        &c_src,
        "--project",
        "12345",
        "--reference",
        "1",
        "--module",
        "2",
        "--project-prefix",
        "--deselect",
        "Docs/*.pdf",
    ]) else {
        panic!("expected scan");
    };
    let result = run_scan(&args, &FileConfig::default()).expect("scan");

    assert_eq!(result.identity_number.as_deref(), Some("123450102"));
    let row_top = result
        .rows
        .iter()
        .find(|v| v.role == EnumFileRole::TopMaster)
        .expect("top master");
    assert_eq!(row_top.new_file_name.as_deref(), Some("123450102.iam"));
    let row_bracket = result
        .rows
        .iter()
        .find(|v| v.relative_path == "Parts/Bracket.ipt")
        .expect("bracket");
    assert_eq!(row_bracket.new_file_name.as_deref(), Some("123450102_Bracket.ipt"));
    let row_manual = result
        .rows
        .iter()
        .find(|v| v.relative_path == "Docs/Manual.pdf")
        .expect("manual");
    assert!(!row_manual.is_selected);
    assert_eq!(row_manual.new_file_name, None);

    let value = serde_json::to_value(&result).expect("json");
    assert_eq!(value["rows"].as_array().map(Vec::len), Some(5));
}

#[test]
fn copy_with_dest_base_uses_identity_layout() {
    let tmp = TempDir::new().expect("tempdir");
    let src = tmp.path().join("template");
    build_template(&src);
    let base = tmp.path().join("projects");
    let c_src = src.to_string_lossy().to_string();
    let c_base = base.to_string_lossy().to_string();

    let Command::Copy(args) = parse(&[
        "copy",
        &c_src,
        "--dest-base",
        &c_base,
        "--project",
        "42",
        "--reference",
        "3",
        "--module",
        "4",
        "--deselect",
        "Docs/Manual.pdf",
        "--workers",
        "1",
    ]) else {
        panic!("expected copy");
    };
    let report = run_copy(&args, &FileConfig::default()).expect("copy");

    let dst = base.join("00042/REF03/M04");
    assert_eq!(report.status, EnumRunStatus::Completed);
    assert!(dst.join("000420304.iam").is_file());
    assert!(dst.join("000420304.ipj").is_file());
    assert!(dst.join("Docs/Readme.txt").is_file());
    assert!(!dst.join("Docs/Manual.pdf").exists());
    assert_eq!(
        TextLinkDocumentService::read_references(&dst.join("000420304.iam")).expect("refs"),
        vec![dst.join("Parts/Bracket.ipt")]
    );
}

#[test]
fn copy_without_project_file_uses_project_template() {
    let tmp = TempDir::new().expect("tempdir");
    let src = tmp.path().join("template");
    build_template(&src);
    let dir_template = tmp.path().join("project_templates");
    write_text(&dir_template.join("Library_2026.ipj"), "library\n");
    let dst = tmp.path().join("out");
    let c_src = src.to_string_lossy().to_string();
    let c_dst = dst.to_string_lossy().to_string();
    let c_template = dir_template.to_string_lossy().to_string();

    let Command::Copy(args) = parse(&[
        "copy",
        &c_src,
        "--dest",
        &c_dst,
        "--project",
        "12345",
        "--reference",
        "1",
        "--module",
        "2",
        "--deselect",
        "Module_.ipj",
        "--project-template",
        &c_template,
        "--no-properties",
    ]) else {
        panic!("expected copy");
    };
    let report = run_copy(&args, &FileConfig::default()).expect("copy");

    assert_eq!(report.status, EnumRunStatus::Completed);
    assert_eq!(
        fs::read_to_string(dst.join("123450102.ipj")).expect("read"),
        "library\n"
    );
    assert!(
        TextLinkDocumentService::read_properties(&dst.join("123450102.iam"))
            .expect("props")
            .is_empty()
    );
}

#[test]
fn config_file_naming_applies_and_flags_win() {
    let tmp = TempDir::new().expect("tempdir");
    let src = tmp.path().join("template");
    build_template(&src);
    let dst = tmp.path().join("out");
    let c_src = src.to_string_lossy().to_string();
    let c_dst = dst.to_string_lossy().to_string();

    let config = parse_config(
        r#"
[naming]
project_prefix = true
fixed_suffix = "RH"

[exclusions]
patterns_exclude_files = ["*.pdf"]
"#,
    )
    .expect("config");

    let Command::Copy(args) = parse(&[
        "copy",
        &c_src,
        "--dest",
        &c_dst,
        "--project",
        "12345",
        "--reference",
        "1",
        "--module",
        "2",
        "--fixed-suffix",
        "LH",
    ]) else {
        panic!("expected copy");
    };
    let report = run_copy(&args, &config).expect("copy");

    assert_eq!(report.status, EnumRunStatus::Completed);
    assert!(dst.join("Parts/123450102_Bracket_LH.ipt").is_file());
    assert!(!dst.join("Docs/Manual.pdf").exists());
}

#[test]
fn copy_without_destination_is_an_error() {
    let tmp = TempDir::new().expect("tempdir");
    let src = tmp.path().join("template");
    build_template(&src);
    let c_src = src.to_string_lossy().to_string();

    let Command::Copy(args) = parse(&[
        "copy",
        &c_src,
        "--project",
        "1",
        "--reference",
        "1",
        "--module",
        "1",
    ]) else {
        panic!("expected copy");
    };
    assert!(run_copy(&args, &FileConfig::default()).is_err());
}
