//! Terminal output for scan previews and copy reports.

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use modkit_design_copy::{EnumFileRole, EnumRunStatus, ReportDesignCopy};

use crate::commands::{ScanResult, ScanRow};

pub fn print_scan(result: &ScanResult) {
    println!("Source: {}", result.source.display());
    if let Some(identity_number) = &result.identity_number {
        println!("Identity: {identity_number}");
    }
    println!("{}", build_scan_table(&result.rows));
    println!(
        "{} files, {} selected, {} excluded",
        result.rows.len(),
        result.rows.iter().filter(|v| v.is_selected).count(),
        result.cnt_excluded
    );
    print_warnings(&result.warnings);
}

pub fn build_scan_table(rows: &[ScanRow]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("File"),
        header_cell("Kind"),
        header_cell("Role"),
        header_cell("Selected"),
        header_cell("New name"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Center);
    for row in rows {
        let file_name = row
            .relative_path
            .rsplit('/')
            .next()
            .unwrap_or(row.relative_path.as_str());
        table.add_row(vec![
            Cell::new(&row.relative_path),
            Cell::new(format!("{:?}", row.document_kind)),
            role_cell(row.role),
            selected_cell(row.is_selected),
            new_name_cell(row.new_file_name.as_deref(), file_name),
        ]);
    }
    table
}

pub fn print_report(report: &ReportDesignCopy) {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Counter"), header_cell("Value")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    table.add_row(vec![Cell::new("Status"), status_cell(report.status)]);
    let dict_counts = report.to_dict();
    for (label, key, color) in [
        ("Files copied", "cnt_files_copied", Color::Green),
        ("Files failed", "cnt_files_failed", Color::Red),
        ("Folders created", "cnt_folders_created", Color::Green),
        ("Files skipped", "cnt_files_skipped", Color::Yellow),
        ("References repointed", "cnt_references_repointed", Color::Green),
        ("Documents flagged", "cnt_flagged", Color::Yellow),
        ("Warnings", "cnt_warnings", Color::Yellow),
    ] {
        table.add_row(vec![
            Cell::new(label),
            count_cell(dict_counts.get(key).copied().unwrap_or(0), color),
        ]);
    }
    table.add_row(vec![
        Cell::new("Elapsed"),
        Cell::new(format!("{} ms", report.elapsed().num_milliseconds())),
    ]);
    println!("{table}");

    if let Some(message) = &report.fatal {
        eprintln!("error: {message}");
    }
    if !report.failures.is_empty() {
        eprintln!("Failures:");
        for spec_failure in &report.failures {
            eprintln!(
                "- {} ({:?}): {}",
                spec_failure.path.display(),
                spec_failure.kind,
                spec_failure.message
            );
        }
    }
    if !report.flagged.is_empty() {
        eprintln!("Documents with unresolved references:");
        for spec_failure in &report.flagged {
            eprintln!("- {}: {}", spec_failure.path.display(), spec_failure.message);
        }
    }
    print_warnings(&report.warnings);
}

fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    eprintln!("Warnings:");
    for warning in warnings {
        eprintln!("- {warning}");
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(140);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}

fn role_cell(role: EnumFileRole) -> Cell {
    match role {
        EnumFileRole::TopMaster => Cell::new("top master")
            .fg(Color::Magenta)
            .add_attribute(Attribute::Bold),
        EnumFileRole::ProjectMaster => Cell::new("project master")
            .fg(Color::Magenta)
            .add_attribute(Attribute::Bold),
        EnumFileRole::Satellite => Cell::new("satellite"),
        EnumFileRole::PassThrough => dim_cell("pass-through"),
    }
}

fn selected_cell(is_selected: bool) -> Cell {
    if is_selected {
        Cell::new("✓").fg(Color::Green).add_attribute(Attribute::Bold)
    } else {
        dim_cell("-")
    }
}

fn new_name_cell(new_file_name: Option<&str>, file_name: &str) -> Cell {
    match new_file_name {
        Some(v) if v != file_name => Cell::new(v).fg(Color::Green),
        Some(v) => dim_cell(v),
        None => dim_cell("-"),
    }
}

fn count_cell(count: u64, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn status_cell(status: EnumRunStatus) -> Cell {
    let (label, color) = match status {
        EnumRunStatus::Completed => ("completed", Color::Green),
        EnumRunStatus::CompletedWithFailures => ("completed with failures", Color::Yellow),
        EnumRunStatus::NoFilesFound => ("no files found", Color::Yellow),
        EnumRunStatus::Cancelled => ("cancelled", Color::Yellow),
        EnumRunStatus::Failed => ("failed", Color::Red),
    };
    Cell::new(label).fg(color).add_attribute(Attribute::Bold)
}
