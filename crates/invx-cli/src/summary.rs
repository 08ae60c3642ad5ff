use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use invx_cli::commands::{ExtractReport, ValidationReport};
use invx_extract::{Identification, IdentificationStatus};
use invx_model::{ExtractionMethod, MappingResult, ReviewType};

pub fn print_extraction(report: &ExtractReport) {
    let outcome = &report.outcome;
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Field"),
        header_cell("Value"),
        header_cell("Method"),
        header_cell("Tier"),
        header_cell("Score"),
        header_cell("Review"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 4, CellAlignment::Right);

    for field in &outcome.fields {
        let method = field
            .method
            .as_ref()
            .map_or("default", ExtractionMethod::as_str);
        let mut value = Cell::new(&field.value);
        if let Some(error) = &field.validation_error {
            value = Cell::new(format!("{} ({error})", field.value)).fg(Color::Yellow);
        }
        table.add_row(vec![
            Cell::new(&field.field_name),
            value,
            dim_cell(method),
            dim_cell(field.assessment.tier),
            Cell::new(format!("{:.2}", field.assessment.score)),
            review_cell(field.assessment.review_type),
        ]);
    }
    for unmatched in &outcome.unmatched {
        let name = if unmatched.is_required {
            Cell::new(format!("{} *", unmatched.field_name))
                .fg(Color::Red)
                .add_attribute(Attribute::Bold)
        } else {
            Cell::new(&unmatched.field_name)
        };
        table.add_row(vec![
            name,
            dim_cell(&unmatched.reason),
            dim_cell("-"),
            dim_cell("-"),
            dim_cell("-"),
            dim_cell("-"),
        ]);
    }
    println!("{table}");

    let stats = &outcome.statistics;
    println!(
        "Fields: {}/{} extracted, average score {:.2}, {} ms",
        stats.mapped_fields, stats.total_fields, stats.average_score, stats.processing_time_ms
    );
    println!(
        "Review: {} auto-approve, {} quick, {} full",
        report.summary.count(ReviewType::AutoApprove),
        report.summary.count(ReviewType::QuickReview),
        report.summary.count(ReviewType::FullReview)
    );
    if !report.summary.missing_required.is_empty() {
        println!(
            "Missing required: {}",
            report.summary.missing_required.join(", ")
        );
    }
}

pub fn print_identification(identification: &Identification) {
    match (&identification.company_code, &identification.company_name) {
        (Some(code), Some(name)) => println!("Company: {name} ({code})"),
        _ => println!(
            "Company: unidentified ({})",
            identification.reason.as_deref().unwrap_or("no_match")
        ),
    }
    println!(
        "Status: {} ({:.0})",
        identification.status, identification.confidence
    );
    if identification.status == IdentificationStatus::Unidentified {
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Signal"),
        header_cell("Pattern"),
        header_cell("Matched"),
        header_cell("Points"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Right);
    for signal in &identification.signals {
        table.add_row(vec![
            Cell::new(format!("{:?}", signal.kind)),
            Cell::new(&signal.pattern),
            signal
                .matched_value
                .as_deref()
                .map_or_else(|| dim_cell("-"), Cell::new),
            Cell::new(format!("{:.0}", signal.score)),
        ]);
    }
    println!("{table}");
}

pub fn print_mapping(result: &MappingResult) {
    if let Some(error) = &result.error {
        println!("Mapping failed: {error}");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Target"),
        header_cell("Value"),
        header_cell("Transform"),
        header_cell("Rule"),
        header_cell("Config"),
    ]);
    apply_table_style(&mut table);
    for field in &result.mapped_fields {
        let config = field
            .applied_config
            .as_ref()
            .map_or_else(|| "-".to_string(), |c| format!("{} ({})", c.config_id, c.scope));
        table.add_row(vec![
            Cell::new(&field.target_field),
            field.value.as_deref().map_or_else(|| dim_cell("null"), Cell::new),
            dim_cell(field.transform_type),
            Cell::new(field.rule_id.as_deref().unwrap_or("-")),
            dim_cell(config),
        ]);
    }
    for field in &result.unmapped_fields {
        table.add_row(vec![
            Cell::new(&field.target_field).fg(Color::Yellow),
            Cell::new(&field.reason).fg(Color::Yellow),
            dim_cell("-"),
            Cell::new(field.rule_id.as_deref().unwrap_or("-")),
            dim_cell("-"),
        ]);
    }
    println!("{table}");
    println!(
        "Mapped {} of {} targets using {} config(s), {} rule(s) in {} ms ({} cache hit(s))",
        result.mapped_fields.len(),
        result.mapped_fields.len() + result.unmapped_fields.len(),
        result.configs_used,
        result.rules_applied,
        result.execution_time_ms,
        result.diagnostics.cache_hits
    );
}

pub fn print_validation(report: &ValidationReport) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Config"),
        header_cell("Scope"),
        header_cell("Version"),
        header_cell("Rules"),
        header_cell("Status"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    for check in &report.checks {
        let status = if check.issues.is_empty() {
            Cell::new(if check.is_active { "ok" } else { "ok (inactive)" }).fg(Color::Green)
        } else {
            Cell::new(check.issues.join("\n")).fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(&check.config_id),
            dim_cell(&check.key),
            Cell::new(check.version),
            Cell::new(check.rules),
            status,
        ]);
    }
    println!("{table}");
    println!(
        "{} config(s), {} issue(s)",
        report.checks.len(),
        report.issue_count()
    );
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
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

fn review_cell(review_type: ReviewType) -> Cell {
    let color = match review_type {
        ReviewType::AutoApprove => Color::Green,
        ReviewType::QuickReview => Color::Yellow,
        ReviewType::FullReview => Color::Red,
    };
    Cell::new(review_type).fg(color)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
