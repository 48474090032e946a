use kinerja::pipeline::{
    ImportReport, MatchTier, NameMatchResult, ResolutionRequest, ValidationIssue,
};

pub(crate) fn render_import_report(report: &ImportReport) {
    let summary = &report.validation.summary;

    println!("Performance import");
    println!(
        "- {} employees | {} competencies | severity {}",
        summary.total_employees,
        summary.total_competencies,
        report.validation.severity.label()
    );
    println!(
        "- {}/{} complete records ({:.2}%, {})",
        summary.valid_employees,
        summary.total_employees,
        summary.data_completeness_percent,
        summary.score_quality_label
    );
    if !summary.missing_required_competencies.is_empty() {
        println!(
            "- Missing required competencies: {}",
            summary.missing_required_competencies.join(", ")
        );
    }

    println!("\nEmployees:");
    for employee in &report.employees {
        println!(
            "  - {} [{} via {}]",
            employee.name,
            employee.organizational_level,
            employee.level_source.label()
        );
        for entry in &employee.performance {
            println!("      {:<32} {:>6.2}", entry.competency_name, entry.score);
        }
    }

    println!("\nName reconciliation:");
    for result in &report.name_matches {
        println!("  - {}", describe_match(result));
    }

    render_issues("Errors", &report.validation.errors);
    render_issues("Warnings", &report.validation.warnings);
}

pub(crate) fn render_resolution_request(request: &ResolutionRequest) {
    println!("Import paused: some header names are not in the employee directory");
    for name in &request.unresolved_names {
        println!("  - {name}");
    }

    if !request.partial_directory_mapping.is_empty() {
        println!("\nAlready matched:");
        for (name, level) in &request.partial_directory_mapping {
            println!("  - {name} [{level}]");
        }
    }

    println!(
        "\nRe-run with --resolutions <FILE>, a JSON object keyed by the names above, e.g."
    );
    println!(
        r#"  {{"<name>": {{"kind": "existing", "directory_name": "<directory name>", "organizational_level": "<level>"}}}}"#
    );
    println!(r#"  {{"<name>": {{"kind": "new_employee", "organizational_level": "<level>"}}}}"#);
}

fn describe_match(result: &NameMatchResult) -> String {
    match (result.tier, result.matched_directory_name.as_deref()) {
        (Some(MatchTier::Exact), _) => format!("{} (exact)", result.source_name),
        (Some(MatchTier::Normalized), Some(name)) => {
            format!("{} -> {} (normalized)", result.source_name, name)
        }
        (Some(MatchTier::Fuzzy), Some(name)) => format!(
            "{} -> {} (approximate, {:.0}% similar)",
            result.source_name,
            name,
            result.confidence * 100.0
        ),
        (Some(MatchTier::Resolved), Some(name)) => {
            format!("{} -> {} (resolved)", result.source_name, name)
        }
        _ if result.is_new_employee => format!("{} (new employee)", result.source_name),
        _ => format!("{} (unresolved)", result.source_name),
    }
}

fn render_issues(title: &str, issues: &[ValidationIssue]) {
    if issues.is_empty() {
        return;
    }

    println!("\n{title}:");
    for issue in issues {
        println!("  - {}", issue.message);
    }
}
