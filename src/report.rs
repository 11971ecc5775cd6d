use std::fmt::Write;

use crate::models::{status_text, DetailRecord, PermissionScope, SessionContext, UnitAggregate};

fn scope_label(session: &SessionContext) -> String {
    match &session.scope {
        PermissionScope::Unrestricted => "all ICs".to_string(),
        PermissionScope::UnitScoped(code) => format!("IC {code}"),
        PermissionScope::NoAccess => "no ICs".to_string(),
    }
}

pub fn render_summary(session: &SessionContext, rows: &[&UnitAggregate]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Educational Validation Report");
    let _ = writeln!(
        output,
        "Generated for {} ({})",
        session.person_id,
        scope_label(session)
    );
    let _ = writeln!(output);

    if rows.iter().all(|row| row.is_total()) {
        let _ = writeln!(output, "No ICs match this filter.");
        let _ = writeln!(output);
    }

    let _ = writeln!(
        output,
        "| IC | Name | In Draft | Pending Approval | Approved | Self Approved | Rejected | Submitted | No Action Yet | Population |"
    );
    let _ = writeln!(output, "|---|---|---:|---:|---:|---:|---:|---:|---:|---:|");
    for row in rows {
        let population = row
            .population
            .map_or_else(|| "-".to_string(), |value| value.to_string());
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |",
            row.code,
            row.text,
            row.counts.draft,
            row.counts.pending_approval,
            row.counts.approved,
            row.counts.self_approved,
            row.counts.rejected,
            row.total,
            row.no_action_yet,
            population
        );
    }

    output
}

pub fn render_details(title: &str, records: &[&DetailRecord]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "## {title}");

    if records.is_empty() {
        let _ = writeln!(output, "No validation records for this selection.");
        return output;
    }

    let _ = writeln!(output, "| PSID | IC | Status | Last Modified | Submitted By | Approver |");
    let _ = writeln!(output, "|---|---|---|---|---|---|");
    for record in records {
        let status = match status_text(&record.status) {
            "" => record.status.as_str(),
            text => text,
        };
        let modified = record
            .last_modified
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} |",
            record.person_id.as_deref().unwrap_or(""),
            record.unit_text.as_deref().unwrap_or(""),
            status,
            modified,
            record.submitted_by.as_deref().unwrap_or(""),
            record.approver.as_deref().unwrap_or("")
        );
    }

    output
}
