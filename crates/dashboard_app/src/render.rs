//! Plain-text rendering of the view model.

use dashboard_core::{
    AppViewModel, DocumentRowView, HarvestJobView, PhaseRowView, SiteRowView, StatusIcon,
};

fn icon(icon: StatusIcon) -> &'static str {
    match icon {
        StatusIcon::Spinner => "…",
        StatusIcon::Check => "✓",
        StatusIcon::Cross => "✗",
        StatusIcon::Stop => "■",
        StatusIcon::Refresh => "↻",
        StatusIcon::Circle => "○",
    }
}

pub fn sites(view: &AppViewModel) -> String {
    if view.sites.is_empty() {
        return "no sites harvested yet".to_string();
    }
    let mut lines = vec![format!(
        "  {:>4}  {:<28} {:>7} {:>10} {:>8} {:>6}  {}",
        "ID", "NAME", "TOTAL", "DOWNLOADED", "ANALYZED", "ERRORS", "HARVESTER"
    )];
    lines.extend(view.sites.iter().map(site_row));
    let totals = view.site_totals;
    lines.push(format!(
        "  {:>4}  {:<28} {:>7} {:>10} {:>8} {:>6}",
        "", "all sites", totals.total, totals.downloaded, totals.analyzed, totals.analyze_errors
    ));
    lines.join("\n")
}

fn site_row(site: &SiteRowView) -> String {
    let marker = if site.selected { '*' } else { ' ' };
    let stats = site.stats;
    format!(
        "{marker} {:>4}  {:<28} {:>7} {:>10} {:>8} {:>6}  {}",
        site.id,
        site.name,
        stats.total,
        stats.downloaded,
        stats.analyzed,
        stats.analyze_errors,
        site.harvester_type.as_deref().unwrap_or("-")
    )
}

pub fn documents(view: &AppViewModel) -> String {
    let Some(site_id) = view.selected_site else {
        return "no site selected".to_string();
    };
    let mut lines = vec![format!(
        "site {site_id}: page {} ({} per page), {} document(s)",
        view.page, view.page_size, view.document_total
    )];
    if view.documents.is_empty() {
        lines.push("  (empty page)".to_string());
    }
    for document in &view.documents {
        lines.extend(document_rows(document));
    }
    lines.join("\n")
}

fn document_rows(document: &DocumentRowView) -> Vec<String> {
    let mut lines = vec![format!("{:>6}  {}", document.id, document.title)];
    lines.extend(
        document
            .phases
            .iter()
            .map(|row| format!("        {}", phase_row(row))),
    );
    lines
}

/// One line for a document phase: status plus whatever job state is known.
pub fn phase_row(row: &PhaseRowView) -> String {
    let mut line = format!(
        "{:<9} {} {}",
        row.key.phase.as_str(),
        icon(row.display.icon),
        row.display.label
    );
    if let Some(job_id) = &row.job_id {
        line.push_str(&format!("  [job {job_id}]"));
    }
    if let Some(action) = row.requested_action {
        line.push_str(&format!("  ({action} requested)"));
    }
    if let Some(error) = &row.error {
        line.push_str(&format!("  error: {error}"));
    }
    line
}

pub fn harvest(job: &HarvestJobView) -> String {
    let mut lines = vec![format!("harvest {}: {}", job.job_id, job.status.as_str())];
    for phase in &job.phases {
        let progress = if phase.total > 0 {
            format!("{:>6}/{}", phase.processed, phase.total)
        } else {
            String::new()
        };
        lines.push(format!(
            "  {:<9} {:<14}{}",
            phase.phase.as_str(),
            phase.label,
            progress
        ));
    }
    if !job.remaining.is_empty() {
        let remaining: Vec<&str> = job.remaining.iter().map(|phase| phase.as_str()).collect();
        lines.push(format!("  remaining: {}", remaining.join(", ")));
    }
    if let Some(error) = &job.error {
        lines.push(format!("  error: {error}"));
    }
    lines.join("\n")
}
