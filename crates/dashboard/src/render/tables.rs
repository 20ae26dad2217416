use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use protocol::ChatMessage;
use protocol::crm::{Alert, Lead, ReportDay, ReportTotals, Template, WorkspaceSummary};

pub(crate) fn parse_instant(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|value| DateTime::parse_from_rfc3339(value.trim()).ok())
        .map(|at| at.with_timezone(&Utc))
}

/// Unread conversations first, then most recent activity; undated leads last.
pub(crate) fn sort_leads(leads: &mut [Lead]) {
    leads.sort_by(|a, b| {
        b.unread
            .cmp(&a.unread)
            .then_with(|| newest_first(&a.last_message_at, &b.last_message_at))
            .then_with(|| a.display_name().cmp(b.display_name()))
    });
}

pub(crate) fn sort_alerts(alerts: &mut [Alert]) {
    alerts.sort_by(|a, b| newest_first(&a.at, &b.at));
}

pub(crate) fn sort_templates(templates: &mut [Template]) {
    templates.sort_by_cached_key(|template| template.name.to_lowercase());
}

pub(crate) fn sort_workspaces(workspaces: &mut [WorkspaceSummary]) {
    workspaces.sort_by_cached_key(|workspace| workspace.name.to_lowercase());
}

/// Oldest first; undated messages keep their relative order after the dated ones.
pub(crate) fn sort_chat(messages: &mut [ChatMessage]) {
    messages.sort_by(|a, b| {
        match (parse_instant(a.at.as_deref()), parse_instant(b.at.as_deref())) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

pub(crate) fn sort_report_days(days: &mut [ReportDay]) {
    days.sort_by(|a, b| a.day.cmp(&b.day));
}

pub(crate) fn report_totals(days: &[ReportDay]) -> ReportTotals {
    days.iter().fold(ReportTotals::default(), |mut totals, day| {
        totals.sent = totals.sent.saturating_add(day.sent);
        totals.delivered = totals.delivered.saturating_add(day.delivered);
        totals.failed = totals.failed.saturating_add(day.failed);
        totals.replies = totals.replies.saturating_add(day.replies);
        totals
    })
}

fn newest_first(a: &Option<String>, b: &Option<String>) -> Ordering {
    match (parse_instant(a.as_deref()), parse_instant(b.as_deref())) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Fixed-width plain-text table for terminal output.
pub(crate) struct TextTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    pub(crate) fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|header| header.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub(crate) fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (index, cell) in row.iter().enumerate() {
                let width = single_line(cell).chars().count();
                match widths.get_mut(index) {
                    Some(current) => *current = (*current).max(width),
                    None => widths.push(width),
                }
            }
        }
        let mut out = String::new();
        push_line(&mut out, &self.headers, &widths);
        let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
        push_line(&mut out, &rule, &widths);
        for row in &self.rows {
            push_line(&mut out, row, &widths);
        }
        out
    }
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let mut line = String::new();
    for (index, width) in widths.iter().enumerate() {
        let cell = cells.get(index).map(|cell| single_line(cell)).unwrap_or_default();
        if index > 0 {
            line.push_str("  ");
        }
        line.push_str(&cell);
        let pad = width.saturating_sub(cell.chars().count());
        line.extend(std::iter::repeat(' ').take(pad));
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

fn single_line(cell: &str) -> String {
    cell.replace(['\n', '\r', '\t'], " ")
}
