//! HTML fragments for the dashboard views.
//!
//! Server-supplied text only reaches markup through [`Html`], which escapes
//! every text node and attribute value with [`escape_html`]. Tag and
//! attribute names are `&'static str`, so they cannot come from the wire.

use std::borrow::Cow;

use protocol::crm::{
    Alert, AutomationSettings, BillingInfo, Lead, MediaItem, ReportDay, Template, WorkspaceSummary,
};
use protocol::{ChatMessage, MessageDirection, ScheduledSend};

use crate::runtime::format_send_at;
use crate::state::{QrDisplay, StatusView};

use super::tables::{
    report_totals, sort_alerts, sort_chat, sort_leads, sort_report_days, sort_templates,
    sort_workspaces,
};

pub(crate) fn escape_html(text: &str) -> Cow<'_, str> {
    html_escape::encode_safe(text)
}

#[derive(Default)]
pub(crate) struct Html {
    out: String,
}

impl Html {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn open(&mut self, tag: &'static str, attrs: &[(&'static str, &str)]) -> &mut Self {
        self.out.push('<');
        self.out.push_str(tag);
        for (name, value) in attrs {
            self.out.push(' ');
            self.out.push_str(name);
            self.out.push_str("=\"");
            self.out.push_str(&escape_html(value));
            self.out.push('"');
        }
        self.out.push('>');
        self
    }

    pub(crate) fn close(&mut self, tag: &'static str) -> &mut Self {
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push('>');
        self
    }

    pub(crate) fn text(&mut self, text: &str) -> &mut Self {
        self.out.push_str(&escape_html(text));
        self
    }

    pub(crate) fn element(
        &mut self,
        tag: &'static str,
        attrs: &[(&'static str, &str)],
        text: &str,
    ) -> &mut Self {
        self.open(tag, attrs).text(text).close(tag)
    }

    pub(crate) fn finish(self) -> String {
        self.out
    }
}

fn header_row(html: &mut Html, headers: &[&str]) {
    html.open("thead", &[]).open("tr", &[]);
    for header in headers {
        html.element("th", &[], header);
    }
    html.close("tr").close("thead");
}

fn data_row(html: &mut Html, attrs: &[(&'static str, &str)], cells: &[&str]) {
    html.open("tr", attrs);
    for cell in cells {
        html.element("td", &[], cell);
    }
    html.close("tr");
}

fn empty_state(text: &str) -> String {
    let mut html = Html::new();
    html.element("p", &[("class", "empty")], text);
    html.finish()
}

pub(crate) fn leads_table(leads: &[Lead]) -> String {
    if leads.is_empty() {
        return empty_state("No leads yet.");
    }
    let mut leads = leads.to_vec();
    sort_leads(&mut leads);
    let mut html = Html::new();
    html.open("table", &[("class", "leads")]);
    header_row(&mut html, &["Name", "Phone", "Status", "Tags", "Unread", "Last message"]);
    html.open("tbody", &[]);
    for lead in &leads {
        let unread = lead.unread.to_string();
        let tags = lead.tags.join(", ");
        let class = if lead.takeover { "lead takeover" } else { "lead" };
        data_row(
            &mut html,
            &[("class", class), ("data-id", lead.id.as_str())],
            &[
                lead.display_name(),
                lead.phone.as_str(),
                lead.status.as_deref().unwrap_or(""),
                tags.as_str(),
                unread.as_str(),
                lead.last_message_at.as_deref().unwrap_or(""),
            ],
        );
    }
    html.close("tbody").close("table");
    html.finish()
}

pub(crate) fn report_table(days: &[ReportDay]) -> String {
    if days.is_empty() {
        return empty_state("No campaign activity yet.");
    }
    let mut days = days.to_vec();
    sort_report_days(&mut days);
    let totals = report_totals(&days);
    let mut html = Html::new();
    html.open("table", &[("class", "report")]);
    header_row(&mut html, &["Day", "Sent", "Delivered", "Failed", "Replies"]);
    html.open("tbody", &[]);
    for day in &days {
        let cells = [
            day.sent.to_string(),
            day.delivered.to_string(),
            day.failed.to_string(),
            day.replies.to_string(),
        ];
        data_row(
            &mut html,
            &[],
            &[day.day.as_str(), &cells[0], &cells[1], &cells[2], &cells[3]],
        );
    }
    html.close("tbody").open("tfoot", &[]);
    let cells = [
        totals.sent.to_string(),
        totals.delivered.to_string(),
        totals.failed.to_string(),
        totals.replies.to_string(),
    ];
    data_row(
        &mut html,
        &[("class", "totals")],
        &["Total", &cells[0], &cells[1], &cells[2], &cells[3]],
    );
    html.close("tfoot").close("table");
    html.finish()
}

pub(crate) fn templates_list(templates: &[Template]) -> String {
    if templates.is_empty() {
        return empty_state("No templates saved.");
    }
    let mut templates = templates.to_vec();
    sort_templates(&mut templates);
    let mut html = Html::new();
    html.open("ul", &[("class", "templates")]);
    for template in &templates {
        html.open("li", &[("data-id", template.id.as_str())])
            .element("strong", &[], &template.name)
            .element("p", &[], &template.body)
            .close("li");
    }
    html.close("ul");
    html.finish()
}

pub(crate) fn alerts_list(alerts: &[Alert]) -> String {
    if alerts.is_empty() {
        return empty_state("No alerts.");
    }
    let mut alerts = alerts.to_vec();
    sort_alerts(&mut alerts);
    let mut html = Html::new();
    html.open("ul", &[("class", "alerts")]);
    for alert in &alerts {
        let class = format!("alert {}", alert.level.as_str());
        html.open("li", &[("class", class.as_str())])
            .element("time", &[], alert.at.as_deref().unwrap_or(""))
            .text(" ")
            .element("span", &[], &alert.message)
            .close("li");
    }
    html.close("ul");
    html.finish()
}

pub(crate) fn automation_table(settings: &AutomationSettings) -> String {
    if settings.toggles.is_empty() {
        return empty_state("No automation toggles.");
    }
    let mut html = Html::new();
    html.open("table", &[("class", "automation")]);
    header_row(&mut html, &["Toggle", "State"]);
    html.open("tbody", &[]);
    for (name, enabled) in &settings.toggles {
        let state = if *enabled { "on" } else { "off" };
        data_row(&mut html, &[("data-state", state)], &[name.as_str(), state]);
    }
    html.close("tbody").close("table");
    html.finish()
}

pub(crate) fn media_table(media: &[MediaItem]) -> String {
    if media.is_empty() {
        return empty_state("No media uploaded.");
    }
    let mut html = Html::new();
    html.open("table", &[("class", "media")]);
    header_row(&mut html, &["File", "Type", "Size"]);
    html.open("tbody", &[]);
    for item in media {
        let size = item.size.map(|size| size.to_string()).unwrap_or_default();
        data_row(
            &mut html,
            &[("data-id", item.id.as_str())],
            &[
                item.file_name.as_str(),
                item.mime_type.as_deref().unwrap_or(""),
                size.as_str(),
            ],
        );
    }
    html.close("tbody").close("table");
    html.finish()
}

pub(crate) fn schedules_table(schedules: &[ScheduledSend]) -> String {
    if schedules.is_empty() {
        return empty_state("No scheduled campaigns.");
    }
    let mut html = Html::new();
    html.open("table", &[("class", "schedules")]);
    header_row(&mut html, &["Send at", "Recipients", "Messages"]);
    html.open("tbody", &[]);
    for schedule in schedules {
        let send_at = format_send_at(&schedule.send_at);
        let recipients = schedule
            .recipients
            .map(|count| count.to_string())
            .unwrap_or_default();
        let messages = schedule.messages.len().to_string();
        data_row(
            &mut html,
            &[("data-id", schedule.id.as_deref().unwrap_or(""))],
            &[send_at.as_str(), recipients.as_str(), messages.as_str()],
        );
    }
    html.close("tbody").close("table");
    html.finish()
}

/// Chronological transcript; undated messages go last.
pub(crate) fn chat_transcript(contact_id: &str, messages: &[ChatMessage], takeover: bool) -> String {
    let mut messages = messages.to_vec();
    sort_chat(&mut messages);
    let mut html = Html::new();
    html.open("section", &[("class", "chat"), ("data-contact", contact_id)]);
    if takeover {
        html.element("p", &[("class", "takeover")], "Agent takeover active");
    }
    if messages.is_empty() {
        html.element("p", &[("class", "empty")], "No messages yet.");
    }
    for message in &messages {
        let class = match (message.direction, message.from_agent) {
            (MessageDirection::Inbound, _) => "msg in",
            (MessageDirection::Outbound, true) => "msg out agent",
            (MessageDirection::Outbound, false) => "msg out",
        };
        html.open("div", &[("class", class)])
            .element("p", &[], &message.body);
        if let Some(at) = message.at.as_deref() {
            html.element("time", &[], at);
        }
        html.close("div");
    }
    html.close("section");
    html.finish()
}

pub(crate) fn billing_card(billing: &BillingInfo) -> String {
    let usage = match billing.messages_limit {
        Some(limit) => format!("{} / {} messages", billing.messages_used, limit),
        None => format!("{} messages", billing.messages_used),
    };
    let mut html = Html::new();
    html.open("div", &[("class", "billing")])
        .element("h3", &[], &billing.plan)
        .element("p", &[("class", "status")], billing.status.as_deref().unwrap_or("active"))
        .element("p", &[("class", "usage")], &usage);
    if let Some(renews_at) = billing.renews_at.as_deref() {
        html.element("p", &[("class", "renews")], &format!("Renews {renews_at}"));
    }
    html.close("div");
    html.finish()
}

pub(crate) fn status_card(view: &StatusView) -> String {
    let recipients = format!("{} recipients", view.recipients_count);
    let mut html = Html::new();
    html.open(
        "div",
        &[
            ("class", "session-status"),
            ("data-workspace", view.workspace_id.as_str()),
            ("data-authenticated", if view.authenticated { "true" } else { "false" }),
        ],
    )
    .element("h3", &[], &view.status_text);
    match &view.qr {
        QrDisplay::Image(url) if url.starts_with("data:image/") => {
            html.open("img", &[("class", "qr"), ("alt", "QR code"), ("src", url.as_str())]);
        }
        QrDisplay::Placeholder(text) => {
            html.element("p", &[("class", "qr-placeholder")], text);
        }
        QrDisplay::Image(_) | QrDisplay::Hidden => {}
    }
    html.element("p", &[("class", "elapsed")], &view.elapsed_text)
        .element("p", &[("class", "recipients")], &recipients);
    if view.has_scheduler {
        html.element("p", &[("class", "scheduler")], "Scheduler active");
    }
    html.close("div");
    html.finish()
}

pub(crate) fn admin_workspaces_table(workspaces: &[WorkspaceSummary]) -> String {
    if workspaces.is_empty() {
        return empty_state("No workspaces.");
    }
    let mut workspaces = workspaces.to_vec();
    sort_workspaces(&mut workspaces);
    let mut html = Html::new();
    html.open("table", &[("class", "admin-workspaces")]);
    header_row(&mut html, &["Name", "Owner", "Plan", "State"]);
    html.open("tbody", &[]);
    for workspace in &workspaces {
        let state = if workspace.suspended { "suspended" } else { "active" };
        data_row(
            &mut html,
            &[("data-id", workspace.id.as_str())],
            &[
                workspace.name.as_str(),
                workspace.owner_email.as_deref().unwrap_or(""),
                workspace.plan.as_deref().unwrap_or(""),
                state,
            ],
        );
    }
    html.close("tbody").close("table");
    html.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::crm::AlertLevel;
    use protocol::{SessionSnapshot, SessionStatus};

    const PAYLOAD: &str = "<script>alert(\"x\")</script>";

    #[test]
    fn escapes_markup_and_quotes() {
        let escaped = escape_html(PAYLOAD);
        assert!(!escaped.contains('<'));
        assert!(!escaped.contains('"'));
        assert!(escaped.contains("&lt;script&gt;"));
    }

    #[test]
    fn lead_fields_are_escaped_everywhere() {
        let leads = vec![Lead {
            id: "\"><img>".to_string(),
            name: Some(PAYLOAD.to_string()),
            phone: "+1555".to_string(),
            tags: vec!["<b>vip</b>".to_string()],
            ..Lead::default()
        }];
        let html = leads_table(&leads);
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<img>"));
        assert!(!html.contains("<b>"));
        assert!(html.contains("<td>+1555</td>"));
    }

    #[test]
    fn report_has_totals_row() {
        let days = vec![
            ReportDay {
                day: "2024-01-02".to_string(),
                sent: 4,
                ..ReportDay::default()
            },
            ReportDay {
                day: "2024-01-01".to_string(),
                sent: 6,
                ..ReportDay::default()
            },
        ];
        let html = report_table(&days);
        let first = html.find("2024-01-01").expect("first day");
        let second = html.find("2024-01-02").expect("second day");
        assert!(first < second);
        assert!(html.contains("<tr class=\"totals\"><td>Total</td><td>10</td>"));
    }

    #[test]
    fn automation_and_media_tables_escape_names() {
        let mut settings = AutomationSettings::default();
        settings.toggles.insert(PAYLOAD.to_string(), true);
        let html = automation_table(&settings);
        assert!(!html.contains("<script>"));
        assert!(html.contains("data-state=\"on\""));

        let media = vec![MediaItem {
            id: "m1".to_string(),
            file_name: PAYLOAD.to_string(),
            size: Some(2048),
            ..MediaItem::default()
        }];
        let html = media_table(&media);
        assert!(!html.contains("<script>"));
        assert!(html.contains("<td>2048</td>"));
        assert!(media_table(&[]).contains("No media uploaded."));
    }

    #[test]
    fn schedules_table_formats_send_time() {
        let schedules = vec![ScheduledSend {
            id: Some("s1".to_string()),
            send_at: "2024-05-01T10:00:00Z".to_string(),
            recipients: Some(12),
            messages: vec!["hi".to_string()],
        }];
        let html = schedules_table(&schedules);
        assert!(html.contains("<td>2024-05-01 10:00 UTC</td>"));
        assert!(html.contains("<td>12</td><td>1</td>"));
    }

    #[test]
    fn chat_transcript_is_chronological() {
        let messages = vec![
            ChatMessage {
                id: "m2".to_string(),
                body: "second".to_string(),
                at: Some("2024-05-01T10:02:00Z".to_string()),
                ..ChatMessage::default()
            },
            ChatMessage {
                id: "m1".to_string(),
                body: "first".to_string(),
                at: Some("2024-05-01T10:01:00Z".to_string()),
                ..ChatMessage::default()
            },
        ];
        let html = chat_transcript("c1", &messages, false);
        let first = html.find("first").expect("first");
        let second = html.find("second").expect("second");
        assert!(first < second);
    }

    #[test]
    fn chat_transcript_escapes_bodies() {
        let messages = vec![ChatMessage {
            id: "m1".to_string(),
            direction: MessageDirection::Inbound,
            body: PAYLOAD.to_string(),
            ..ChatMessage::default()
        }];
        let html = chat_transcript("c1", &messages, true);
        assert!(!html.contains("<script>"));
        assert!(html.contains("Agent takeover active"));
        assert!(html.contains("class=\"msg in\""));
    }

    #[test]
    fn status_card_only_embeds_image_data_urls() {
        let snapshot = SessionSnapshot {
            status: SessionStatus::QrReady,
            qr_data_url: Some("javascript:alert(1)".to_string()),
            ..SessionSnapshot::default()
        };
        let view = StatusView::from_snapshot("ws-1", &snapshot, 3, false);
        assert!(!status_card(&view).contains("<img"));

        let snapshot = SessionSnapshot {
            qr_data_url: Some("data:image/png;base64,AAA".to_string()),
            ..snapshot
        };
        let view = StatusView::from_snapshot("ws-1", &snapshot, 3, false);
        let card = status_card(&view);
        assert!(card.contains("<img"));
        assert!(card.contains("base64,AAA"));
    }

    #[test]
    fn alerts_render_level_class() {
        let alerts = vec![Alert {
            id: "a1".to_string(),
            level: AlertLevel::Warning,
            message: "Quota at 90%".to_string(),
            at: None,
        }];
        assert!(alerts_list(&alerts).contains("class=\"alert warning\""));
    }

    #[test]
    fn empty_collections_render_placeholders() {
        assert!(leads_table(&[]).contains("No leads yet."));
        assert!(templates_list(&[]).contains("No templates saved."));
        assert!(admin_workspaces_table(&[]).contains("No workspaces."));
    }
}
