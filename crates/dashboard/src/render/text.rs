use protocol::{ChatMessage, MessageDirection};

use crate::events::{DashboardEvent, ToastLevel};
use crate::state::{QrDisplay, StatusView};

pub(crate) fn status_line(view: &StatusView) -> String {
    let mut parts = vec![
        view.status_text.clone(),
        view.elapsed_text.clone(),
        format!("{} recipients", view.recipients_count),
    ];
    if view.has_scheduler {
        parts.push("scheduler on".to_string());
    }
    match &view.qr {
        QrDisplay::Image(_) => parts.push("QR code ready (use --html to render)".to_string()),
        QrDisplay::Placeholder(text) => parts.push(text.clone()),
        QrDisplay::Hidden => {}
    }
    parts.push(if view.can_send { "send enabled" } else { "send disabled" }.to_string());
    parts.join(" | ")
}

pub(crate) fn chat_line(message: &ChatMessage) -> String {
    let who = match (message.direction, message.from_agent) {
        (MessageDirection::Inbound, _) => "contact",
        (MessageDirection::Outbound, true) => "agent",
        (MessageDirection::Outbound, false) => "bot",
    };
    match message.at.as_deref() {
        Some(at) => format!("{at} {who}: {}", message.body),
        None => format!("{who}: {}", message.body),
    }
}

fn toast_label(level: ToastLevel) -> &'static str {
    match level {
        ToastLevel::Info => "info",
        ToastLevel::Success => "ok",
        ToastLevel::Error => "error",
    }
}

/// One terminal line per event; `None` for events with nothing to show.
///
/// Chat batches are rendered by the caller, which knows which messages it
/// has already printed.
pub(crate) fn describe_event(event: &DashboardEvent) -> Option<String> {
    match event {
        DashboardEvent::WorkspaceSelected { workspace_id } => {
            Some(format!("[workspace] {workspace_id}"))
        }
        DashboardEvent::StatusUpdated { view } => Some(format!("[status] {}", status_line(view))),
        DashboardEvent::ElapsedTick { text } => Some(format!("[timer] {text}")),
        DashboardEvent::LogAppended { line } => Some(format!("[log] {line}")),
        DashboardEvent::Toast { level, message } => {
            Some(format!("[{}] {message}", toast_label(*level)))
        }
        DashboardEvent::Notification { title, body } => Some(format!("[notify] {title}: {body}")),
        DashboardEvent::Progress { done, total } => Some(format!("[progress] {done}/{total}")),
        DashboardEvent::LiveChatClosed { contact_id } => {
            Some(format!("[chat] stopped following {contact_id}"))
        }
        DashboardEvent::LoggedOut => Some("[session] logged out".to_string()),
        DashboardEvent::ChatMessages { .. }
        | DashboardEvent::SendControl { .. }
        | DashboardEvent::ProgressHidden => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{SessionSnapshot, SessionStatus};

    #[test]
    fn status_line_summarises_view() {
        let snapshot = SessionSnapshot {
            status: SessionStatus::Ready,
            ready: true,
            recipients_count: 7,
            has_scheduler: true,
            ..SessionSnapshot::default()
        };
        let view = StatusView::from_snapshot("ws-1", &snapshot, 42, false);
        assert_eq!(
            status_line(&view),
            "Connected | Connect timer: 42s | 7 recipients | scheduler on | connected | send enabled"
        );
    }

    #[test]
    fn quiet_events_are_skipped() {
        assert!(describe_event(&DashboardEvent::SendControl { enabled: true }).is_none());
        assert_eq!(
            describe_event(&DashboardEvent::Progress { done: 1, total: 3 }).as_deref(),
            Some("[progress] 1/3")
        );
    }

    #[test]
    fn chat_lines_name_the_sender() {
        let message = ChatMessage {
            direction: MessageDirection::Outbound,
            from_agent: true,
            body: "On it".to_string(),
            ..ChatMessage::default()
        };
        assert_eq!(chat_line(&message), "agent: On it");
    }
}
