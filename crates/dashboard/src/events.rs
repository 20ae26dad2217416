use protocol::ChatMessage;
use serde::Serialize;

use crate::state::StatusView;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ToastLevel {
    Info,
    Success,
    Error,
}

/// UI updates published by the runtime; a renderer subscribes and applies them.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum DashboardEvent {
    WorkspaceSelected {
        workspace_id: String,
    },
    StatusUpdated {
        view: StatusView,
    },
    ElapsedTick {
        text: String,
    },
    LogAppended {
        line: String,
    },
    Toast {
        level: ToastLevel,
        message: String,
    },
    Notification {
        title: String,
        body: String,
    },
    SendControl {
        enabled: bool,
    },
    Progress {
        done: usize,
        total: usize,
    },
    ProgressHidden,
    ChatMessages {
        contact_id: String,
        messages: Vec<ChatMessage>,
        takeover: bool,
    },
    LiveChatClosed {
        contact_id: String,
    },
    LoggedOut,
}
