mod dashboard;
mod event_log;
mod model;

pub(crate) use dashboard::DashboardState;
pub(crate) use model::{QrDisplay, StatusView, WorkspaceContext};
