/// Every failure a dashboard action can surface to the operator.
///
/// Transport, server-reported and expired-session failures all render to a
/// single human-readable message through `Display`; callers only branch on
/// `Unauthorized`, which forces a logout.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ApiError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message}")]
    Server { status: u16, message: String },
    #[error("session expired, please log in again")]
    Unauthorized,
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Precondition(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub(crate) fn precondition(message: impl Into<String>) -> Self {
        ApiError::Precondition(message.into())
    }

    pub(crate) fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_error_displays_message_verbatim() {
        let err = ApiError::Server {
            status: 409,
            message: "Workspace name already taken".to_string(),
        };
        assert_eq!(err.to_string(), "Workspace name already taken");
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn precondition_is_not_unauthorized() {
        let err = ApiError::precondition("Select a workspace first");
        assert_eq!(err.to_string(), "Select a workspace first");
        assert!(ApiError::Unauthorized.is_unauthorized());
    }
}
