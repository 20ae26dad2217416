pub(crate) fn join_base_path(base: &str, path: &str) -> Result<String, String> {
    if base.trim().is_empty() {
        return Err("base_url is empty".to_string());
    }
    let normalized_base = base.trim_end_matches('/');
    let normalized_path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    Ok(format!("{normalized_base}{normalized_path}"))
}

/// Builds `/api/workspaces/{id}/{rest}` with the id percent-encoded.
pub(crate) fn workspace_path(workspace_id: &str, rest: &str) -> String {
    let id = urlencoding::encode(workspace_id);
    let rest = rest.trim_start_matches('/');
    if rest.is_empty() {
        format!("/api/workspaces/{id}")
    } else {
        format!("/api/workspaces/{id}/{rest}")
    }
}

pub(crate) fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
