pub mod attendance;
pub mod catalog;
pub mod core;
pub mod essays;
pub mod exercise_lists;
pub mod import_bulk;
pub mod messages;
pub mod users;

use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;

/// Shorthand for the handlers: either a live connection or the standard
/// "select a workspace first" error.
pub fn require_db<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a Connection, serde_json::Value> {
    match state.db.as_ref() {
        Some(conn) => Ok(conn),
        None => Err(err(
            &req.id,
            "no_workspace",
            "select a workspace first",
            None,
        )),
    }
}

/// Fetches a required string parameter or produces the standard bad_params
/// error response.
pub fn require_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(err(
            &req.id,
            "bad_params",
            format!("missing params.{}", key),
            None,
        )),
    }
}

pub fn opt_str<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
