use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

/// One line of the JSON request stream. `params` defaults to null so
/// parameterless methods can omit it.
#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Daemon state: nothing is open until the caller selects a workspace.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}
