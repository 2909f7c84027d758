//! Folders command implementation.
//!
//! Runs a folder sync against a live server into an in-memory store and
//! lists what came back. The password is read from `EASYNC_PASSWORD`.

use super::Format;
use bytes::Bytes;
use easync_engine::{HttpClient, HttpTransport, Response, SyncConfig, SyncSession};
use easync_protocol::FolderDescriptor;
use easync_store::InMemoryStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Environment variable holding the account password.
pub const PASSWORD_VAR: &str = "EASYNC_PASSWORD";

/// Blocking `reqwest` client with basic authentication.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
    user: String,
    password: Option<String>,
}

impl ReqwestClient {
    /// Creates a client for `user`.
    pub fn new(user: &str, password: Option<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("easync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            user: user.to_string(),
            password,
        })
    }
}

impl HttpClient for ReqwestClient {
    fn post(
        &self,
        url: &Url,
        headers: &[(String, String)],
        body: Bytes,
        timeout: Duration,
    ) -> Result<Response, String> {
        let mut request = self
            .client
            .post(url.as_str())
            .timeout(timeout)
            .basic_auth(&self.user, self.password.as_deref())
            .body(body.to_vec());
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send().map_err(|e| e.to_string())?;
        Ok(Response {
            status: response.status().as_u16(),
            body: Box::new(response),
        })
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

/// Loads an account configuration file.
pub fn load_config(path: &Path) -> Result<SyncConfig, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let config: SyncConfig = serde_json::from_str(&text)?;
    config.validate()?;
    Ok(config)
}

/// Renders folders as aligned text rows.
pub fn render_text(folders: &[FolderDescriptor]) -> String {
    let mut out = format!("{:<12} {:<12} {:<10} {}\n", "ID", "PARENT", "ROLE", "NAME");
    for folder in folders {
        out.push_str(&format!(
            "{:<12} {:<12} {:<10} {}\n",
            folder.server_id,
            folder.parent_id.as_deref().unwrap_or("-"),
            format!("{:?}", folder.role).to_lowercase(),
            folder.display_name
        ));
    }
    out
}

/// Runs the folders command.
pub fn run(config: &Path, all: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let format = Format::parse(format)?;
    let config = load_config(config)?;
    let password = std::env::var(PASSWORD_VAR).ok();
    if password.is_none() {
        tracing::warn!("{PASSWORD_VAR} is not set, sending no password");
    }
    let client = ReqwestClient::new(&config.user, password)?;
    let transport = HttpTransport::new(&config, client)?;
    tracing::info!(endpoint = %transport.endpoint(), user = %config.user, "connecting");
    let session = SyncSession::new(config, transport, Arc::new(InMemoryStore::new()))?;

    // a fresh store has no key, so a reset here means the server wants a
    // second attempt from "0"
    if session.folder_sync()?.is_reset() {
        session.folder_sync()?;
    }
    let folders: Vec<FolderDescriptor> = session
        .folders()?
        .into_iter()
        .filter(|f| all || f.visible)
        .collect();

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&folders)?),
        Format::Text => print!("{}", render_text(&folders)),
    }
    let stats = session.stats();
    tracing::debug!(requests = stats.requests, commits = stats.commits, "done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_config_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"account_id": 1, "server_url": "https://mail.example.com", "user": "ada"}}"#
        )
        .unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.user, "ada");
        assert_eq!(config.window_size, 100);
    }

    #[test]
    fn rejects_invalid_config_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"server_url": "nowhere"}}"#).unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn text_rows_show_root_parents_as_dashes() {
        let folders = vec![
            FolderDescriptor::new("2", Some("0".into()), "Inbox", 2),
            FolderDescriptor::new("7", Some("2".into()), "Receipts", 12),
        ];
        let text = render_text(&folders);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("2            -            inbox"));
        assert!(lines[2].contains("Receipts"));
    }
}
