use crate::models::{Operation, Release};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Error surface for remote calls. Server-reported errors keep their message
/// text so callers can map known cases (e.g. duplicate slugs) to friendlier
/// wording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    Transport(String),
    Server { status: u16, message: String },
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Transport(message) => write!(f, "request failed: {message}"),
            SessionError::Server { status, message } => {
                write!(f, "server error ({status}): {message}")
            }
        }
    }
}

impl std::error::Error for SessionError {}

impl SessionError {
    pub fn message(&self) -> &str {
        match self {
            SessionError::Transport(message) => message,
            SessionError::Server { message, .. } => message,
        }
    }
}

/// Remote evidence-server session. Each call completes exactly once.
#[async_trait]
pub trait SessionClient: Send + Sync {
    async fn list_operations(&self) -> Result<Vec<Operation>, SessionError>;
    async fn create_operation(&self, name: &str, slug: &str)
    -> Result<Operation, SessionError>;
    async fn check_releases(&self, owner: &str, repo: &str)
    -> Result<Vec<Release>, SessionError>;
}

#[derive(Debug, Clone, Deserialize)]
struct ServerErrorBody {
    #[serde(default)]
    error: String,
}

pub struct HttpSessionClient {
    client: Client,
    base_url: String,
    access_key: String,
}

impl HttpSessionClient {
    pub fn new(base_url: impl Into<String>, access_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_key: access_key.into(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn error_from_response(response: reqwest::Response) -> SessionError {
        let status = response.status().as_u16();
        let message = match response.json::<ServerErrorBody>().await {
            Ok(body) if !body.error.is_empty() => body.error,
            _ => format!("request rejected with status {status}"),
        };
        SessionError::Server { status, message }
    }
}

fn transport(err: reqwest::Error) -> SessionError {
    SessionError::Transport(err.to_string())
}

#[async_trait]
impl SessionClient for HttpSessionClient {
    async fn list_operations(&self) -> Result<Vec<Operation>, SessionError> {
        let response = self
            .client
            .get(self.api_url("/api/operations"))
            .header("Authorization", &self.access_key)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        response.json::<Vec<Operation>>().await.map_err(transport)
    }

    async fn create_operation(
        &self,
        name: &str,
        slug: &str,
    ) -> Result<Operation, SessionError> {
        let response = self
            .client
            .post(self.api_url("/api/operations"))
            .header("Authorization", &self.access_key)
            .json(&serde_json::json!({ "name": name, "slug": slug }))
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        response.json::<Operation>().await.map_err(transport)
    }

    async fn check_releases(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<Release>, SessionError> {
        let url = format!("https://api.github.com/repos/{owner}/{repo}/releases");
        let response = self
            .client
            .get(url)
            .header("User-Agent", "evidence-tray")
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        response.json::<Vec<Release>>().await.map_err(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::SessionError;
    use crate::models::{Operation, Release};

    #[test]
    fn operations_parse_from_server_json() {
        let ops: Vec<Operation> = serde_json::from_str(
            r#"[{"slug":"op-one","name":"Op One"},{"slug":"op-two","name":"Op Two"}]"#,
        )
        .expect("parse");
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].slug, "op-one");
    }

    #[test]
    fn releases_parse_without_html_url() {
        let releases: Vec<Release> =
            serde_json::from_str(r#"[{"tag_name":"v1.2.0"}]"#).expect("parse");
        assert_eq!(releases[0].tag_name, "v1.2.0");
        assert_eq!(releases[0].html_url, "");
    }

    #[test]
    fn error_message_is_accessible_for_both_variants() {
        let transport = SessionError::Transport("connection refused".to_string());
        assert_eq!(transport.message(), "connection refused");

        let server = SessionError::Server {
            status: 409,
            message: "slug already exists".to_string(),
        };
        assert_eq!(server.message(), "slug already exists");
        assert!(server.to_string().contains("409"));
    }
}
