use crate::utils::DeployError;
use crate::Result;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use std::collections::HashMap;
use tracing::info;

/// One HTTP request fired as a deploy step, e.g. a migration hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpAction {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpAction {
    /// Send the request. Any non-2xx status is an error carrying the
    /// response body.
    pub async fn execute(&self, client: &Client) -> Result<()> {
        let method = Method::from_bytes(self.method.to_uppercase().as_bytes())
            .map_err(|_| DeployError::Config(format!("invalid HTTP method: {}", self.method)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| DeployError::Config(format!("invalid header name: {}", name)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| DeployError::Config(format!("invalid value for header {}", name)))?;
            headers.insert(name, value);
        }

        let mut request = client.request(method.clone(), &self.url).headers(headers);
        if !self.body.is_empty() {
            request = request.body(self.body.clone());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeployError::HttpStatus {
                method: method.to_string(),
                url: self.url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        info!(method = %method, status = status.as_u16(), "HTTP action completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    /// Accept one connection, answer with `status` and `body`, hand back the
    /// raw request.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap();
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });

        (format!("http://{}/hooks/migrate", addr), handle)
    }

    #[tokio::test]
    async fn test_successful_request() -> Result<()> {
        let (url, server) = serve_once("200 OK", "done").await;
        let action = HttpAction {
            url,
            method: "post".into(),
            headers: HashMap::from([("X-Token".to_string(), "abc".to_string())]),
            body: "{}".into(),
        };

        action.execute(&client()).await?;

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /hooks/migrate"));
        assert!(request.to_lowercase().contains("x-token: abc"));
        Ok(())
    }

    #[tokio::test]
    async fn test_error_status_carries_body() {
        let (url, _server) = serve_once("500 Internal Server Error", "migration failed").await;
        let action = HttpAction {
            url,
            method: "GET".into(),
            headers: HashMap::new(),
            body: String::new(),
        };

        let err = action.execute(&client()).await.unwrap_err();
        assert!(matches!(err, DeployError::HttpStatus { status: 500, .. }));
        assert!(err.to_string().ends_with("returned 500: migration failed"));
    }

    #[tokio::test]
    async fn test_invalid_method() {
        let action = HttpAction {
            url: "http://127.0.0.1:1/".into(),
            method: "NOT A METHOD".into(),
            headers: HashMap::new(),
            body: String::new(),
        };
        let err = action.execute(&client()).await.unwrap_err();
        assert!(matches!(err, DeployError::Config(_)));
    }
}
