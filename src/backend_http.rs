use std::{env, time::Duration};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use url::Url;

use crate::{http_response, BACKEND_URL_ENV, DEFAULT_BACKEND_URL};

/// Loopback HTTP client for the supervised backend; writes plain HTTP/1.1
/// over a `TcpStream` by hand.
#[derive(Debug, Clone)]
pub struct BackendEndpoint {
    base: Url,
}

impl BackendEndpoint {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn from_env<F>(log: F) -> Self
    where
        F: Fn(&str),
    {
        let raw = env::var(BACKEND_URL_ENV).unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());
        match Url::parse(raw.trim()) {
            Ok(base) if base.scheme() == "http" && base.host_str().is_some() => Self { base },
            _ => {
                log(&format!(
                    "{BACKEND_URL_ENV}='{raw}' is not a usable http URL, fallback to {DEFAULT_BACKEND_URL}"
                ));
                Self {
                    base: Url::parse(DEFAULT_BACKEND_URL).expect("default backend URL parses"),
                }
            }
        }
    }

    /// One bounded request/response round trip. `None` covers every failure
    /// mode; callers only distinguish "got a status" from "did not".
    pub async fn request_status_code(
        &self,
        method: &str,
        api_path: &str,
        total_timeout: Duration,
    ) -> Option<u16> {
        timeout(total_timeout, self.round_trip(method, api_path))
            .await
            .ok()
            .flatten()
    }

    async fn round_trip(&self, method: &str, api_path: &str) -> Option<u16> {
        let request_url = self.base.join(api_path).ok()?;
        let host = request_url.host_str()?.to_string();
        let port = request_url.port_or_known_default().unwrap_or(80);

        let mut request_target = request_url.path().to_string();
        if let Some(query) = request_url.query() {
            request_target.push('?');
            request_target.push_str(query);
        }
        if request_target.is_empty() {
            request_target = "/".to_string();
        }

        let request = format!(
            "{method} {request_target} HTTP/1.1\r\n\
Host: {host}\r\n\
Accept: */*\r\n\
Connection: close\r\n\
Content-Length: 0\r\n\
\r\n"
        );

        let mut stream = TcpStream::connect((host.as_str(), port)).await.ok()?;
        stream.write_all(request.as_bytes()).await.ok()?;

        let mut response = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) => break,
                Ok(read) => {
                    response.extend_from_slice(&chunk[..read]);
                    if http_response::is_complete_http_response(&response) {
                        break;
                    }
                }
                Err(_) => break,
            }
        }

        http_response::parse_http_status_code(&response)
    }
}
