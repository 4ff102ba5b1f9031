//! HTTP client transport.
//!
//! Buffers whole messages: writes accumulate in a request buffer, `flush`
//! POSTs it, and reads drain the body of the last successful response.
//!
//! The client is blocking. Inside a tokio runtime, drive it from
//! `tokio::task::spawn_blocking`.

use bytes::{Buf, Bytes};
use reqwest::blocking::{Client, Response};
use reqwest::header;
use rpcmux_core::{HttpConfig, MuxError, Result, Transport, TransportErrorKind, TransportFactory};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Settings for the HTTP client built when none is supplied.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: HttpConfig::CONNECT_TIMEOUT,
            request_timeout: HttpConfig::REQUEST_TIMEOUT,
            user_agent: HttpConfig::USER_AGENT.to_string(),
        }
    }
}

impl HttpClientConfig {
    /// Build a blocking client with these settings.
    pub fn build_client(&self) -> Result<Client> {
        Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| request_error("Failed to create HTTP client", e))
    }
}

fn request_error(context: &str, err: reqwest::Error) -> MuxError {
    let kind = if err.is_timeout() {
        TransportErrorKind::TimedOut
    } else if err.is_connect() {
        TransportErrorKind::NotOpen
    } else {
        TransportErrorKind::Unknown
    };
    MuxError::transport(kind, format!("{}: {}", context, err))
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| {
        MuxError::transport(
            TransportErrorKind::Unknown,
            format!("Invalid URL {}: {}", url, e),
        )
    })
}

/// Read a successful response body, or fail with the status.
fn success_body(method: &str, url: &Url, response: Response) -> Result<Bytes> {
    let status = response.status();
    if !status.is_success() {
        warn!("{} {} returned HTTP {}", method, url, status.as_u16());
        return Err(MuxError::HttpStatus {
            status: status.as_u16(),
        });
    }
    response
        .bytes()
        .map_err(|e| request_error("Failed to read response body", e))
}

/// Transport that carries each message as one HTTP exchange.
#[derive(Debug)]
pub struct HttpClientTransport {
    url: Url,
    client: Client,
    request_buffer: Option<Vec<u8>>,
    response_buffer: Option<Bytes>,
}

impl HttpClientTransport {
    /// GET `url` now and serve its body to reads.
    ///
    /// Fails with [`MuxError::HttpStatus`] on a non-2xx response. A transport
    /// created this way is read-only.
    pub fn get(url: &str) -> Result<Self> {
        Self::get_with_client(url, HttpClientConfig::default().build_client()?)
    }

    pub fn get_with_client(url: &str, client: Client) -> Result<Self> {
        let url = parse_url(url)?;
        let response = client
            .get(url.clone())
            .send()
            .map_err(|e| request_error(&format!("GET {} failed", url), e))?;
        let body = success_body("GET", &url, response)?;
        debug!("GET {} returned {} bytes", url, body.len());

        Ok(Self {
            url,
            client,
            request_buffer: None,
            response_buffer: Some(body),
        })
    }

    /// Client that POSTs on every `flush`. No network activity until then.
    pub fn post(url: &str) -> Result<Self> {
        Self::post_with_client(url, HttpClientConfig::default().build_client()?)
    }

    pub fn post_with_client(url: &str, client: Client) -> Result<Self> {
        Ok(Self {
            url: parse_url(url)?,
            client,
            request_buffer: Some(Vec::with_capacity(HttpConfig::REQUEST_BUFFER_CAPACITY)),
            response_buffer: None,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether writes are accepted.
    pub fn is_post(&self) -> bool {
        self.request_buffer.is_some()
    }
}

impl Transport for HttpClientTransport {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.response_buffer = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.request_buffer.is_some() || self.response_buffer.is_some()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let response = self.response_buffer.as_mut().ok_or_else(|| {
            MuxError::transport(
                TransportErrorKind::NotOpen,
                "Response buffer is empty, no request.",
            )
        })?;
        if buf.is_empty() {
            return Ok(0);
        }
        if !response.has_remaining() {
            return Err(MuxError::end_of_file());
        }

        let n = buf.len().min(response.remaining());
        response.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let request = self.request_buffer.as_mut().ok_or_else(|| {
            MuxError::transport(
                TransportErrorKind::NotOpen,
                "GET transport does not accept writes",
            )
        })?;
        request.extend_from_slice(buf);
        Ok(buf.len())
    }

    /// POST the buffered request.
    ///
    /// The request buffer is consumed even when the exchange fails. The
    /// response buffer is only replaced on success.
    fn flush(&mut self) -> Result<()> {
        let Some(request) = self.request_buffer.as_mut() else {
            return Ok(());
        };
        let body = std::mem::replace(
            request,
            Vec::with_capacity(HttpConfig::REQUEST_BUFFER_CAPACITY),
        );

        debug!("POST {} ({} bytes)", self.url, body.len());
        let response = self
            .client
            .post(self.url.clone())
            .header(header::CONTENT_TYPE, HttpConfig::CONTENT_TYPE)
            .body(body)
            .send()
            .map_err(|e| request_error(&format!("POST {} failed", self.url), e))?;

        let body = success_body("POST", &self.url, response)?;
        self.response_buffer = Some(body);
        Ok(())
    }
}

/// Hands out fresh HTTP client transports for one URL.
#[derive(Debug, Clone)]
pub struct HttpClientTransportFactory {
    url: String,
    is_post: bool,
    client: Option<Client>,
}

impl HttpClientTransportFactory {
    /// Factory for GET-bootstrapped transports.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_post: false,
            client: None,
        }
    }

    /// Factory for POST transports.
    pub fn new_post(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_post: true,
            client: None,
        }
    }

    /// Share `client` across every transport this factory creates.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn create(&self) -> Result<HttpClientTransport> {
        let client = match &self.client {
            Some(client) => client.clone(),
            None => HttpClientConfig::default().build_client()?,
        };
        if self.is_post {
            HttpClientTransport::post_with_client(&self.url, client)
        } else {
            HttpClientTransport::get_with_client(&self.url, client)
        }
    }
}

impl TransportFactory for HttpClientTransportFactory {
    /// Ignores `transport`: each call starts a fresh exchange with the factory's URL.
    fn get_transport(&self, _transport: Box<dyn Transport>) -> Result<Box<dyn Transport>> {
        Ok(Box::new(self.create()?))
    }
}
