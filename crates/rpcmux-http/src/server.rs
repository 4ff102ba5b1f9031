//! HTTP server binding using Axum.
//!
//! Every request on any path is one call: the body is the serialized request
//! message and the response body is whatever the processor wrote. OPTIONS
//! requests are answered as CORS preflights and never reach the processor.

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use rpcmux_core::{
    HttpConfig, MuxError, PassthroughTransportFactory, Processor, ProtocolFactory, Result,
    StreamTransport, TransportFactory,
};
use serde::Deserialize;
use std::io::{self, Cursor, Write};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Server settings, loadable from JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpServerConfig {
    /// Address to bind; port 0 picks a free port.
    pub addr: SocketAddr,
    /// Answer CORS preflights instead of rejecting them with 403.
    pub cors_enabled: bool,
    pub max_body_bytes: usize,
    pub max_concurrent_requests: usize,
}

impl HttpServerConfig {
    /// Reject limits that would stall every request.
    pub fn validate(&self) -> Result<()> {
        if self.max_body_bytes == 0 {
            return Err(MuxError::Config {
                message: "max_body_bytes must be at least 1".to_string(),
            });
        }
        if self.max_concurrent_requests == 0 {
            return Err(MuxError::Config {
                message: "max_concurrent_requests must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(HttpConfig::DEFAULT_HOST), HttpConfig::DEFAULT_PORT),
            cors_enabled: false,
            max_body_bytes: HttpConfig::MAX_BODY_BYTES,
            max_concurrent_requests: HttpConfig::MAX_CONCURRENT_REQUESTS,
        }
    }
}

/// Response body shared between the output transport and the handler.
#[derive(Clone, Default)]
struct ResponseSink(Arc<Mutex<Vec<u8>>>);

impl ResponseSink {
    fn take(&self) -> Vec<u8> {
        self.0
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }
}

impl Write for ResponseSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut body = self
            .0
            .lock()
            .map_err(|_| io::Error::other("response buffer lock poisoned"))?;
        body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// State shared across request handlers.
struct ServerState {
    processor: Arc<dyn Processor>,
    input_transport_factory: Arc<dyn TransportFactory>,
    output_transport_factory: Arc<dyn TransportFactory>,
    input_protocol_factory: Arc<dyn ProtocolFactory>,
    output_protocol_factory: Arc<dyn ProtocolFactory>,
    cors_enabled: Arc<AtomicBool>,
    last_error: Arc<Mutex<Option<MuxError>>>,
}

impl ServerState {
    /// Run the processor over one request body and return the reply bytes.
    ///
    /// End of stream counts as a normal close. Any other failure is recorded
    /// as the last error; the reply still carries whatever was written.
    fn run_processor(&self, body: Bytes) -> Vec<u8> {
        let sink = ResponseSink::default();
        let outcome = match self.process(body, sink.clone()) {
            Ok(()) => None,
            Err(e) if e.is_end_of_stream() => {
                debug!("Client closed the request stream: {}", e);
                None
            }
            Err(e) => {
                error!("Request processing failed: {}", e);
                Some(e)
            }
        };
        if let Ok(mut last_error) = self.last_error.lock() {
            *last_error = outcome;
        }
        sink.take()
    }

    fn process(&self, body: Bytes, sink: ResponseSink) -> Result<()> {
        let input = self
            .input_transport_factory
            .get_transport(Box::new(StreamTransport::reader(Cursor::new(body))))?;
        let output = self
            .output_transport_factory
            .get_transport(Box::new(StreamTransport::writer(sink)))?;
        let mut input = self.input_protocol_factory.get_protocol(input);
        let mut output = self.output_protocol_factory.get_protocol(output);

        let result = self.processor.process(&mut *input, &mut *output);

        for transport in [input.transport(), output.transport()] {
            if let Err(e) = transport.close() {
                debug!("Failed to close transport: {}", e);
            }
        }
        result.map(drop)
    }
}

/// Answer a CORS preflight.
fn preflight(cors_enabled: bool, headers: &HeaderMap) -> Response {
    if !cors_enabled {
        return StatusCode::FORBIDDEN.into_response();
    }

    let mut response = StatusCode::OK.into_response();
    let out = response.headers_mut();
    out.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    out.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST"),
    );
    if let Some(requested) = headers.get(header::ACCESS_CONTROL_REQUEST_HEADERS) {
        if !requested.is_empty() {
            out.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
        }
    }
    response
}

async fn handle_request(
    State(state): State<Arc<ServerState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        return preflight(state.cors_enabled.load(Ordering::SeqCst), &headers);
    }

    let worker = state.clone();
    match tokio::task::spawn_blocking(move || worker.run_processor(body)).await {
        Ok(reply) => ([(header::CONTENT_TYPE, HttpConfig::CONTENT_TYPE)], reply).into_response(),
        Err(e) => {
            error!("Processor task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Handle to a running server.
///
/// Dropping the handle shuts the server down.
#[derive(Debug)]
pub struct HttpServerHandle {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl HttpServerHandle {
    /// Get the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting requests and let in-flight ones finish.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Wait until the server has stopped.
    pub async fn stopped(mut self) {
        if let Some(handle) = self.task_handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for HttpServerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

/// HTTP server that feeds each request through one processor.
pub struct HttpServer {
    config: HttpServerConfig,
    processor: Arc<dyn Processor>,
    input_transport_factory: Arc<dyn TransportFactory>,
    output_transport_factory: Arc<dyn TransportFactory>,
    input_protocol_factory: Arc<dyn ProtocolFactory>,
    output_protocol_factory: Arc<dyn ProtocolFactory>,
    cors_enabled: Arc<AtomicBool>,
    last_error: Arc<Mutex<Option<MuxError>>>,
}

impl HttpServer {
    /// Prepare a server with pass-through transport factories and default settings.
    pub fn new(
        processor: Arc<dyn Processor>,
        input_protocol_factory: Arc<dyn ProtocolFactory>,
        output_protocol_factory: Arc<dyn ProtocolFactory>,
    ) -> Self {
        let config = HttpServerConfig::default();
        Self {
            cors_enabled: Arc::new(AtomicBool::new(config.cors_enabled)),
            config,
            processor,
            input_transport_factory: Arc::new(PassthroughTransportFactory),
            output_transport_factory: Arc::new(PassthroughTransportFactory),
            input_protocol_factory,
            output_protocol_factory,
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_config(mut self, config: HttpServerConfig) -> Result<Self> {
        config.validate()?;
        self.cors_enabled.store(config.cors_enabled, Ordering::SeqCst);
        self.config = config;
        Ok(self)
    }

    pub fn with_transport_factories(
        mut self,
        input: Arc<dyn TransportFactory>,
        output: Arc<dyn TransportFactory>,
    ) -> Self {
        self.input_transport_factory = input;
        self.output_transport_factory = output;
        self
    }

    /// Enable or disable CORS preflight support. Applies to running routers too.
    pub fn set_cors_enabled(&self, enabled: bool) {
        self.cors_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn cors_enabled(&self) -> bool {
        self.cors_enabled.load(Ordering::SeqCst)
    }

    /// Build a router that handles every path.
    pub fn router(&self) -> Router {
        let state = Arc::new(ServerState {
            processor: self.processor.clone(),
            input_transport_factory: self.input_transport_factory.clone(),
            output_transport_factory: self.output_transport_factory.clone(),
            input_protocol_factory: self.input_protocol_factory.clone(),
            output_protocol_factory: self.output_protocol_factory.clone(),
            cors_enabled: self.cors_enabled.clone(),
            last_error: self.last_error.clone(),
        });

        Router::new()
            .fallback(handle_request)
            .with_state(state)
            .layer(DefaultBodyLimit::max(self.config.max_body_bytes))
            .layer(GlobalConcurrencyLimitLayer::new(
                self.config.max_concurrent_requests,
            ))
            .layer(TraceLayer::new_for_http())
    }

    /// Listen on the configured address until the process exits.
    pub async fn serve(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.addr).await?;
        info!("HTTP server listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    /// Start serving in the background.
    ///
    /// Returns once the listener is bound; the handle reports the actual
    /// address (useful when port=0).
    pub async fn start(&self) -> Result<HttpServerHandle> {
        let listener = TcpListener::bind(self.config.addr).await?;
        let addr = listener.local_addr()?;
        info!("HTTP server listening on {}", addr);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = self.router();
        let task_handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                error!("HTTP server error: {}", e);
            }
            info!("HTTP server on {} stopped", addr);
        });

        Ok(HttpServerHandle {
            addr,
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
        })
    }

    /// Take the error recorded by the most recent request, if it failed.
    pub fn take_last_error(&self) -> Option<MuxError> {
        self.last_error.lock().ok().and_then(|mut e| e.take())
    }

    pub fn config(&self) -> &HttpServerConfig {
        &self.config
    }

    pub fn processor(&self) -> &Arc<dyn Processor> {
        &self.processor
    }

    pub fn input_transport_factory(&self) -> &Arc<dyn TransportFactory> {
        &self.input_transport_factory
    }

    pub fn output_transport_factory(&self) -> &Arc<dyn TransportFactory> {
        &self.output_transport_factory
    }

    pub fn input_protocol_factory(&self) -> &Arc<dyn ProtocolFactory> {
        &self.input_protocol_factory
    }

    pub fn output_protocol_factory(&self) -> &Arc<dyn ProtocolFactory> {
        &self.output_protocol_factory
    }
}
