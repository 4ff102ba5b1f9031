//! Integration tests for the HTTP server binding.
//!
//! Requests are driven straight into the router with `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use rpcmux_core::{
    BinaryProtocol, BinaryProtocolFactory, FieldType, MemoryBuffer, MessageType,
    MultiplexedProcessor, MultiplexedProtocol, MuxError, Processor, Protocol, Result,
};
use rpcmux_http::{HttpServer, HttpServerConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

/// `add(i32, i32) -> i32` handler that counts its invocations.
fn adder(calls: Arc<AtomicUsize>) -> impl Processor {
    move |input: &mut dyn Protocol, output: &mut dyn Protocol| -> Result<bool> {
        calls.fetch_add(1, Ordering::SeqCst);
        let header = input.read_message_begin()?;
        let a = input.read_i32()?;
        let b = input.read_i32()?;
        input.read_message_end()?;

        output.write_message_begin(&header.name, MessageType::Reply, header.seq_id)?;
        output.write_i32(a + b)?;
        output.write_message_end()?;
        output.flush()?;
        Ok(true)
    }
}

fn calculator_server(calls: Arc<AtomicUsize>) -> HttpServer {
    let processor = MultiplexedProcessor::new();
    processor.register_processor("Calculator", adder(calls)).unwrap();
    let factory = Arc::new(BinaryProtocolFactory::default());
    HttpServer::new(Arc::new(processor), factory.clone(), factory)
}

fn call_body(service: &str, function: &str, seq_id: i32, a: i32, b: i32) -> Vec<u8> {
    let mut protocol = MultiplexedProtocol::new(BinaryProtocol::new(MemoryBuffer::new()), service);
    protocol
        .write_message_begin(function, MessageType::Call, seq_id)
        .unwrap();
    protocol.write_i32(a).unwrap();
    protocol.write_i32(b).unwrap();
    protocol.write_message_end().unwrap();
    protocol.into_inner().into_inner().into_bytes()
}

async fn post(server: &HttpServer, path: &str, body: Vec<u8>) -> (StatusCode, Option<String>, Vec<u8>) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/x-thrift")
        .body(Body::from(body))
        .unwrap();
    let response = server.router().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, body.to_vec())
}

#[tokio::test]
async fn test_post_round_trip() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = calculator_server(calls.clone());

    let (status, content_type, body) =
        post(&server, "/calculator", call_body("Calculator", "add", 1, 2, 2)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/x-thrift"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let mut reply = BinaryProtocol::new(MemoryBuffer::from_bytes(&body));
    let header = reply.read_message_begin().unwrap();
    assert_eq!(header.name, "add");
    assert_eq!(header.message_type, MessageType::Reply);
    assert_eq!(header.seq_id, 1);
    assert_eq!(reply.read_i32().unwrap(), 4);
    assert!(server.take_last_error().is_none());
}

#[tokio::test]
async fn test_any_path_is_served() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = calculator_server(calls.clone());

    for path in ["/", "/rpc", "/deeply/nested/path"] {
        let (status, _, _) = post(&server, path, call_body("Calculator", "add", 1, 1, 1)).await;
        assert_eq!(status, StatusCode::OK, "{}", path);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_unknown_service_recorded_as_last_error() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = calculator_server(calls.clone());

    let (status, _, body) = post(&server, "/", call_body("Weather", "forecast", 1, 0, 0)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    match server.take_last_error() {
        Some(MuxError::UnknownService { name }) => assert_eq!(name, "Weather"),
        other => panic!("unexpected last error: {:?}", other),
    }
    assert!(server.take_last_error().is_none());
}

#[tokio::test]
async fn test_empty_body_is_a_normal_close() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = calculator_server(calls.clone());

    let (status, _, body) = post(&server, "/", Vec::new()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert!(server.take_last_error().is_none());
}

#[tokio::test]
async fn test_truncated_arguments_are_not_recorded() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = calculator_server(calls.clone());

    let mut body = call_body("Calculator", "add", 1, 2, 2);
    body.truncate(body.len() - 2);
    let (status, _, _) = post(&server, "/", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(server.take_last_error().is_none());
}

#[tokio::test]
async fn test_cors_disabled_rejects_preflight() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = calculator_server(calls.clone());

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();
    let response = server.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cors_enabled_echoes_requested_headers() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = calculator_server(calls.clone());
    server.set_cors_enabled(true);

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/rpc")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type, x-trace")
        .body(Body::empty())
        .unwrap();
    let response = server.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "content-type, x-trace"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cors_from_config() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = calculator_server(calls).with_config(HttpServerConfig {
        cors_enabled: true,
        ..HttpServerConfig::default()
    })
    .unwrap();
    assert!(server.cors_enabled());

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/")
        .body(Body::empty())
        .unwrap();
    let response = server.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let calls = Arc::new(AtomicUsize::new(0));
    let server = calculator_server(calls.clone()).with_config(HttpServerConfig {
        max_body_bytes: 16,
        ..HttpServerConfig::default()
    })
    .unwrap();

    let (status, _, _) = post(&server, "/", vec![0u8; 64]).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_exception_reply_passes_through() {
    let processor = MultiplexedProcessor::new();
    processor
        .register_processor(
            "Calculator",
            |input: &mut dyn Protocol, output: &mut dyn Protocol| -> Result<bool> {
                let header = input.read_message_begin()?;
                rpcmux_core::ApplicationException::new(
                    rpcmux_core::ApplicationErrorKind::UnknownMethod,
                    format!("Unknown function {}", header.name),
                )
                .write_reply(output, &header.name, header.seq_id)?;
                Ok(true)
            },
        )
        .unwrap();
    let factory = Arc::new(BinaryProtocolFactory::default());
    let server = HttpServer::new(Arc::new(processor), factory.clone(), factory);

    let (_, _, body) = post(&server, "/", call_body("Calculator", "divide", 9, 1, 0)).await;
    let mut reply = BinaryProtocol::new(MemoryBuffer::from_bytes(&body));
    let header = reply.read_message_begin().unwrap();
    assert_eq!(header.message_type, MessageType::Exception);
    assert_eq!(header.name, "divide");

    reply.read_struct_begin().unwrap();
    let field = reply.read_field_begin().unwrap();
    assert_eq!(field.field_type, FieldType::String);
    assert_eq!(reply.read_string().unwrap(), "Unknown function divide");
}
