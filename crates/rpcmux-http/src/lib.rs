//! rpcmux HTTP - HTTP bindings for rpcmux.
//!
//! - [`HttpClientTransport`]: client transport carrying one message per HTTP
//!   exchange (GET bootstrap or POST on flush)
//! - [`HttpServer`]: axum server that runs a processor once per request
//!
//! # Example
//!
//! ```rust,ignore
//! use rpcmux_core::{BinaryProtocolFactory, MultiplexedProcessor};
//! use rpcmux_http::HttpServer;
//! use std::sync::Arc;
//!
//! let processor = Arc::new(MultiplexedProcessor::new());
//! let factory = Arc::new(BinaryProtocolFactory::default());
//! let server = HttpServer::new(processor, factory.clone(), factory);
//! let handle = server.start().await?;
//! println!("listening on {}", handle.addr());
//! ```

pub mod client;
pub mod server;

pub use client::{HttpClientConfig, HttpClientTransport, HttpClientTransportFactory};
pub use server::{HttpServer, HttpServerConfig, HttpServerHandle};
