//! Centralized configuration for rpcmux.
//!
//! This module provides constants for service tagging, the binary encoding,
//! and the HTTP bindings.

use std::net::Ipv4Addr;
use std::time::Duration;

/// Service multiplexing configuration.
pub struct MultiplexConfig;

impl MultiplexConfig {
    /// Joins a service name to a function name in outbound call names.
    pub const SEPARATOR: char = ':';
}

/// Limits and constants for the binary encoding.
pub struct ProtocolConfig;

impl ProtocolConfig {
    pub const BINARY_VERSION_1: u32 = 0x8001_0000;
    pub const BINARY_VERSION_MASK: u32 = 0xffff_0000;
    pub const BINARY_TYPE_MASK: u32 = 0x0000_00ff;

    pub const MAX_SKIP_DEPTH: usize = 64;
    pub const MAX_STRING_LENGTH: usize = 16 * 1024 * 1024; // 16MB
    pub const MAX_CONTAINER_SIZE: usize = 1_000_000;
}

/// HTTP binding configuration.
pub struct HttpConfig;

impl HttpConfig {
    pub const CONTENT_TYPE: &'static str = "application/x-thrift";
    pub const USER_AGENT: &'static str = "rpcmux/0.1";
    pub const REQUEST_BUFFER_CAPACITY: usize = 1024;

    // Client timeouts
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    // Server limits
    pub const DEFAULT_HOST: Ipv4Addr = Ipv4Addr::LOCALHOST;
    pub const DEFAULT_PORT: u16 = 9090;
    pub const MAX_BODY_BYTES: usize = 8 * 1024 * 1024; // 8MB
    pub const MAX_CONCURRENT_REQUESTS: usize = 256;
}
