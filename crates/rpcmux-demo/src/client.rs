//! One-shot multiplexed calls against a running demo server.

use crate::handler::{read_reply, write_call, Value, CALCULATOR, WEATHER_REPORT};
use rpcmux_core::{BinaryProtocol, MultiplexedProtocol, Result};
use rpcmux_http::HttpClientTransport;
use tracing::debug;

/// A demo call and its arguments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DemoCall {
    Add(i32, i32),
    Subtract(i32, i32),
    Temperature,
}

impl DemoCall {
    fn service(self) -> &'static str {
        match self {
            DemoCall::Add(..) | DemoCall::Subtract(..) => CALCULATOR,
            DemoCall::Temperature => WEATHER_REPORT,
        }
    }

    fn function(self) -> &'static str {
        match self {
            DemoCall::Add(..) => "add",
            DemoCall::Subtract(..) => "subtract",
            DemoCall::Temperature => "get_temperature",
        }
    }

    fn args(self) -> Vec<i32> {
        match self {
            DemoCall::Add(a, b) | DemoCall::Subtract(a, b) => vec![a, b],
            DemoCall::Temperature => Vec::new(),
        }
    }
}

/// POST one call to `url` and decode the reply.
///
/// Blocks on the network; call from a blocking context.
pub fn invoke(url: &str, call: DemoCall) -> Result<Value> {
    const SEQ_ID: i32 = 1;

    let transport = HttpClientTransport::post(url)?;
    let mut protocol = MultiplexedProtocol::new(BinaryProtocol::new(transport), call.service());
    debug!("Calling {}:{} at {}", call.service(), call.function(), url);

    write_call(&mut protocol, call.function(), SEQ_ID, &call.args())?;
    read_reply(&mut protocol, call.function(), SEQ_ID)
}
