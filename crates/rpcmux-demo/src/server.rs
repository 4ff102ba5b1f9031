//! Demo HTTP server hosting both services on one endpoint.

use crate::handler::{CalculatorProcessor, WeatherReportProcessor, CALCULATOR, WEATHER_REPORT};
use rpcmux_core::{BinaryProtocolFactory, MultiplexedProcessor};
use rpcmux_http::{HttpServer, HttpServerConfig, HttpServerHandle};
use std::sync::Arc;
use tracing::info;

/// Temperature reported by the `WeatherReport` service.
pub const DEMO_TEMPERATURE: f64 = 21.5;

/// Build the multiplexed processor with every demo service registered.
pub fn demo_processor() -> rpcmux_core::Result<MultiplexedProcessor> {
    let processor = MultiplexedProcessor::new();
    processor.register_processor(CALCULATOR, CalculatorProcessor)?;
    processor.register_processor(WEATHER_REPORT, WeatherReportProcessor::new(DEMO_TEMPERATURE))?;
    Ok(processor)
}

/// Start the demo server in the background.
///
/// Returns the handle of the running server (its address is the actual bound
/// address, useful when port=0).
pub async fn start_server(config: HttpServerConfig) -> anyhow::Result<HttpServerHandle> {
    let processor = demo_processor()?;
    info!("Registered {} services", processor.len());

    let protocol_factory = Arc::new(BinaryProtocolFactory::default());
    let server = HttpServer::new(
        Arc::new(processor),
        protocol_factory.clone(),
        protocol_factory,
    )
    .with_config(config)?;

    Ok(server.start().await?)
}
