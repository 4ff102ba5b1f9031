//! Handler-processor abstraction.

use crate::protocol::Protocol;
use crate::Result;

/// Serves one request: reads a call from `input`, writes the reply to `output`.
///
/// Returns `Ok(true)` when the request was handled. Implementations must be
/// shareable across concurrently served requests.
pub trait Processor: Send + Sync {
    fn process(&self, input: &mut dyn Protocol, output: &mut dyn Protocol) -> Result<bool>;
}

impl<F> Processor for F
where
    F: Fn(&mut dyn Protocol, &mut dyn Protocol) -> Result<bool> + Send + Sync,
{
    fn process(&self, input: &mut dyn Protocol, output: &mut dyn Protocol) -> Result<bool> {
        self(input, output)
    }
}
