//! Service multiplexing over one connection or endpoint.
//!
//! Clients wrap their protocol in a [`MultiplexedProtocol`], which tags every
//! outbound call as `<service>:<function>`. Servers register one processor per
//! service on a [`MultiplexedProcessor`], which reads the tagged header once,
//! routes on the service prefix, and replays the stripped header to the chosen
//! processor through a [`StoredMessageProtocol`].
//!
//! Service names must not contain the separator: only its first occurrence
//! splits a tagged name.

mod processor;
mod protocol;

pub use processor::{MultiplexedProcessor, StoredMessageProtocol};
pub use protocol::{MultiplexedProtocol, MultiplexedProtocolFactory};

use crate::config::MultiplexConfig;

/// Tag a function name with its service.
pub fn tag_name(service_name: &str, function_name: &str) -> String {
    let mut tagged = String::with_capacity(service_name.len() + 1 + function_name.len());
    tagged.push_str(service_name);
    tagged.push(MultiplexConfig::SEPARATOR);
    tagged.push_str(function_name);
    tagged
}

/// Split a tagged name into `(service, function)` at the first separator.
///
/// Returns `None` when the separator is missing or is the last character.
pub fn split_name(name: &str) -> Option<(&str, &str)> {
    let index = name.find(MultiplexConfig::SEPARATOR)?;
    if index + 1 >= name.len() {
        return None;
    }
    Some((&name[..index], &name[index + 1..]))
}
