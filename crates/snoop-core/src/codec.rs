//! Descriptor wire codec.
//!
//! The wire form is a flat JSON object shared by clients, the heartbeat
//! channels and the lookup API:
//!
//! ```text
//! {"serviceName":"svc-a","serviceHome":"10.0.0.1:8080","serviceRoot":"api/"}
//! ```
//!
//! On a heartbeat channel the empty string is a sentinel meaning
//! "deregister", not a decode failure.

use crate::descriptor::ServiceDescriptor;
use crate::{Result, SnoopError};

/// One message on a registration or heartbeat channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    /// Register or refresh the carried descriptor.
    Register(ServiceDescriptor),
    /// Remove the channel's identity from the registry.
    Deregister,
}

/// Encode a descriptor to its JSON wire form.
pub fn encode(descriptor: &ServiceDescriptor) -> Result<String> {
    Ok(serde_json::to_string(descriptor)?)
}

/// Decode a descriptor from its JSON wire form.
///
/// Malformed JSON, missing or non-string fields and an empty identity are
/// all reported as [`SnoopError::Decode`].
pub fn decode(json: &str) -> Result<ServiceDescriptor> {
    let descriptor: ServiceDescriptor = serde_json::from_str(json)?;

    if let Err(e) = descriptor.validate() {
        return Err(SnoopError::Decode {
            message: e.to_string(),
            source: None,
        });
    }

    Ok(descriptor)
}

/// Encode a channel message. `Deregister` becomes the empty string.
pub fn encode_status(message: &StatusMessage) -> Result<String> {
    match message {
        StatusMessage::Register(descriptor) => encode(descriptor),
        StatusMessage::Deregister => Ok(String::new()),
    }
}

/// Decode a channel message.
pub fn decode_status(payload: &str) -> Result<StatusMessage> {
    if payload.is_empty() {
        return Ok(StatusMessage::Deregister);
    }
    decode(payload).map(StatusMessage::Register)
}
