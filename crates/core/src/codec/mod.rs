//! Binary document format.
//!
//! Layout: `PPST` magic, `u16` format version, `u32` CRC-32 of the payload,
//! `u32` payload length (all little endian), then the postcard payload.
//! The envelope is checked in full before the payload is interpreted.

mod gate;
mod wire;

use serde::de::DeserializeSeed;

use crate::document::Document;
use crate::engine::Trust;
use crate::error::{FormatError, PersistError, PersistResult};
use crate::validate::StructuralValidator;
use crate::version::{FILE_MAGIC, FORMAT_VERSION, HEADER_LEN};

use self::gate::{DocumentSeed, GateContext, GateFailure};
use self::wire::Entries;

/// Serializes a document into a framed byte buffer. Does not validate.
pub fn encode(document: &Document) -> PersistResult<Vec<u8>> {
    let payload = postcard::to_allocvec(&Entries(document.entries()))
        .map_err(|e| FormatError::Payload(e.to_string()))?;
    Ok(frame(&payload)?)
}

/// Parses a framed buffer, rebuilding values through the load gate.
///
/// With [`Trust::Gated`] the first node whose type is refused stops the
/// decode with [`PersistError::Validation`]; nothing decoded so far is
/// returned.
pub fn decode(
    bytes: &[u8],
    validator: StructuralValidator<'_>,
    trust: Trust,
) -> PersistResult<Document> {
    let payload = unframe(bytes)?;
    let ctx = GateContext::new(validator, trust);
    let mut deserializer = postcard::Deserializer::from_bytes(payload);
    let entries = DocumentSeed { ctx: &ctx }
        .deserialize(&mut deserializer)
        .map_err(|err| match ctx.take_failure() {
            Some(GateFailure::Rejected(rejection)) => PersistError::Validation(rejection),
            Some(GateFailure::TooDeep(limit)) => {
                PersistError::ResourceLimit(format!("value nesting exceeds {limit} levels"))
            }
            Some(GateFailure::Malformed(message)) => FormatError::Payload(message).into(),
            None => FormatError::Payload(err.to_string()).into(),
        })?;
    let rest = deserializer
        .finalize()
        .map_err(|e| FormatError::Payload(e.to_string()))?;
    if !rest.is_empty() {
        return Err(FormatError::TrailingBytes(rest.len()).into());
    }
    Document::from_stored(entries)
}

/// Wraps a payload in the envelope.
pub(crate) fn frame(payload: &[u8]) -> Result<Vec<u8>, FormatError> {
    let checksum = crc32fast::hash(payload);
    let payload_len = u32::try_from(payload.len()).map_err(|_| FormatError::TooLarge)?;

    let mut output = Vec::with_capacity(HEADER_LEN + payload.len());
    output.extend_from_slice(&FILE_MAGIC);
    output.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    output.extend_from_slice(&checksum.to_le_bytes());
    output.extend_from_slice(&payload_len.to_le_bytes());
    output.extend_from_slice(payload);
    Ok(output)
}

/// Checks magic, version, length and checksum; returns the payload.
pub(crate) fn unframe(input: &[u8]) -> Result<&[u8], FormatError> {
    if input.len() < HEADER_LEN {
        return Err(FormatError::TooSmall(input.len()));
    }
    if input[0..4] != FILE_MAGIC {
        return Err(FormatError::InvalidMagic);
    }
    let version = u16::from_le_bytes([input[4], input[5]]);
    if version != FORMAT_VERSION {
        return Err(FormatError::IncompatibleVersion {
            found: version,
            expected: FORMAT_VERSION,
        });
    }
    let checksum = u32::from_le_bytes([input[6], input[7], input[8], input[9]]);
    let declared = u32::from_le_bytes([input[10], input[11], input[12], input[13]]) as usize;
    let payload = &input[HEADER_LEN..];
    if payload.len() != declared {
        return Err(FormatError::LengthMismatch {
            declared,
            actual: payload.len(),
        });
    }
    if crc32fast::hash(payload) != checksum {
        return Err(FormatError::ChecksumMismatch);
    }
    Ok(payload)
}

/// Summary of a framed buffer, read without decoding the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvelopeInfo {
    pub version: u16,
    pub checksum: u32,
    pub payload_len: usize,
}

/// Validates the envelope and reports its header fields.
pub fn inspect(bytes: &[u8]) -> PersistResult<EnvelopeInfo> {
    let payload = unframe(bytes)?;
    Ok(EnvelopeInfo {
        version: FORMAT_VERSION,
        checksum: crc32fast::hash(payload),
        payload_len: payload.len(),
    })
}

#[cfg(test)]
#[path = "../tests/codec_tests.rs"]
mod tests;
