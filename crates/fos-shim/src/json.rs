//! JSON Stream Codec
//!
//! Whole-value JSON encoding on top of the line streams. Decoding glues the
//! lines back together *without* their newlines, so only payloads written
//! as one unbroken line survive a round trip byte-for-byte. Encoding always
//! produces a single line, which keeps the pair consistent.

use crate::input::{LineInputStream, LineRecord};
use crate::output::{OutputStream, StreamError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

/// Errors from the JSON codec
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Malformed JSON payload: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("Cannot serialize value: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error(transparent)]
    Stream(#[from] StreamError),
}

/// JSON codec component.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        Self
    }

    /// Drain the stream and parse everything read as one JSON value.
    pub fn decode_from_stream(&self, stream: &mut LineInputStream) -> Result<Value, CodecError> {
        let text = Self::drain(stream);
        serde_json::from_str(&text).map_err(CodecError::Parse)
    }

    /// Typed variant of [`decode_from_stream`](Self::decode_from_stream).
    pub fn decode<T: DeserializeOwned>(&self, stream: &mut LineInputStream) -> Result<T, CodecError> {
        let text = Self::drain(stream);
        serde_json::from_str(&text).map_err(CodecError::Parse)
    }

    /// Serialize `value` and write it with a single `write_string`.
    pub fn encode_to_stream<T: Serialize + ?Sized>(
        &self,
        stream: &OutputStream,
        value: &T,
    ) -> Result<(), CodecError> {
        let text = serde_json::to_string(value).map_err(CodecError::Serialize)?;
        stream.write_string(&text)?;
        Ok(())
    }

    fn drain(stream: &mut LineInputStream) -> String {
        let mut record = LineRecord::default();
        let mut text = String::new();
        let mut have_more = true;

        // At least one read happens before continuation is checked
        while have_more {
            have_more = stream.read_line(&mut record);
            text.push_str(&record.value);
        }

        trace!("Decoding {} bytes of JSON", text.len());
        text
    }
}
