//! JSON decoding of event bodies and encoding of handler results.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use serde_json::value::RawValue;
use serde_json::Value;
use thiserror::Error;

pub const DECODE_ERROR_CONTEXT: &str = "Unable to parse input as json";
pub const ENCODE_ERROR_CONTEXT: &str = "An error occurred during JSON serialization of response";

/// Decode an event body. A zero-length body is the JSON `null` event.
pub fn decode_event(body: &[u8]) -> Result<Value, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body)
}

/// Encode a handler result. `null` means "no value" and encodes to an empty
/// body.
pub fn encode_result<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let bytes = serde_json::to_vec(value)?;
    if bytes == b"null" {
        return Ok(Vec::new());
    }
    Ok(bytes)
}

#[derive(Debug, Error)]
#[error("'{0}' is not a decimal number")]
pub struct DecimalError(String);

/// Exact decimal number serialized as its literal text (`3.140` stays
/// `3.140`), never through a binary float.
#[derive(Debug, Clone)]
pub struct Decimal(Box<RawValue>);

impl Decimal {
    pub fn parse(text: &str) -> Result<Self, DecimalError> {
        let text = text.trim();
        let is_number = matches!(serde_json::from_str::<Value>(text), Ok(Value::Number(_)));
        if !is_number {
            return Err(DecimalError(text.to_string()));
        }
        RawValue::from_string(text.to_string())
            .map(Self)
            .map_err(|_| DecimalError(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.get()
    }
}

impl FromStr for Decimal {
    type Err = DecimalError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}
