//! Page protocol messages
//!
//! A request is the MessagePack array `[id, command, params]`, a response
//! is `[id, result]`. Exactly one message travels each way per connection;
//! the writer half-closes after sending, so no length prefix is needed.

mod command;

pub use command::{HighlightMatches, PageCommand, HTML_KEY, SNAPSHOT_KEY};

use crate::error::{ErrorType, Result, RoamError};
use rmpv::Value;
use std::collections::BTreeMap;
use std::io::{self, Cursor};

/// String-keyed parameters or results
pub type PayloadMap = BTreeMap<String, String>;

/// Default cap on a single encoded message
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// Chrome -> worker message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: u64,
    pub command: String,
    pub params: PayloadMap,
}

/// Worker -> chrome message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub id: u64,
    pub result: PayloadMap,
}

impl Request {
    pub fn new(id: u64, command: impl Into<String>, params: PayloadMap) -> Self {
        Self {
            id,
            command: command.into(),
            params,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_value(&Value::Array(vec![
            Value::from(self.id),
            Value::from(self.command.as_str()),
            map_to_value(&self.params),
        ]))
    }

    fn from_value(value: Value) -> Result<Self> {
        let Value::Array(items) = value else {
            return Err(malformed("request is not an array"));
        };
        let [id, command, params]: [Value; 3] = items
            .try_into()
            .map_err(|items: Vec<Value>| malformed(format!("request has {} fields, expected 3", items.len())))?;

        let id = id.as_u64().ok_or_else(|| malformed("request id is not an unsigned integer"))?;
        let command = value_to_string(&command).ok_or_else(|| malformed("command name is not a string"))?;
        let params = value_to_map(params)?;

        Ok(Self { id, command, params })
    }
}

impl Response {
    pub fn new(id: u64, result: PayloadMap) -> Self {
        Self { id, result }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        encode_value(&Value::Array(vec![
            Value::from(self.id),
            map_to_value(&self.result),
        ]))
    }

    fn from_value(value: Value) -> Result<Self> {
        let Value::Array(items) = value else {
            return Err(malformed("response is not an array"));
        };
        let [id, result]: [Value; 2] = items
            .try_into()
            .map_err(|items: Vec<Value>| malformed(format!("response has {} fields, expected 2", items.len())))?;

        let id = id.as_u64().ok_or_else(|| malformed("response id is not an unsigned integer"))?;
        Ok(Self {
            id,
            result: value_to_map(result)?,
        })
    }
}

/// Accumulates bytes from partial reads until one whole message decodes.
/// Bytes after the first message are ignored.
#[derive(Debug)]
pub struct MessageDecoder {
    buffer: Vec<u8>,
    max_bytes: usize,
}

impl MessageDecoder {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_bytes,
        }
    }

    /// Append received bytes
    pub fn feed(&mut self, bytes: &[u8]) -> Result<()> {
        if self.buffer.len() + bytes.len() > self.max_bytes {
            return Err(RoamError::protocol(
                "PROTOCOL_MESSAGE_TOO_LARGE",
                format!("message exceeds {} bytes", self.max_bytes),
            ));
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The request, once enough bytes arrived
    pub fn request(&self) -> Result<Option<Request>> {
        self.value()?.map(Request::from_value).transpose()
    }

    /// The response, once enough bytes arrived
    pub fn response(&self) -> Result<Option<Response>> {
        self.value()?.map(Response::from_value).transpose()
    }

    fn value(&self) -> Result<Option<Value>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let mut cursor = Cursor::new(self.buffer.as_slice());
        match rmpv::decode::read_value(&mut cursor) {
            Ok(value) => Ok(Some(value)),
            Err(err) if is_incomplete(&err) => Ok(None),
            Err(err) => Err(malformed(err.to_string())),
        }
    }
}

fn is_incomplete(err: &rmpv::decode::Error) -> bool {
    match err {
        rmpv::decode::Error::InvalidMarkerRead(io) | rmpv::decode::Error::InvalidDataRead(io) => {
            io.kind() == io::ErrorKind::UnexpectedEof
        }
        _ => false,
    }
}

fn malformed(message: impl Into<String>) -> RoamError {
    RoamError::protocol("PROTOCOL_MALFORMED", message)
}

fn encode_value(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    rmpv::encode::write_value(&mut out, value).map_err(|err| {
        RoamError::new(ErrorType::Protocol, "PROTOCOL_ENCODE", err.to_string())
    })?;
    Ok(out)
}

fn map_to_value(map: &PayloadMap) -> Value {
    Value::Map(
        map.iter()
            .map(|(k, v)| (Value::from(k.as_str()), Value::from(v.as_str())))
            .collect(),
    )
}

/// Strings and raw bytes are both accepted; scalars are stringified.
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(
            s.as_str()
                .map_or_else(|| String::from_utf8_lossy(s.as_bytes()).into_owned(), str::to_string),
        ),
        Value::Binary(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::F32(f) => Some(f.to_string()),
        Value::F64(f) => Some(f.to_string()),
        Value::Nil => Some(String::new()),
        _ => None,
    }
}

fn value_to_map(value: Value) -> Result<PayloadMap> {
    match value {
        Value::Map(entries) => entries
            .iter()
            .map(|(k, v)| {
                let key = value_to_string(k).ok_or_else(|| malformed("map key is not a string"))?;
                let val = value_to_string(v)
                    .ok_or_else(|| malformed(format!("value for '{key}' is not a scalar")))?;
                Ok((key, val))
            })
            .collect(),
        Value::Nil => Ok(PayloadMap::new()),
        _ => Err(malformed("expected a map")),
    }
}
