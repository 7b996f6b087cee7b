use std::collections::HashMap;

/// Metadata key naming the type converter that produced a payload's bytes.
pub const ENCODING_KEY: &str = "encoding";

/// Well-known encoding metadata values. Taken as given from the upstream
/// wire format; other SDKs are expected to agree on these strings for
/// cross-SDK encoding compatibility.
pub mod encodings {
    pub const BINARY_NULL: &str = "binary/null";
    pub const BINARY_PLAIN: &str = "binary/plain";
    pub const JSON_PROTOBUF: &str = "json/protobuf";
    pub const BINARY_PROTOBUF: &str = "binary/protobuf";
    pub const JSON_PLAIN: &str = "json/plain";
}

/// The wire unit of data crossing the server boundary: opaque bytes plus a
/// string-keyed metadata map. A payload with no `encoding` metadata key is
/// invalid and must be rejected by decoders.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    pub data: Vec<u8>,
    pub metadata: HashMap<String, Vec<u8>>,
}

impl Payload {
    pub fn new(data: Vec<u8>, encoding: &str) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(ENCODING_KEY.to_string(), encoding.as_bytes().to_vec());
        Self { data, metadata }
    }

    pub fn encoding(&self) -> Option<&str> {
        self.metadata
            .get(ENCODING_KEY)
            .and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn with_metadata(mut self, key: &str, value: Vec<u8>) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn message_type(&self) -> Option<&str> {
        self.metadata
            .get("messageType")
            .and_then(|b| std::str::from_utf8(b).ok())
    }
}

/// An ordered list of payloads, as carried by activity/workflow arguments
/// and results on the wire.
pub type Payloads = Vec<Payload>;

/// A string -> payload map, used for header propagation on workflow start,
/// signals, queries, updates, and activity scheduling.
pub type Headers = HashMap<String, Payload>;

/// Default header key carrying tracer injection/extraction data.
pub const DEFAULT_TRACE_HEADER_KEY: &str = "_tracer-data";
