use sdk_core_protos::payload::{encodings, Payload};
use thiserror::Error;

/// A language-side value on its way to, or just decoded from, a [`Payload`].
/// Stands in for "any value with a structural encoder": a concrete SDK
/// would make this generic over `T: Serialize`, but the core only needs to
/// reason about which wire shape a value takes.
#[derive(Debug, Clone, PartialEq)]
pub enum LangValue {
    Null,
    Binary(Vec<u8>),
    ProtoJson { type_name: String, json: serde_json::Value },
    ProtoBinary { type_name: String, bytes: Vec<u8> },
    Json(serde_json::Value),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("payload has no `encoding` metadata and is invalid")]
    MissingEncoding,
    #[error("unknown encoding `{0}`: no converter in the chain accepts it")]
    UnknownEncoding(String),
    #[error("no converter in the chain accepts this value for encoding")]
    NoConverterAccepted,
    #[error("payload arity {payloads} does not match target arity {targets}")]
    ArityMismatch { payloads: usize, targets: usize },
    #[error("malformed payload for encoding `{encoding}`: {reason}")]
    Malformed { encoding: String, reason: String },
}

/// One encoder/decoder in the composite chain (§4.A).
trait SubConverter: Send + Sync {
    fn encoding(&self) -> &'static str;
    fn try_encode(&self, value: &LangValue) -> Option<Payload>;
    fn decode(&self, payload: &Payload) -> Result<LangValue, ConversionError>;
}

struct NullConverter;
impl SubConverter for NullConverter {
    fn encoding(&self) -> &'static str {
        encodings::BINARY_NULL
    }
    fn try_encode(&self, value: &LangValue) -> Option<Payload> {
        matches!(value, LangValue::Null).then(|| Payload::new(Vec::new(), self.encoding()))
    }
    fn decode(&self, _payload: &Payload) -> Result<LangValue, ConversionError> {
        Ok(LangValue::Null)
    }
}

struct BinaryConverter;
impl SubConverter for BinaryConverter {
    fn encoding(&self) -> &'static str {
        encodings::BINARY_PLAIN
    }
    fn try_encode(&self, value: &LangValue) -> Option<Payload> {
        match value {
            LangValue::Binary(b) => Some(Payload::new(b.clone(), self.encoding())),
            _ => None,
        }
    }
    fn decode(&self, payload: &Payload) -> Result<LangValue, ConversionError> {
        Ok(LangValue::Binary(payload.data.clone()))
    }
}

struct JsonProtoConverter;
impl SubConverter for JsonProtoConverter {
    fn encoding(&self) -> &'static str {
        encodings::JSON_PROTOBUF
    }
    fn try_encode(&self, value: &LangValue) -> Option<Payload> {
        match value {
            LangValue::ProtoJson { type_name, json } => {
                let data = serde_json::to_vec(json).ok()?;
                Some(Payload::new(data, self.encoding()).with_metadata("messageType", type_name.clone().into_bytes()))
            }
            _ => None,
        }
    }
    fn decode(&self, payload: &Payload) -> Result<LangValue, ConversionError> {
        let type_name = payload.message_type().unwrap_or_default().to_string();
        let json: serde_json::Value = serde_json::from_slice(&payload.data).map_err(|e| ConversionError::Malformed {
            encoding: self.encoding().to_string(),
            reason: e.to_string(),
        })?;
        Ok(LangValue::ProtoJson { type_name, json })
    }
}

struct BinaryProtoConverter;
impl SubConverter for BinaryProtoConverter {
    fn encoding(&self) -> &'static str {
        encodings::BINARY_PROTOBUF
    }
    fn try_encode(&self, value: &LangValue) -> Option<Payload> {
        match value {
            LangValue::ProtoBinary { type_name, bytes } => {
                Some(Payload::new(bytes.clone(), self.encoding()).with_metadata("messageType", type_name.clone().into_bytes()))
            }
            _ => None,
        }
    }
    fn decode(&self, payload: &Payload) -> Result<LangValue, ConversionError> {
        let type_name = payload.message_type().unwrap_or_default().to_string();
        Ok(LangValue::ProtoBinary { type_name, bytes: payload.data.clone() })
    }
}

struct JsonConverter;
impl SubConverter for JsonConverter {
    fn encoding(&self) -> &'static str {
        encodings::JSON_PLAIN
    }
    fn try_encode(&self, value: &LangValue) -> Option<Payload> {
        match value {
            LangValue::Json(v) => serde_json::to_vec(v).ok().map(|d| Payload::new(d, self.encoding())),
            _ => None,
        }
    }
    fn decode(&self, payload: &Payload) -> Result<LangValue, ConversionError> {
        let v = serde_json::from_slice(&payload.data).map_err(|e| ConversionError::Malformed {
            encoding: self.encoding().to_string(),
            reason: e.to_string(),
        })?;
        Ok(LangValue::Json(v))
    }
}

/// The trait the rest of the workspace programs against; `core` ships one
/// implementation ([`CompositePayloadConverter`]) but callers (e.g. a
/// custom codec pipeline) may substitute their own.
pub trait PayloadConverter: Send + Sync {
    fn encode(&self, value: &LangValue) -> Result<Payload, ConversionError>;
    fn decode(&self, payload: &Payload) -> Result<LangValue, ConversionError>;

    fn encode_values(&self, values: &[LangValue]) -> Result<Vec<Payload>, ConversionError> {
        values.iter().map(|v| self.encode(v)).collect()
    }

    fn decode_values(&self, payloads: &[Payload], target_arity: usize) -> Result<Vec<LangValue>, ConversionError> {
        if payloads.len() != target_arity {
            return Err(ConversionError::ArityMismatch { payloads: payloads.len(), targets: target_arity });
        }
        payloads.iter().map(|p| self.decode(p)).collect()
    }
}

/// Tries encoders in priority order; the first to accept wins (§4.A).
pub struct CompositePayloadConverter {
    chain: Vec<Box<dyn SubConverter>>,
}

impl Default for CompositePayloadConverter {
    fn default() -> Self {
        Self {
            chain: vec![
                Box::new(NullConverter),
                Box::new(BinaryConverter),
                Box::new(JsonProtoConverter),
                Box::new(BinaryProtoConverter),
                Box::new(JsonConverter),
            ],
        }
    }
}

impl PayloadConverter for CompositePayloadConverter {
    fn encode(&self, value: &LangValue) -> Result<Payload, ConversionError> {
        // Encoding a void value (Null) never invokes a sub-converter's real
        // work beyond producing the empty sentinel payload, but it still
        // flows through the same dispatch so priority order stays visible.
        self.chain
            .iter()
            .find_map(|c| c.try_encode(value))
            .ok_or(ConversionError::NoConverterAccepted)
    }

    fn decode(&self, payload: &Payload) -> Result<LangValue, ConversionError> {
        let encoding = payload.encoding().ok_or(ConversionError::MissingEncoding)?;
        self.chain
            .iter()
            .find(|c| c.encoding() == encoding)
            .ok_or_else(|| ConversionError::UnknownEncoding(encoding.to_string()))?
            .decode(payload)
    }
}
