//! Thin serde layer on top of component A's [`PayloadConverter`]. The core
//! workspace reasons about wire values as [`LangValue`]; this crate is the
//! first place that reasons about them as concrete Rust types, so every
//! typed value it moves across the boundary goes through here.

use temporal_core::conversions::{ConversionError, LangValue, PayloadConverter};
use sdk_core_protos::payload::Payload;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

pub(crate) fn encode<A: Serialize>(converter: &Arc<dyn PayloadConverter>, value: &A) -> Result<Payload, ConversionError> {
    let json = serde_json::to_value(value).map_err(|e| ConversionError::Malformed { encoding: "json/plain".to_string(), reason: e.to_string() })?;
    converter.encode(&LangValue::Json(json))
}

pub(crate) fn decode<R: DeserializeOwned>(converter: &Arc<dyn PayloadConverter>, payload: &Payload) -> Result<R, ConversionError> {
    let value = match converter.decode(payload)? {
        LangValue::Json(v) => v,
        LangValue::Null => serde_json::Value::Null,
        other => return Err(ConversionError::Malformed { encoding: "json/plain".to_string(), reason: format!("expected a JSON-encoded value, decoded {other:?}") }),
    };
    serde_json::from_value(value).map_err(|e| ConversionError::Malformed { encoding: "json/plain".to_string(), reason: e.to_string() })
}

/// Decodes the first element of an argument list, or `null` if the list is
/// empty — lets a workflow/activity fn declare `()` as its input type
/// without every caller having to pass an explicit empty payload.
pub(crate) fn decode_first<A: DeserializeOwned>(converter: &Arc<dyn PayloadConverter>, payloads: &[Payload]) -> Result<A, ConversionError> {
    match payloads.first() {
        Some(p) => decode(converter, p),
        None => serde_json::from_value(serde_json::Value::Null)
            .map_err(|e| ConversionError::Malformed { encoding: "json/plain".to_string(), reason: e.to_string() }),
    }
}

pub(crate) fn decode_opt<R: DeserializeOwned>(converter: &Arc<dyn PayloadConverter>, payload: Option<Payload>) -> Result<R, ConversionError> {
    match payload {
        Some(p) => decode(converter, &p),
        None => serde_json::from_value(serde_json::Value::Null)
            .map_err(|e| ConversionError::Malformed { encoding: "json/plain".to_string(), reason: e.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use temporal_core::conversions::CompositePayloadConverter;

    fn converter() -> Arc<dyn PayloadConverter> {
        Arc::new(CompositePayloadConverter::default())
    }

    #[test]
    fn encode_then_decode_round_trips_a_struct() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Greeting {
            name: String,
            count: u32,
        }
        let c = converter();
        let value = Greeting { name: "world".to_string(), count: 3 };
        let payload = encode(&c, &value).unwrap();
        let decoded: Greeting = decode(&c, &payload).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn decode_first_treats_an_empty_argument_list_as_unit() {
        let c = converter();
        let decoded: () = decode_first(&c, &[]).unwrap();
        assert_eq!(decoded, ());
    }

    #[test]
    fn decode_first_decodes_only_the_first_of_several_payloads() {
        let c = converter();
        let a = encode(&c, &1i32).unwrap();
        let b = encode(&c, &2i32).unwrap();
        let decoded: i32 = decode_first(&c, &[a, b]).unwrap();
        assert_eq!(decoded, 1);
    }

    #[test]
    fn decode_opt_treats_none_as_unit() {
        let c = converter();
        let decoded: () = decode_opt(&c, None).unwrap();
        assert_eq!(decoded, ());
    }

    #[test]
    fn decode_opt_decodes_the_payload_when_present() {
        let c = converter();
        let payload = encode(&c, &"hi".to_string()).unwrap();
        let decoded: String = decode_opt(&c, Some(payload)).unwrap();
        assert_eq!(decoded, "hi");
    }

    #[test]
    fn decode_rejects_a_non_json_payload() {
        let c = converter();
        let binary = c.encode(&LangValue::Binary(vec![1, 2, 3])).unwrap();
        let err = decode::<String>(&c, &binary).unwrap_err();
        assert!(matches!(err, ConversionError::Malformed { .. }));
    }
}
