use sdk_core_protos::failure::{Failure, FailureInfo};
use sdk_core_protos::payload::{encodings, Payload};

/// A user error that may carry a known failure shape (application,
/// cancelled, terminated, timeout, activity/child wrapper, server). Errors
/// that don't implement this, or return `None`, become an `Application`
/// failure tagged with the caller-supplied type name.
pub trait KnownFailure: std::error::Error {
    fn failure_info(&self) -> Option<FailureInfo> {
        None
    }
}

const ENCODED_MESSAGE_SENTINEL: &str = "Encoded failure attributes";
const ENCODED_STACK_SENTINEL: &str = "";

/// Maps between language errors and [`Failure`] records, and between the
/// "encode common attributes" in-band/out-of-band representations of the
/// same failure. Entirely synchronous and deterministic: safe to call from
/// inside the workflow zone.
pub struct FailureConverter {
    pub encode_common_attributes: bool,
}

impl Default for FailureConverter {
    fn default() -> Self {
        Self { encode_common_attributes: false }
    }
}

impl FailureConverter {
    pub fn to_failure(&self, type_name: &str, err: &dyn KnownFailure) -> Failure {
        let info = err.failure_info().unwrap_or_else(|| FailureInfo::Application {
            r#type: type_name.to_string(),
            non_retryable: false,
            next_retry_delay: None,
            details: None,
        });
        Failure {
            message: err.to_string(),
            source: Some("core".to_string()),
            stack_trace: None,
            encoded_attributes: None,
            cause: err.source().map(|_| {
                // `std::error::Error::source` doesn't give us a `KnownFailure`,
                // only `dyn Error`; we still record a generic application
                // cause so the chain isn't silently dropped.
                Box::new(Failure::application("Error", err.source().unwrap().to_string(), false))
            }),
            info,
        }
    }

    /// Moves `message`/`stack_trace` into an encoded JSON payload, replacing
    /// the outer fields with sentinel strings. Recurses into `cause`.
    pub fn encode(&self, mut f: Failure) -> Failure {
        if !self.encode_common_attributes {
            if let Some(cause) = f.cause.take() {
                f.cause = Some(Box::new(self.encode(*cause)));
            }
            return f;
        }
        let attrs = serde_json::json!({ "message": f.message, "stack_trace": f.stack_trace });
        let data = serde_json::to_vec(&attrs).expect("json serialization of two strings cannot fail");
        f.encoded_attributes = Some(Payload::new(data, encodings::JSON_PLAIN));
        f.message = ENCODED_MESSAGE_SENTINEL.to_string();
        f.stack_trace = Some(ENCODED_STACK_SENTINEL.to_string());
        if let Some(cause) = f.cause.take() {
            f.cause = Some(Box::new(self.encode(*cause)));
        }
        f
    }

    /// Reverses [`Self::encode`] given a payload that has already passed
    /// through the outer codec's decode step.
    pub fn decode(&self, mut f: Failure) -> Failure {
        if let Some(attrs) = f.encoded_attributes.take() {
            if let Ok(v) = serde_json::from_slice::<serde_json::Value>(&attrs.data) {
                if let Some(m) = v.get("message").and_then(|m| m.as_str()) {
                    f.message = m.to_string();
                }
                f.stack_trace = v.get("stack_trace").and_then(|s| s.as_str()).map(|s| s.to_string());
            }
        }
        if let Some(cause) = f.cause.take() {
            f.cause = Some(Box::new(self.decode(*cause)));
        }
        f
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct PlainError;
    impl KnownFailure for PlainError {}

    #[test]
    fn unknown_error_becomes_application_failure() {
        let conv = FailureConverter::default();
        let f = conv.to_failure("PlainError", &PlainError);
        match f.info {
            FailureInfo::Application { r#type, non_retryable, .. } => {
                assert_eq!(r#type, "PlainError");
                assert!(!non_retryable);
            }
            _ => panic!("expected application failure"),
        }
        assert_eq!(f.message, "boom");
    }

    #[test]
    fn encode_decode_round_trips_message_and_stack_trace() {
        let conv = FailureConverter { encode_common_attributes: true };
        let mut original = Failure::application("Err", "original message", false);
        original.stack_trace = Some("at foo\nat bar".to_string());
        let encoded = conv.encode(original.clone());
        assert_eq!(encoded.message, ENCODED_MESSAGE_SENTINEL);
        assert!(encoded.encoded_attributes.is_some());
        let decoded = conv.decode(encoded);
        assert_eq!(decoded.message, original.message);
        assert_eq!(decoded.stack_trace, original.stack_trace);
    }
}
