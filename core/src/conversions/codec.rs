use async_trait::async_trait;
use sdk_core_protos::failure::Failure;
use sdk_core_protos::payload::Payload;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("codec failed to encode payload: {0}")]
    Encode(String),
    #[error("codec failed to decode payload: {0}")]
    Decode(String),
}

/// The outer, asynchronous, non-deterministic layer of component A —
/// encryption/compression codecs. Called only outside the workflow
/// deterministic context: at the bridge boundary, and on failure trees
/// before/after they cross that boundary.
#[async_trait]
pub trait PayloadCodec: Send + Sync {
    async fn encode(&self, payloads: Vec<Payload>) -> Result<Vec<Payload>, CodecError>;
    async fn decode(&self, payloads: Vec<Payload>) -> Result<Vec<Payload>, CodecError>;

    /// Recursively applies the codec to every payload reachable from a
    /// failure tree: `encodedAttributes`, each `info` variant's `details`/
    /// `lastHeartbeatDetails`, and the `cause` chain.
    async fn encode_failure(&self, mut f: Failure) -> Result<Failure, CodecError> {
        if let Some(attrs) = f.encoded_attributes.take() {
            f.encoded_attributes = Some(self.encode(vec![attrs]).await?.remove(0));
        }
        f.info = self.encode_failure_info(f.info).await?;
        if let Some(cause) = f.cause.take() {
            f.cause = Some(Box::new(self.encode_failure(*cause).await?));
        }
        Ok(f)
    }

    async fn decode_failure(&self, mut f: Failure) -> Result<Failure, CodecError> {
        if let Some(attrs) = f.encoded_attributes.take() {
            f.encoded_attributes = Some(self.decode(vec![attrs]).await?.remove(0));
        }
        f.info = self.decode_failure_info(f.info).await?;
        if let Some(cause) = f.cause.take() {
            f.cause = Some(Box::new(self.decode_failure(*cause).await?));
        }
        Ok(f)
    }

    async fn encode_failure_info(&self, info: sdk_core_protos::failure::FailureInfo) -> Result<sdk_core_protos::failure::FailureInfo, CodecError> {
        use sdk_core_protos::failure::FailureInfo::*;
        Ok(match info {
            Application { r#type, non_retryable, next_retry_delay, details } => Application {
                r#type,
                non_retryable,
                next_retry_delay,
                details: match details {
                    Some(d) => Some(self.encode(d).await?),
                    None => None,
                },
            },
            Cancelled { details } => Cancelled {
                details: match details {
                    Some(d) => Some(self.encode(d).await?),
                    None => None,
                },
            },
            Terminated { reason, details } => Terminated {
                reason,
                details: match details {
                    Some(d) => Some(self.encode(d).await?),
                    None => None,
                },
            },
            Timeout { kind, last_heartbeat_details } => Timeout {
                kind,
                last_heartbeat_details: match last_heartbeat_details {
                    Some(d) => Some(self.encode(d).await?),
                    None => None,
                },
            },
            other => other,
        })
    }

    async fn decode_failure_info(&self, info: sdk_core_protos::failure::FailureInfo) -> Result<sdk_core_protos::failure::FailureInfo, CodecError> {
        use sdk_core_protos::failure::FailureInfo::*;
        Ok(match info {
            Application { r#type, non_retryable, next_retry_delay, details } => Application {
                r#type,
                non_retryable,
                next_retry_delay,
                details: match details {
                    Some(d) => Some(self.decode(d).await?),
                    None => None,
                },
            },
            Cancelled { details } => Cancelled {
                details: match details {
                    Some(d) => Some(self.decode(d).await?),
                    None => None,
                },
            },
            Terminated { reason, details } => Terminated {
                reason,
                details: match details {
                    Some(d) => Some(self.decode(d).await?),
                    None => None,
                },
            },
            Timeout { kind, last_heartbeat_details } => Timeout {
                kind,
                last_heartbeat_details: match last_heartbeat_details {
                    Some(d) => Some(self.decode(d).await?),
                    None => None,
                },
            },
            other => other,
        })
    }
}

/// No-op codec used when no encryption/compression layer is configured.
pub struct IdentityCodec;

#[async_trait]
impl PayloadCodec for IdentityCodec {
    async fn encode(&self, payloads: Vec<Payload>) -> Result<Vec<Payload>, CodecError> {
        Ok(payloads)
    }
    async fn decode(&self, payloads: Vec<Payload>) -> Result<Vec<Payload>, CodecError> {
        Ok(payloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identity_codec_round_trips() {
        let codec = IdentityCodec;
        let p = Payload::new(b"hi".to_vec(), "binary/plain");
        let encoded = codec.encode(vec![p.clone()]).await.unwrap();
        let decoded = codec.decode(encoded).await.unwrap();
        assert_eq!(decoded, vec![p]);
    }
}
