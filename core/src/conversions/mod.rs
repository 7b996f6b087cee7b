//! Component A: the data/failure conversion pipeline. A synchronous,
//! deterministic type converter plus failure converter, wrapped by an
//! optional asynchronous, non-deterministic outer codec.
//!
//! The type and failure converters are safe to call from inside the
//! workflow-deterministic zone (D/E); the codec is not, and must only be
//! invoked at the bridge boundary (worker poll/complete) or from the
//! client/activity zones.

pub mod codec;
pub mod failure_converter;
pub mod type_converter;

pub use codec::{IdentityCodec, PayloadCodec};
pub use failure_converter::FailureConverter;
pub use type_converter::{CompositePayloadConverter, ConversionError, LangValue, PayloadConverter};
