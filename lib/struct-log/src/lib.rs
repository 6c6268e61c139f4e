//! Structured JSON logging for `tracing` with redaction of card numbers and
//! credentials.

mod builder;
mod error;
mod formatting_layer;
mod redact;
mod storage;

pub use builder::StructLogBuilder;
pub use error::SetupError;
pub use formatting_layer::JsonLogLayer;
pub use redact::{mask_card_numbers, Redactor, REDACTED};
pub use storage::{FieldsStorage, StorageLayer};
