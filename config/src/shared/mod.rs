//! Shared configuration types for change stream pipelines.

mod stream;

pub use stream::{StreamConfig, ValidationError};
