//! Shared configuration types for change stream consumption.

pub mod shared;
