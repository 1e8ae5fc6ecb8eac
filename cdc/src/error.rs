//! Error types and result definitions for change stream operations.
//!
//! Every failure in this crate is fatal for the current sync attempt: the
//! stream fails fast and preserves whatever was already buffered, while
//! retrying a whole attempt is the job of the outer orchestration layer.
//! [`CdcError`] captures an [`ErrorKind`] for classification together with
//! the callsite location and optional detail and source for diagnostics.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use config::shared::ValidationError;

/// Convenient result type for change stream operations using [`CdcError`] as
/// the error type.
pub type CdcResult<T> = Result<T, CdcError>;

/// Main error type for change stream operations.
#[derive(Debug, Clone)]
pub struct CdcError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
}

/// Specific categories of errors that can occur while consuming a change
/// stream.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// No event was observed within the idle-wait budget for the configured
    /// number of consecutive polls while the caller still wanted to wait.
    StallTimeout,
    /// A wait on the hand-off queue ended abnormally, for example because the
    /// queue was closed out from under the consumer.
    InterruptedWait,
    /// The source engine's stop callback returned an error.
    ProducerStopFailed,
    /// A replication position could not be parsed out of an event or
    /// heartbeat offset map. This indicates a mis-configured position scheme,
    /// not a transient fault.
    PositionExtractionFailed,
    /// An operation was attempted in a state that does not allow it.
    InvalidState,
    /// Configuration was rejected during validation.
    ConfigError,

    /// Unknown or uncategorized error.
    Unknown,
}

impl CdcError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Attaches an originating [`error::Error`] to this error and returns the
    /// modified instance.
    ///
    /// The stored source is preserved across clones and exposed via
    /// [`error::Error::source`].
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Creates a [`CdcError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
    ) -> Self {
        CdcError {
            kind,
            description,
            detail,
            source: None,
            location: Location::caller(),
        }
    }
}

impl<D> From<(ErrorKind, D)> for CdcError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, description): (ErrorKind, D)) -> Self {
        CdcError::from_components(kind, description.into(), None)
    }
}

impl<D, T> From<(ErrorKind, D, T)> for CdcError
where
    D: Into<Cow<'static, str>>,
    T: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, description, detail): (ErrorKind, D, T)) -> Self {
        CdcError::from_components(kind, description.into(), Some(detail.into()))
    }
}

impl From<ValidationError> for CdcError {
    #[track_caller]
    fn from(err: ValidationError) -> Self {
        CdcError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid stream configuration"),
            Some(Cow::Owned(err.to_string())),
        )
        .with_source(err)
    }
}

impl fmt::Display for CdcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            self.kind,
            self.description,
            self.location.file(),
            self.location.line(),
            self.location.column()
        )?;

        if let Some(detail) = self.detail.as_deref() {
            write!(f, "\n  detail: {detail}")?;
        }

        Ok(())
    }
}

impl error::Error for CdcError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_preserves_kind_and_detail() {
        let err = CdcError::from((
            ErrorKind::StallTimeout,
            "No event received",
            "waited 12 polls".to_string(),
        ));

        assert_eq!(err.kind(), ErrorKind::StallTimeout);
        assert_eq!(err.detail(), Some("waited 12 polls"));
    }

    #[test]
    fn display_includes_kind_and_location() {
        let err = CdcError::from((ErrorKind::InterruptedWait, "Queue closed"));
        let rendered = err.to_string();

        assert!(rendered.contains("InterruptedWait"));
        assert!(rendered.contains("Queue closed"));
        assert!(rendered.contains("error.rs"));
    }

    #[test]
    fn validation_error_maps_to_config_kind() {
        let validation = ValidationError::InvalidFieldValue {
            field: "stream.queue_capacity",
            constraint: "must be greater than 0",
        };
        let err = CdcError::from(validation);

        assert_eq!(err.kind(), ErrorKind::ConfigError);
        assert!(err.detail().unwrap().contains("queue_capacity"));
    }
}
