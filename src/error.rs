//! Error types for device communication and pipeline orchestration.
//!
//! Every failure surfaces as a [`DeviceError`] and propagates to the nearest
//! orchestration boundary: a failed detect fails the detection batch, a failed
//! stage aborts that driver's remaining stages (the partial results ride along
//! in the run result), and a transport failure is treated as a stage failure
//! by whichever stage touched the port. Nothing is retried at this layer;
//! retry policy, if any, belongs to the transport or the upload collaborator.

use thiserror::Error;

use crate::driver::PipelineStage;

/// Result type alias for device operations.
pub type Result<T, E = DeviceError> = std::result::Result<T, E>;

/// Main error type for device communication and pipeline runs.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DeviceError {
    /// A configured driver is missing one of the required capabilities.
    ///
    /// Surfaced (and logged) during the startup audit; the driver stays
    /// registered but fails loudly if the missing operation is invoked.
    #[error("driver '{driver}' is missing required capability '{capability}'")]
    Configuration { driver: String, capability: &'static str },

    #[error("detection failed for driver '{driver}': {reason}")]
    Detection {
        driver: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("stage '{stage}' failed for driver '{driver}'")]
    Stage {
        driver: String,
        stage: PipelineStage,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("transport error: {context}")]
    Transport {
        context: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("buffer operation failed: {context} (requested {requested}, available {available})")]
    Buffer { context: String, requested: usize, available: usize },

    #[error("upload rejected with status {status}: {reason}")]
    Remote { status: u16, reason: String },

    #[error("no driver named '{name}' is registered")]
    UnknownDriver { name: String },

    #[error("configuration error in {context}: {details}")]
    Config { context: String, details: String },

    #[error("invalid progress windows: {reason}")]
    InvalidWindows { reason: String },
}

impl DeviceError {
    /// Returns whether this error is potentially recoverable through retry.
    ///
    /// The pipeline itself never retries; this classification is for the
    /// transport and upload collaborators that own retry policy.
    pub fn is_retryable(&self) -> bool {
        match self {
            DeviceError::Transport { .. } => true,
            DeviceError::Remote { .. } => true,
            DeviceError::Configuration { .. } => false,
            DeviceError::Detection { .. } => false,
            DeviceError::Stage { .. } => false,
            DeviceError::Buffer { .. } => false,
            DeviceError::UnknownDriver { .. } => false,
            DeviceError::Config { .. } => false,
            DeviceError::InvalidWindows { .. } => false,
        }
    }

    /// Helper constructor for a missing driver capability.
    pub fn missing_capability(driver: impl Into<String>, capability: &'static str) -> Self {
        DeviceError::Configuration { driver: driver.into(), capability }
    }

    /// Helper constructor for detection failures, preserving the source error.
    pub fn detection_failed(
        driver: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DeviceError::Detection {
            driver: driver.into(),
            reason: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Helper constructor for stage failures, preserving the source error.
    pub fn stage_failed(
        driver: impl Into<String>,
        stage: PipelineStage,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DeviceError::Stage { driver: driver.into(), stage, source: Box::new(source) }
    }

    /// Helper constructor for transport errors without an I/O source.
    pub fn transport(context: impl Into<String>) -> Self {
        DeviceError::Transport { context: context.into(), source: None }
    }

    /// Helper constructor for transport errors caused by an I/O failure.
    pub fn transport_io(context: impl Into<String>, source: std::io::Error) -> Self {
        DeviceError::Transport { context: context.into(), source: Some(source) }
    }

    /// Helper constructor for buffer underflow (discard/read past the end).
    pub fn buffer_underflow(context: impl Into<String>, requested: usize, available: usize) -> Self {
        DeviceError::Buffer { context: context.into(), requested, available }
    }

    /// Helper constructor for configuration parse/load errors.
    pub fn config(context: impl Into<String>, details: impl Into<String>) -> Self {
        DeviceError::Config { context: context.into(), details: details.into() }
    }
}

impl From<std::io::Error> for DeviceError {
    fn from(err: std::io::Error) -> Self {
        DeviceError::Transport { context: "i/o failure".to_string(), source: Some(err) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_traits_validation() {
        // Compile-time check: DeviceError must be Send + Sync + 'static
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<DeviceError>();

        let error = DeviceError::transport("port vanished");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn retryable_classification() {
        assert!(DeviceError::transport("open failed").is_retryable());
        assert!(DeviceError::Remote { status: 503, reason: "busy".into() }.is_retryable());
        assert!(!DeviceError::missing_capability("Meter", "fetch_data").is_retryable());
        assert!(!DeviceError::buffer_underflow("discard", 10, 3).is_retryable());
        assert!(!DeviceError::UnknownDriver { name: "Ghost".into() }.is_retryable());
    }

    #[test]
    fn stage_error_preserves_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "port closed");
        let transport = DeviceError::transport_io("writing command", io);
        let stage = DeviceError::stage_failed("Meter", PipelineStage::FetchData, transport);

        let msg = stage.to_string();
        assert!(msg.contains("fetch_data"));
        assert!(msg.contains("Meter"));

        let source = std::error::Error::source(&stage).expect("stage error carries its source");
        assert!(source.to_string().contains("writing command"));
        let io_source = std::error::Error::source(source).expect("transport carries io source");
        assert!(io_source.to_string().contains("port closed"));
    }

    #[test]
    fn from_io_conversion_is_a_transport_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such port");
        let err: DeviceError = io.into();
        assert!(matches!(err, DeviceError::Transport { .. }));
        assert!(err.is_retryable());
    }

    #[cfg(test)]
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn messages_carry_their_context(
                driver in "\\w+",
                context in "[a-z ]+",
                requested in 0usize..10_000,
                available in 0usize..10_000,
            ) {
                let cap = DeviceError::missing_capability(driver.clone(), "detect");
                prop_assert!(cap.to_string().contains(&driver));

                let buf = DeviceError::buffer_underflow(context.clone(), requested, available);
                let msg = buf.to_string();
                prop_assert!(msg.contains(&context));
                prop_assert!(msg.contains(&requested.to_string()));
                prop_assert!(msg.contains(&available.to_string()));
            }

            #[test]
            fn detection_errors_chain_their_source(reason in "[a-z ]+") {
                let io = std::io::Error::other(reason.clone());
                let err = DeviceError::detection_failed("Pump", io);
                prop_assert!(!err.to_string().is_empty());
                let source = std::error::Error::source(&err).unwrap();
                prop_assert!(source.to_string().contains(&reason));
            }
        }
    }
}
