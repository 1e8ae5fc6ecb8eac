//! Metrics definitions for change stream monitoring.

/// Counter for data events yielded to the consumer.
pub const CDC_EVENTS_YIELDED_TOTAL: &str = "cdc_events_yielded_total";

/// Counter for heartbeat events observed and discarded.
pub const CDC_HEARTBEATS_TOTAL: &str = "cdc_heartbeats_total";

/// Counter for consumer polls that timed out without an event.
pub const CDC_IDLE_POLLS_TOTAL: &str = "cdc_idle_polls_total";

/// Counter for events moved into the residual buffer during shutdown.
pub const CDC_RESIDUAL_EVENTS_TOTAL: &str = "cdc_residual_events_total";

/// Counter for shutdown procedures run to completion.
pub const CDC_SHUTDOWNS_TOTAL: &str = "cdc_shutdowns_total";
