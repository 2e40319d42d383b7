//! Command abstractions.

use uuid::Uuid;

/// Implemented by every request that mutates sale or product state.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// Stable name used in log fields, e.g. `sales.purchase`.
    fn command_type(&self) -> &'static str;

    /// Correlation ID carried through spans and log lines for this request.
    fn correlation_id(&self) -> Uuid;
}
