use chrono::{DateTime, Utc};

/// A fact emitted by one of the ledger's aggregates.
///
/// Sale, count-session and stock events all implement this so they can be
/// logged and audited uniformly. Stock movements double as events too.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted name, e.g. `"sales.sale.cancelled"`.
    fn event_type(&self) -> &'static str;

    /// Payload schema version; bump when a field changes meaning.
    fn version(&self) -> u32;

    /// Business time of the change.
    fn occurred_at(&self) -> DateTime<Utc>;
}
