//! Subscriptions
//!
//! A subscription names one consumer of a row log. Subscriptions of one
//! row log are processed in increasing `order_nr`; ties are broken by
//! insertion order (the log tracks insertion, not this value object).

use std::fmt;

/// Where a subscription's listeners run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionKind {
    /// Listeners run in the writing process
    Local,
    /// Listeners run in a remote processor
    Remote,
    /// Write-ahead consumer, reserved for the log's own processor
    WriteAhead,
}

/// A value object describing one subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    /// Id of the row log this subscription belongs to
    pub row_log_id: String,
    /// Id of the subscription itself
    pub subscription_id: String,
    /// Kind of consumer
    pub kind: SubscriptionKind,
    /// Position between the other subscriptions of the row log
    pub order_nr: i32,
}

impl Subscription {
    /// Create a subscription
    pub fn new(
        row_log_id: impl Into<String>,
        subscription_id: impl Into<String>,
        kind: SubscriptionKind,
        order_nr: i32,
    ) -> Self {
        Self {
            row_log_id: row_log_id.into(),
            subscription_id: subscription_id.into(),
            kind,
            order_nr,
        }
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} (#{})",
            self.row_log_id, self.subscription_id, self.order_nr
        )
    }
}
