//! Row log: durable per-subscription change queues plus wake-up signalling
//!
//! The row log decouples writers from asynchronous index maintainers: the
//! record store appends one message per mutation, subscriptions consume
//! independently in `order_nr` order, and a debounced notifier nudges
//! remote processors without ever being a correctness dependency — a
//! missed or duplicate wake-up only shifts latency, because consumers own
//! their queues and poll regardless.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod log;
pub mod notifier;
pub mod subscription;

pub use log::{LogMessage, MemoryRowLog, RowLog};
pub use notifier::{ProcessorNotifier, ProcessorWaker, WakeError};
pub use subscription::{Subscription, SubscriptionKind};
