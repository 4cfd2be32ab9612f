//! Lease-based row locking over the cell substrate
//!
//! ## Design Principles
//!
//! 1. **CAS-only correctness**: No lock service, no in-process mutual
//!    exclusion. At most one valid (non-expired) lock exists per row key
//!    at any instant, enforced purely through the atomicity of a
//!    single-cell compare-and-swap.
//!
//! 2. **Leases, not ownership**: A lock is a lease. Expiry is clock-based
//!    using each process's local clock; the design assumes bounded clock
//!    skew across processes. Under lease timeout misconfiguration two
//!    holders can briefly overlap — an accepted availability tradeoff.
//!
//! 3. **Contention is not an error**: A failed acquisition returns `None`,
//!    never an error. Callers decide whether to retry.
//!
//! Guarded mutations (`guarded_write`, `guarded_delete_row`) key the
//! underlying write on the caller's permit, so a write silently no-ops
//! (returns false) when the lease was lost in the meantime.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod locker;
pub mod permit;

pub use locker::{BackoffPolicy, RowLock, RowLocker};
pub use permit::Permit;
