//! Bounded object cache: per-domain storage, quotas and eviction.

pub mod bounded;
pub mod entry;
pub mod eviction;
pub mod facade;
pub mod quota;
pub mod read_through;
mod state;

pub use bounded::{BoundedObjectCache, LoadPlan, RejectReason, SetOutcome};
pub use entry::EntrySnapshot;
pub use eviction::{Eviction, EvictionPolicy};
pub use facade::{ObjectCache, ObjectRegistry};
pub use quota::{FnQuotaResolver, NoQuotas, QuotaPlan, QuotaResolver, QuotaSnapshot};
pub use read_through::ObjectFetcher;
