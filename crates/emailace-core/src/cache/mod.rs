//! Keyed query cache shared by every dashboard view.
//!
//! Views subscribe to a [`QueryKey`]; the cache fetches once per key no
//! matter how many views are watching, keeps the result until it is
//! invalidated, optionally re-polls it, and drops it when the last view goes
//! away.

mod key;
mod registry;
mod snapshot;

pub use key::QueryKey;
pub use registry::{FetchCache, Subscription};
pub use snapshot::{CacheSnapshot, CacheStatus, QueryState};
