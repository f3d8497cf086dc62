//! Shared execution resources: worker pools and retry pacing.

mod backoff;
mod pool;

pub use backoff::ExponentialBackoff;
pub use pool::ResourcePool;
