//! Exchange access layer.
//!
//! - [`Broker`] - raw capability implemented by each exchange client
//! - [`ExchangeMonitor`] - per-exchange rate-limited priority scheduler
//! - [`Exchange`] - async facade that turns every call into a scheduled job
//! - [`retry_read`] - indefinite resubmission for read-only calls

mod facade;
mod job;
mod monitor;
mod retry;
mod traits;

pub use facade::Exchange;
pub use job::{Job, JobCallback, JobId, JobPriority, JobRequest, JobResponse, JobResult};
pub use monitor::ExchangeMonitor;
pub use retry::retry_read;
pub use traits::Broker;
