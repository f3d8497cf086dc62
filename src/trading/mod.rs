//! Trading state machines and the order protocols they drive.
//!
//! [`AlgExecutor`] trades on live-ticker indicators and
//! [`HistoryAlgExecutor`] on candle-history indicators. Both are generic over
//! [`OrderExecution`]: [`LiveExecution`] places real orders through the
//! rate-limited exchange, [`PaperExecution`] fills on paper.

mod desk;
mod execution;
mod executor;
mod history_executor;
mod paper;
mod signal;
mod state;
mod supervisor;

pub use desk::{OrderDesk, WatchOutcome};
pub use execution::{ExecutionMode, LiveExecution, OrderExecution};
pub use executor::{select_candidate, AlgExecutor, AlgTester, ExecutorHandle, ExecutorSettings};
pub use history_executor::{first_funded, HistoryAlgExecutor, HistoryAlgTester};
pub use paper::PaperExecution;
pub use signal::{HistorySignal, LiveSignal, PositionSignal};
pub use state::{StateTracker, TradeState};
