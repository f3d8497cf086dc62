//! Concrete [`Broker`](crate::exchange::Broker) implementations.

pub mod simulated;

pub use simulated::{SimulatedBroker, SimulationParams};
