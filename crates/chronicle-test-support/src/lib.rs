//! Shared test stores and clocks for Chronicle.

mod clock;
mod store;

pub use clock::{FixedClock, SteppingClock};
pub use store::{FailingEventStore, InMemoryEventStore};
