//! Shared fixtures for engine integration tests: a small ledger aggregate.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use chronicle_core::aggregate::AggregateRoot;
use chronicle_core::error::DomainError;
use chronicle_core::event::{Event, EventRegistry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(skip)]
    pub id: Option<i64>,
    pub owner: String,
    pub balance: i64,
    pub closed: bool,
}

impl AggregateRoot for Ledger {
    const AGGREGATE_TYPE: &'static str = "ledger";
    const TABLE: &'static str = "ledgers";
    const EVENTS_TABLE: &'static str = "ledger_events";
    const FOREIGN_KEY: &'static str = "ledger_id";

    fn aggregate_id(&self) -> Option<i64> {
        self.id
    }

    fn assign_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn is_destroyed(&self) -> bool {
        self.closed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opened {
    pub owner: String,
}

impl Event for Opened {
    type Aggregate = Ledger;
    const EVENT_TYPE: &'static str = "Opened";
    const ATTRIBUTES: &'static [&'static str] = &["owner"];

    fn apply(&self, mut ledger: Ledger) -> Result<Ledger, DomainError> {
        ledger.owner.clone_from(&self.owner);
        Ok(ledger)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposited {
    pub amount: i64,
}

impl Event for Deposited {
    type Aggregate = Ledger;
    const EVENT_TYPE: &'static str = "Deposited";
    const ATTRIBUTES: &'static [&'static str] = &["amount"];

    fn apply(&self, mut ledger: Ledger) -> Result<Ledger, DomainError> {
        ledger.balance += self.amount;
        Ok(ledger)
    }

    fn is_noop(&self, _ledger: &Ledger) -> bool {
        self.amount == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Closed {}

impl Event for Closed {
    type Aggregate = Ledger;
    const EVENT_TYPE: &'static str = "Closed";
    const ATTRIBUTES: &'static [&'static str] = &[];

    fn apply(&self, mut ledger: Ledger) -> Result<Ledger, DomainError> {
        ledger.closed = true;
        Ok(ledger)
    }

    fn is_noop(&self, ledger: &Ledger) -> bool {
        ledger.closed
    }
}

/// Registered, but never taught how to apply itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Audited {}

impl Event for Audited {
    type Aggregate = Ledger;
    const EVENT_TYPE: &'static str = "Audited";
    const ATTRIBUTES: &'static [&'static str] = &[];
}

pub fn registry() -> EventRegistry<Ledger> {
    EventRegistry::new()
        .register::<Opened>()
        .register::<Deposited>()
        .register::<Closed>()
        .register::<Audited>()
}

pub fn start_of_day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}
