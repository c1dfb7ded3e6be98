//! Charge-state random walk: MFP table, history events and the generator.

pub mod event;
pub mod generator;
pub mod mfp;

pub use event::{Event, EventKind, Histories, History};
pub use generator::{ChargeHistoryGenerator, GeneratorConfig, InitialCharge};
pub use mfp::{Direction, MfpTable, Transition};
