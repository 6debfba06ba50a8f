//! Session lifecycle and daily cash ledger engine for parkd.
//!
//! The engine tracks vehicles through a strict check-in/check-out state
//! machine over a fixed inventory of lots and slots, bills stays by
//! ceiling hours at per-lot, per-class rates, and reconciles each
//! admin's daily cash position through a balance-carry-forward ledger.
//!
//! ```ignore
//! let engine = ParkingEngine::open(path).await?;
//! let session = engine.check_in(&caller, "lot-1", "slot-1", "KA01AB1234", "car").await?;
//! let receipt = engine.check_out(&caller, "KA01AB1234").await?;
//! ```

mod engine;
mod error;
mod rate;

#[cfg(test)]
mod tests;

pub use engine::{parse_date, Caller, ParkingEngine};
pub use error::{EngineError, EngineResult};
pub use rate::{billed_hours, hourly_rate, rate_for};

// Re-export the model types callers interact with.
pub use parkd_database::{
    AdminUser, CheckoutReceipt, DatabaseError, LedgerEntry, LotAssignment, LotStats, NewAdminUser,
    NewParkingLot, NewSlot, ParkingLot, ParkingSession, Role, Slot, SlotStatus, VehicleClass,
};
