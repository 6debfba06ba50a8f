//! Database model types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Caller role, as carried by the verified credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "super_admin" => Self::SuperAdmin,
            _ => Self::Admin,
        }
    }
}

/// A registered admin subject. Identity verification happens outside the
/// core; this table only records which subject ids are valid admins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUser {
    pub subject_id: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// A new admin to be inserted.
#[derive(Debug, Clone)]
pub struct NewAdminUser {
    pub subject_id: String,
    pub name: String,
    pub role: Role,
}

/// A parking lot configuration record, read-only from the core's
/// perspective. Charges are stored in their raw textual form
/// (e.g. "20/hour"); the rate resolver extracts the magnitude.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParkingLot {
    pub id: String,
    pub name: String,
    pub car_charge: String,
    pub two_wheeler_charge: String,
    pub created_at: DateTime<Utc>,
}

/// A new parking lot to be inserted.
#[derive(Debug, Clone)]
pub struct NewParkingLot {
    pub id: String,
    pub name: String,
    pub car_charge: String,
    pub two_wheeler_charge: String,
}

/// Slot occupancy state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    #[default]
    Free,
    Occupied,
}

impl SlotStatus {
    /// Stored as an integer column: 0 free, 1 occupied.
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Free => 0,
            Self::Occupied => 1,
        }
    }

    pub fn from_i64(v: i64) -> Self {
        if v == 0 {
            Self::Free
        } else {
            Self::Occupied
        }
    }
}

/// A parking slot. When occupied it carries the occupying vehicle's
/// registration number and the active session's ticket id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub id: String,
    pub lot_id: String,
    pub name: String,
    pub status: SlotStatus,
    pub vehicle_reg_no: Option<String>,
    pub ticket_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A new slot to be inserted.
#[derive(Debug, Clone)]
pub struct NewSlot {
    pub id: String,
    pub lot_id: String,
    pub name: String,
}

/// Vehicle classification used for rate selection.
///
/// Sessions store the raw class string supplied at check-in;
/// classification happens at check-out time. Anything that does not
/// classify as a four-wheeler bills at the two-wheeler rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    FourWheeler,
    TwoWheeler,
}

impl VehicleClass {
    pub fn classify(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "car" | "four_wheeler" | "four-wheeler" => Self::FourWheeler,
            _ => Self::TwoWheeler,
        }
    }
}

/// A vehicle parking session, keyed by its ticket id.
///
/// Created open (no end time) at check-in; transitions once,
/// irreversibly, to closed at check-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParkingSession {
    pub ticket_id: String,
    pub lot_id: String,
    pub slot_id: String,
    pub vehicle_reg_no: String,
    pub vehicle_class: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub billed_hours: Option<i64>,
    pub amount: Option<f64>,
}

impl ParkingSession {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// The exclusive admin-to-lot financial-responsibility relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotAssignment {
    pub lot_id: String,
    pub admin_id: String,
    pub assigned_at: DateTime<Utc>,
}

/// One admin's daily cash reconciliation row.
///
/// `closing_balance = opening_balance + today_collection - payment_made`.
/// The opening balance is only authoritative once a closure has
/// recomputed it from the chain; until then it is a zero placeholder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub admin_id: String,
    pub date: NaiveDate,
    pub opening_balance: f64,
    pub today_collection: f64,
    pub payment_made: f64,
    pub closing_balance: f64,
}

/// Result of a vehicle check-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub amount: f64,
    pub billed_hours: i64,
    pub checkout_time: DateTime<Utc>,
}

/// Occupancy statistics for one lot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotStats {
    pub lot_id: String,
    pub total_slots: i64,
    pub occupied_slots: i64,
    pub free_slots: i64,
}
