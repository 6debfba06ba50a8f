//! The parking engine: session lifecycle, assignments, and the ledger.

use crate::{rate, EngineError, EngineResult};
use chrono::{DateTime, NaiveDate, Utc};
use parkd_database::{
    queries, AdminUser, AsyncDatabase, CheckoutReceipt, DatabaseError, LedgerEntry, LotStats,
    NewAdminUser, NewParkingLot, NewSlot, ParkingLot, ParkingSession, Role, Slot, SlotStatus,
    VehicleClass,
};
use std::path::Path;
use tracing::{info, instrument};
use uuid::Uuid;

/// The authenticated subject performing an operation. Identity
/// verification happens at the edge; the engine only sees the verified
/// subject id and role.
#[derive(Debug, Clone)]
pub struct Caller {
    pub subject_id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(subject_id: impl Into<String>, role: Role) -> Self {
        Self {
            subject_id: subject_id.into(),
            role,
        }
    }

    pub fn admin(subject_id: impl Into<String>) -> Self {
        Self::new(subject_id, Role::Admin)
    }

    pub fn super_admin(subject_id: impl Into<String>) -> Self {
        Self::new(subject_id, Role::SuperAdmin)
    }

    fn require_super_admin(&self) -> EngineResult<()> {
        if self.role != Role::SuperAdmin {
            return Err(EngineError::Forbidden(
                "Requires super admin role".to_string(),
            ));
        }
        Ok(())
    }

    /// Admins may only touch their own ledger; super admins may touch any.
    fn require_self_or_super_admin(&self, admin_id: &str) -> EngineResult<()> {
        if self.role != Role::SuperAdmin && self.subject_id != admin_id {
            return Err(EngineError::Forbidden(
                "Cannot access another admin's ledger".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a `YYYY-MM-DD` ledger date from caller input.
pub fn parse_date(s: &str) -> EngineResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| DatabaseError::InvalidInput(format!("Invalid date: {s}, expected YYYY-MM-DD")).into())
}

/// The parking engine.
///
/// Owns the async database handle; every state transition runs as one
/// transaction on the dedicated SQLite thread, so transitions are atomic
/// with respect to each other. Cheap to clone.
#[derive(Clone)]
pub struct ParkingEngine {
    db: AsyncDatabase,
}

impl ParkingEngine {
    /// Open an engine backed by a database file.
    pub async fn open(path: &Path) -> EngineResult<Self> {
        let db = AsyncDatabase::open(path).await?;
        Ok(Self { db })
    }

    /// Open an engine backed by an in-memory database. Used by tests.
    pub async fn in_memory() -> EngineResult<Self> {
        let db = AsyncDatabase::open_in_memory().await?;
        Ok(Self { db })
    }

    pub fn database(&self) -> &AsyncDatabase {
        &self.db
    }

    // ==========================================
    // Seed data
    // ==========================================

    /// Register an admin subject. Super admin only.
    #[instrument(skip(self, caller, admin), fields(subject_id = %admin.subject_id))]
    pub async fn register_admin(
        &self,
        caller: &Caller,
        admin: NewAdminUser,
    ) -> EngineResult<AdminUser> {
        caller.require_super_admin()?;
        let created = self.db.call(move |conn| queries::insert_admin(conn, &admin)).await?;
        info!("Admin registered");
        Ok(created)
    }

    /// Create a parking lot. Super admin only.
    #[instrument(skip(self, caller, lot), fields(lot_id = %lot.id))]
    pub async fn add_lot(&self, caller: &Caller, lot: NewParkingLot) -> EngineResult<ParkingLot> {
        caller.require_super_admin()?;
        let created = self.db.call(move |conn| queries::insert_lot(conn, &lot)).await?;
        info!("Lot created");
        Ok(created)
    }

    /// Create a slot in a lot. Super admin only.
    #[instrument(skip(self, caller, slot), fields(slot_id = %slot.id, lot_id = %slot.lot_id))]
    pub async fn add_slot(&self, caller: &Caller, slot: NewSlot) -> EngineResult<Slot> {
        caller.require_super_admin()?;
        let created = self.db.call(move |conn| queries::insert_slot(conn, &slot)).await?;
        info!("Slot created");
        Ok(created)
    }

    pub async fn list_lots(&self) -> EngineResult<Vec<ParkingLot>> {
        Ok(self.db.call(|conn| queries::list_lots(conn)).await?)
    }

    pub async fn list_slots(&self, lot_id: &str) -> EngineResult<Vec<Slot>> {
        let lot_id = lot_id.to_string();
        Ok(self
            .db
            .call(move |conn| queries::list_slots_for_lot(conn, &lot_id))
            .await?)
    }

    /// Occupancy statistics for a lot.
    pub async fn lot_stats(&self, lot_id: &str) -> EngineResult<LotStats> {
        let lot_id = lot_id.to_string();
        Ok(self.db.call(move |conn| queries::lot_stats(conn, &lot_id)).await?)
    }

    // ==========================================
    // Assignments
    // ==========================================

    /// Assign a lot to an admin. Super admin only.
    ///
    /// A lot carries at most one assignment; assigning an already
    /// assigned lot is a conflict even for the same admin. Unassign
    /// first to replace.
    #[instrument(skip(self, caller))]
    pub async fn assign_lot(
        &self,
        caller: &Caller,
        admin_id: &str,
        lot_id: &str,
    ) -> EngineResult<()> {
        caller.require_super_admin()?;
        let admin_id = admin_id.to_string();
        let lot_id = lot_id.to_string();
        self.db
            .call(move |conn| queries::assign_lot(conn, &admin_id, &lot_id).map(|_| ()))
            .await?;
        Ok(())
    }

    /// Remove an admin-lot assignment. Super admin only.
    #[instrument(skip(self, caller))]
    pub async fn unassign_lot(
        &self,
        caller: &Caller,
        admin_id: &str,
        lot_id: &str,
    ) -> EngineResult<()> {
        caller.require_super_admin()?;
        let admin_id = admin_id.to_string();
        let lot_id = lot_id.to_string();
        self.db
            .call(move |conn| queries::unassign_lot(conn, &admin_id, &lot_id))
            .await?;
        Ok(())
    }

    /// Lot ids currently assigned to an admin.
    pub async fn lots_for_admin(&self, admin_id: &str) -> EngineResult<Vec<String>> {
        let admin_id = admin_id.to_string();
        Ok(self
            .db
            .call(move |conn| queries::lots_for_admin(conn, &admin_id))
            .await?)
    }

    /// Admin ids currently assigned to a lot (at most one).
    pub async fn admins_for_lot(&self, lot_id: &str) -> EngineResult<Vec<String>> {
        let lot_id = lot_id.to_string();
        Ok(self
            .db
            .call(move |conn| queries::admins_for_lot(conn, &lot_id))
            .await?)
    }

    // ==========================================
    // Session lifecycle
    // ==========================================

    /// Check a vehicle in to a slot, opening a session.
    ///
    /// Atomic: slot occupancy and session creation commit together or
    /// not at all. Fails with `NotFound` if the slot does not exist in
    /// the lot, `Conflict` if the slot is occupied or the vehicle
    /// already has an open session anywhere in the system.
    #[instrument(skip(self, _caller))]
    pub async fn check_in(
        &self,
        _caller: &Caller,
        lot_id: &str,
        slot_id: &str,
        vehicle_reg_no: &str,
        vehicle_class: &str,
    ) -> EngineResult<ParkingSession> {
        self.check_in_at(lot_id, slot_id, vehicle_reg_no, vehicle_class, Utc::now())
            .await
    }

    pub(crate) async fn check_in_at(
        &self,
        lot_id: &str,
        slot_id: &str,
        vehicle_reg_no: &str,
        vehicle_class: &str,
        start_time: DateTime<Utc>,
    ) -> EngineResult<ParkingSession> {
        if vehicle_reg_no.trim().is_empty() {
            return Err(DatabaseError::InvalidInput(
                "Vehicle registration number is required".to_string(),
            )
            .into());
        }
        if vehicle_class.trim().is_empty() {
            return Err(
                DatabaseError::InvalidInput("Vehicle class is required".to_string()).into(),
            );
        }

        let ticket_id = Uuid::new_v4().to_string();
        let lot_id = lot_id.to_string();
        let slot_id = slot_id.to_string();
        let vehicle = vehicle_reg_no.to_string();
        let class = vehicle_class.to_string();

        let session = self
            .db
            .call(move |conn| {
                let tx = conn.transaction()?;

                if queries::get_slot_in_lot(&tx, &slot_id, &lot_id)?.is_none() {
                    return Err(DatabaseError::NotFound(format!(
                        "Slot not found: {slot_id} in lot {lot_id}"
                    )));
                }
                if !queries::occupy_slot(&tx, &slot_id, &vehicle, &ticket_id)? {
                    return Err(DatabaseError::Conflict(format!(
                        "Slot occupied: {slot_id}"
                    )));
                }
                queries::insert_session(
                    &tx, &ticket_id, &lot_id, &slot_id, &vehicle, &class, start_time,
                )?;
                let session = queries::get_session(&tx, &ticket_id)?.ok_or_else(|| {
                    DatabaseError::NotFound("Session not found after insert".to_string())
                })?;

                tx.commit()?;
                Ok(session)
            })
            .await?;

        info!(ticket_id = %session.ticket_id, "Vehicle checked in");
        Ok(session)
    }

    /// Check a vehicle out, closing its open session.
    ///
    /// Resolves the lot's sole assigned admin before mutating anything;
    /// zero or multiple assignees is a `Conflict` and leaves the session,
    /// slot, and ledger untouched. On success the session closes with
    /// ceiling-hour billing, the slot frees, and the fee is recorded
    /// against the assigned admin's daily ledger row, all in one
    /// transaction.
    #[instrument(skip(self, _caller))]
    pub async fn check_out(
        &self,
        _caller: &Caller,
        vehicle_reg_no: &str,
    ) -> EngineResult<CheckoutReceipt> {
        self.check_out_at(vehicle_reg_no, Utc::now()).await
    }

    pub(crate) async fn check_out_at(
        &self,
        vehicle_reg_no: &str,
        end_time: DateTime<Utc>,
    ) -> EngineResult<CheckoutReceipt> {
        let vehicle = vehicle_reg_no.to_string();

        let receipt = self
            .db
            .call(move |conn| {
                let tx = conn.transaction()?;

                let session = queries::open_session_for_vehicle(&tx, &vehicle)?.ok_or_else(
                    || DatabaseError::NotFound(format!("No open session for vehicle: {vehicle}")),
                )?;

                // Revenue attribution must be unambiguous before any
                // state changes.
                let admins = queries::admins_for_lot(&tx, &session.lot_id)?;
                let admin_id = match admins.as_slice() {
                    [admin_id] => admin_id.clone(),
                    [] => {
                        return Err(DatabaseError::Conflict(format!(
                            "No admin assigned to lot: {}",
                            session.lot_id
                        )))
                    }
                    _ => {
                        return Err(DatabaseError::Conflict(format!(
                            "Multiple admins assigned to lot: {}",
                            session.lot_id
                        )))
                    }
                };

                let lot = queries::get_lot(&tx, &session.lot_id)?.ok_or_else(|| {
                    DatabaseError::NotFound(format!("Lot not found: {}", session.lot_id))
                })?;

                let billed_hours = rate::billed_hours(session.start_time, end_time);
                let class = VehicleClass::classify(&session.vehicle_class);
                let amount = billed_hours as f64 * rate::rate_for(&lot, class);

                if !queries::close_session(&tx, &session.ticket_id, end_time, billed_hours, amount)? {
                    return Err(DatabaseError::Conflict(format!(
                        "Session already closed: {}",
                        session.ticket_id
                    )));
                }
                queries::free_slot(&tx, &session.slot_id)?;
                queries::record_collection(&tx, &admin_id, end_time.date_naive(), amount)?;

                tx.commit()?;
                Ok(CheckoutReceipt {
                    amount,
                    billed_hours,
                    checkout_time: end_time,
                })
            })
            .await?;

        info!(
            amount = receipt.amount,
            billed_hours = receipt.billed_hours,
            "Vehicle checked out"
        );
        Ok(receipt)
    }

    /// Set a slot's occupancy from the external detection feed.
    ///
    /// This is a raw occupancy signal, not a lifecycle transition: it
    /// never creates or closes sessions.
    pub async fn set_slot_occupancy(
        &self,
        slot_id: &str,
        status: SlotStatus,
        vehicle_reg_no: Option<&str>,
    ) -> EngineResult<Slot> {
        let slot_id = slot_id.to_string();
        let vehicle = vehicle_reg_no.map(str::to_string);
        Ok(self
            .db
            .call(move |conn| {
                queries::set_slot_occupancy(conn, &slot_id, status, vehicle.as_deref())
            })
            .await?)
    }

    // ==========================================
    // Ledger
    // ==========================================

    /// Submit (or resubmit) a daily closure for an admin.
    ///
    /// Admins may close their own ledger; super admins may close any.
    #[instrument(skip(self, caller))]
    pub async fn submit_closure(
        &self,
        caller: &Caller,
        admin_id: &str,
        date: NaiveDate,
        payment_made: f64,
    ) -> EngineResult<LedgerEntry> {
        caller.require_self_or_super_admin(admin_id)?;
        let admin_id = admin_id.to_string();
        let entry = self
            .db
            .call(move |conn| {
                if queries::get_admin(conn, &admin_id)?.is_none() {
                    return Err(DatabaseError::NotFound(format!(
                        "Admin not found: {admin_id}"
                    )));
                }
                queries::submit_closure(conn, &admin_id, date, payment_made)
            })
            .await?;
        info!(closing_balance = entry.closing_balance, "Closure submitted");
        Ok(entry)
    }

    /// List an admin's ledger entries, newest first, optionally bounded
    /// inclusively by either date.
    pub async fn list_ledger(
        &self,
        caller: &Caller,
        admin_id: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> EngineResult<Vec<LedgerEntry>> {
        caller.require_self_or_super_admin(admin_id)?;
        let admin_id = admin_id.to_string();
        Ok(self
            .db
            .call(move |conn| {
                if queries::get_admin(conn, &admin_id)?.is_none() {
                    return Err(DatabaseError::NotFound(format!(
                        "Admin not found: {admin_id}"
                    )));
                }
                queries::list_ledger_entries(conn, &admin_id, start_date, end_date)
            })
            .await?)
    }
}
