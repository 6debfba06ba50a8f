//! Standalone query functions that work with any Connection.
//!
//! Each function takes a `&Connection` as its first parameter, so it can
//! run inside an enclosing transaction (a `rusqlite::Transaction` derefs
//! to `Connection`). Multi-step state transitions that must be atomic on
//! their own (`assign_lot`, `submit_closure`) take `&mut Connection` and
//! open the transaction themselves.

use crate::{
    AdminUser, DatabaseError, DatabaseResult, LedgerEntry, LotAssignment, LotStats, NewAdminUser,
    NewParkingLot, NewSlot, ParkingLot, ParkingSession, Role, Slot, SlotStatus,
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use tracing::debug;

// ==========================================
// Admins
// ==========================================

/// Insert a new admin subject.
pub fn insert_admin(conn: &Connection, admin: &NewAdminUser) -> DatabaseResult<AdminUser> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO admins (subject_id, name, role, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![admin.subject_id, admin.name, admin.role.as_str(), now],
    )?;
    get_admin(conn, &admin.subject_id)?
        .ok_or_else(|| DatabaseError::NotFound("Admin not found after insert".to_string()))
}

/// Get an admin by subject id.
pub fn get_admin(conn: &Connection, subject_id: &str) -> DatabaseResult<Option<AdminUser>> {
    let mut stmt = conn.prepare_cached(
        "SELECT subject_id, name, role, created_at FROM admins WHERE subject_id = ?1",
    )?;

    let result = stmt.query_row(params![subject_id], |row| {
        Ok(AdminUser {
            subject_id: row.get(0)?,
            name: row.get(1)?,
            role: Role::from_str(&row.get::<_, String>(2)?),
            created_at: parse_datetime(row.get::<_, String>(3)?),
        })
    });

    match result {
        Ok(admin) => Ok(Some(admin)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ==========================================
// Lots
// ==========================================

/// Insert a new parking lot configuration record.
pub fn insert_lot(conn: &Connection, lot: &NewParkingLot) -> DatabaseResult<ParkingLot> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO lots (id, name, car_charge, two_wheeler_charge, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![lot.id, lot.name, lot.car_charge, lot.two_wheeler_charge, now],
    )?;
    get_lot(conn, &lot.id)?
        .ok_or_else(|| DatabaseError::NotFound("Lot not found after insert".to_string()))
}

/// Get a lot by id.
pub fn get_lot(conn: &Connection, id: &str) -> DatabaseResult<Option<ParkingLot>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, name, car_charge, two_wheeler_charge, created_at FROM lots WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id], |row| {
        Ok(ParkingLot {
            id: row.get(0)?,
            name: row.get(1)?,
            car_charge: row.get(2)?,
            two_wheeler_charge: row.get(3)?,
            created_at: parse_datetime(row.get::<_, String>(4)?),
        })
    });

    match result {
        Ok(lot) => Ok(Some(lot)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// List all lots ordered by name.
pub fn list_lots(conn: &Connection) -> DatabaseResult<Vec<ParkingLot>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, name, car_charge, two_wheeler_charge, created_at FROM lots ORDER BY name",
    )?;

    let lots = stmt
        .query_map([], |row| {
            Ok(ParkingLot {
                id: row.get(0)?,
                name: row.get(1)?,
                car_charge: row.get(2)?,
                two_wheeler_charge: row.get(3)?,
                created_at: parse_datetime(row.get::<_, String>(4)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(lots)
}

// ==========================================
// Slots
// ==========================================

/// Insert a new slot. Fails with `NotFound` if the lot does not exist.
pub fn insert_slot(conn: &Connection, slot: &NewSlot) -> DatabaseResult<Slot> {
    if get_lot(conn, &slot.lot_id)?.is_none() {
        return Err(DatabaseError::NotFound(format!(
            "Lot not found: {}",
            slot.lot_id
        )));
    }
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO slots (id, lot_id, name, status, created_at) VALUES (?1, ?2, ?3, 0, ?4)",
        params![slot.id, slot.lot_id, slot.name, now],
    )?;
    get_slot(conn, &slot.id)?
        .ok_or_else(|| DatabaseError::NotFound("Slot not found after insert".to_string()))
}

/// Get a slot by id.
pub fn get_slot(conn: &Connection, id: &str) -> DatabaseResult<Option<Slot>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, lot_id, name, status, vehicle_reg_no, ticket_id, created_at
         FROM slots WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id], map_slot_row);

    match result {
        Ok(slot) => Ok(Some(slot)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Get a slot by id, scoped to a lot.
pub fn get_slot_in_lot(
    conn: &Connection,
    slot_id: &str,
    lot_id: &str,
) -> DatabaseResult<Option<Slot>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, lot_id, name, status, vehicle_reg_no, ticket_id, created_at
         FROM slots WHERE id = ?1 AND lot_id = ?2",
    )?;

    let result = stmt.query_row(params![slot_id, lot_id], map_slot_row);

    match result {
        Ok(slot) => Ok(Some(slot)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// List slots for a lot ordered by name.
pub fn list_slots_for_lot(conn: &Connection, lot_id: &str) -> DatabaseResult<Vec<Slot>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, lot_id, name, status, vehicle_reg_no, ticket_id, created_at
         FROM slots WHERE lot_id = ?1 ORDER BY name",
    )?;

    let slots = stmt
        .query_map(params![lot_id], map_slot_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(slots)
}

/// Occupancy statistics for a lot.
pub fn lot_stats(conn: &Connection, lot_id: &str) -> DatabaseResult<LotStats> {
    if get_lot(conn, lot_id)?.is_none() {
        return Err(DatabaseError::NotFound(format!("Lot not found: {lot_id}")));
    }
    let (total, occupied): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(status), 0) FROM slots WHERE lot_id = ?1",
        params![lot_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(LotStats {
        lot_id: lot_id.to_string(),
        total_slots: total,
        occupied_slots: occupied,
        free_slots: total - occupied,
    })
}

/// Conditionally mark a slot occupied and tag it with the occupying
/// vehicle and ticket. Returns false if the slot was not free - the
/// check and the mark are a single atomic statement, so two concurrent
/// check-ins can never both observe "free".
pub fn occupy_slot(
    conn: &Connection,
    slot_id: &str,
    vehicle_reg_no: &str,
    ticket_id: &str,
) -> DatabaseResult<bool> {
    let affected = conn.execute(
        "UPDATE slots SET status = 1, vehicle_reg_no = ?2, ticket_id = ?3
         WHERE id = ?1 AND status = 0",
        params![slot_id, vehicle_reg_no, ticket_id],
    )?;
    Ok(affected > 0)
}

/// Mark a slot free and clear its occupant tag.
pub fn free_slot(conn: &Connection, slot_id: &str) -> DatabaseResult<bool> {
    let affected = conn.execute(
        "UPDATE slots SET status = 0, vehicle_reg_no = NULL, ticket_id = NULL WHERE id = ?1",
        params![slot_id],
    )?;
    Ok(affected > 0)
}

/// Set a slot's occupancy directly. This is the primitive the external
/// occupancy-detection feed drives; it does not create or close
/// sessions. Fails with `NotFound` if the slot does not exist.
pub fn set_slot_occupancy(
    conn: &Connection,
    slot_id: &str,
    status: SlotStatus,
    vehicle_reg_no: Option<&str>,
) -> DatabaseResult<Slot> {
    let affected = match status {
        SlotStatus::Occupied => conn.execute(
            "UPDATE slots SET status = 1, vehicle_reg_no = ?2 WHERE id = ?1",
            params![slot_id, vehicle_reg_no],
        )?,
        SlotStatus::Free => conn.execute(
            "UPDATE slots SET status = 0, vehicle_reg_no = NULL, ticket_id = NULL WHERE id = ?1",
            params![slot_id],
        )?,
    };
    if affected == 0 {
        return Err(DatabaseError::NotFound(format!(
            "Slot not found: {slot_id}"
        )));
    }
    get_slot(conn, slot_id)?
        .ok_or_else(|| DatabaseError::NotFound(format!("Slot not found: {slot_id}")))
}

fn map_slot_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Slot> {
    Ok(Slot {
        id: row.get(0)?,
        lot_id: row.get(1)?,
        name: row.get(2)?,
        status: SlotStatus::from_i64(row.get(3)?),
        vehicle_reg_no: row.get(4)?,
        ticket_id: row.get(5)?,
        created_at: parse_datetime(row.get::<_, String>(6)?),
    })
}

// ==========================================
// Sessions
// ==========================================

/// Insert a new open session.
pub fn insert_session(
    conn: &Connection,
    ticket_id: &str,
    lot_id: &str,
    slot_id: &str,
    vehicle_reg_no: &str,
    vehicle_class: &str,
    start_time: DateTime<Utc>,
) -> DatabaseResult<()> {
    let result = conn.execute(
        "INSERT INTO sessions (ticket_id, lot_id, slot_id, vehicle_reg_no, vehicle_class, start_time)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            ticket_id,
            lot_id,
            slot_id,
            vehicle_reg_no,
            vehicle_class,
            start_time.to_rfc3339(),
        ],
    );
    match result {
        Ok(_) => Ok(()),
        // The partial unique index on open sessions backs the "at most
        // one open session per vehicle" invariant at the storage level.
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(DatabaseError::Conflict(format!(
                "Vehicle already checked in: {vehicle_reg_no}"
            )))
        }
        Err(e) => Err(e.into()),
    }
}

/// Get a session by ticket id.
pub fn get_session(conn: &Connection, ticket_id: &str) -> DatabaseResult<Option<ParkingSession>> {
    let mut stmt = conn.prepare_cached(
        "SELECT ticket_id, lot_id, slot_id, vehicle_reg_no, vehicle_class,
                start_time, end_time, billed_hours, amount
         FROM sessions WHERE ticket_id = ?1",
    )?;

    let result = stmt.query_row(params![ticket_id], map_session_row);

    match result {
        Ok(session) => Ok(Some(session)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Get the open session for a vehicle, if any.
pub fn open_session_for_vehicle(
    conn: &Connection,
    vehicle_reg_no: &str,
) -> DatabaseResult<Option<ParkingSession>> {
    let mut stmt = conn.prepare_cached(
        "SELECT ticket_id, lot_id, slot_id, vehicle_reg_no, vehicle_class,
                start_time, end_time, billed_hours, amount
         FROM sessions WHERE vehicle_reg_no = ?1 AND end_time IS NULL",
    )?;

    let result = stmt.query_row(params![vehicle_reg_no], map_session_row);

    match result {
        Ok(session) => Ok(Some(session)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Close an open session, recording end time, billed hours, and amount.
/// The `end_time IS NULL` guard makes the transition irreversible:
/// a session closes exactly once.
pub fn close_session(
    conn: &Connection,
    ticket_id: &str,
    end_time: DateTime<Utc>,
    billed_hours: i64,
    amount: f64,
) -> DatabaseResult<bool> {
    let affected = conn.execute(
        "UPDATE sessions SET end_time = ?2, billed_hours = ?3, amount = ?4
         WHERE ticket_id = ?1 AND end_time IS NULL",
        params![ticket_id, end_time.to_rfc3339(), billed_hours, amount],
    )?;
    Ok(affected > 0)
}

fn map_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ParkingSession> {
    Ok(ParkingSession {
        ticket_id: row.get(0)?,
        lot_id: row.get(1)?,
        slot_id: row.get(2)?,
        vehicle_reg_no: row.get(3)?,
        vehicle_class: row.get(4)?,
        start_time: parse_datetime(row.get::<_, String>(5)?),
        end_time: row.get::<_, Option<String>>(6)?.map(parse_datetime),
        billed_hours: row.get(7)?,
        amount: row.get(8)?,
    })
}

// ==========================================
// Assignments
// ==========================================

/// Assign a lot to an admin.
///
/// Fails with `NotFound` if the admin is not a registered admin-role
/// subject or the lot does not exist; fails with `Conflict` if the lot
/// already carries an assignment, even to the same admin. The existence
/// check and the insert commit atomically.
pub fn assign_lot(conn: &mut Connection, admin_id: &str, lot_id: &str) -> DatabaseResult<LotAssignment> {
    let tx = conn.transaction()?;

    if get_admin(&tx, admin_id)?.is_none() {
        return Err(DatabaseError::NotFound(format!(
            "Admin not found: {admin_id}"
        )));
    }
    if get_lot(&tx, lot_id)?.is_none() {
        return Err(DatabaseError::NotFound(format!("Lot not found: {lot_id}")));
    }

    let now = Utc::now().to_rfc3339();
    let result = tx.execute(
        "INSERT INTO lot_assignments (lot_id, admin_id, assigned_at) VALUES (?1, ?2, ?3)",
        params![lot_id, admin_id, now],
    );
    match result {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return Err(DatabaseError::Conflict(format!(
                "Lot already assigned: {lot_id}"
            )));
        }
        Err(e) => return Err(e.into()),
    }

    let assignment = get_assignment(&tx, lot_id)?
        .ok_or_else(|| DatabaseError::NotFound("Assignment not found after insert".to_string()))?;
    tx.commit()?;
    debug!(lot_id, admin_id, "Lot assigned");
    Ok(assignment)
}

/// Remove an assignment. Fails with `NotFound` if no such relation exists.
pub fn unassign_lot(conn: &Connection, admin_id: &str, lot_id: &str) -> DatabaseResult<()> {
    let affected = conn.execute(
        "DELETE FROM lot_assignments WHERE lot_id = ?1 AND admin_id = ?2",
        params![lot_id, admin_id],
    )?;
    if affected == 0 {
        return Err(DatabaseError::NotFound(format!(
            "Assignment not found: lot {lot_id}, admin {admin_id}"
        )));
    }
    debug!(lot_id, admin_id, "Lot unassigned");
    Ok(())
}

/// Get the assignment for a lot, if any.
pub fn get_assignment(conn: &Connection, lot_id: &str) -> DatabaseResult<Option<LotAssignment>> {
    let mut stmt = conn.prepare_cached(
        "SELECT lot_id, admin_id, assigned_at FROM lot_assignments WHERE lot_id = ?1",
    )?;

    let result = stmt.query_row(params![lot_id], |row| {
        Ok(LotAssignment {
            lot_id: row.get(0)?,
            admin_id: row.get(1)?,
            assigned_at: parse_datetime(row.get::<_, String>(2)?),
        })
    });

    match result {
        Ok(a) => Ok(Some(a)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Admin ids assigned to a lot. The schema caps this at one row, but
/// the check-out path still counts defensively.
pub fn admins_for_lot(conn: &Connection, lot_id: &str) -> DatabaseResult<Vec<String>> {
    let mut stmt =
        conn.prepare_cached("SELECT admin_id FROM lot_assignments WHERE lot_id = ?1")?;
    let admins = stmt
        .query_map(params![lot_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(admins)
}

/// Lot ids assigned to an admin.
pub fn lots_for_admin(conn: &Connection, admin_id: &str) -> DatabaseResult<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT lot_id FROM lot_assignments WHERE admin_id = ?1 ORDER BY lot_id",
    )?;
    let lots = stmt
        .query_map(params![admin_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lots)
}

// ==========================================
// Ledger
// ==========================================

/// Record a collection against an admin's daily ledger row.
///
/// Upserts the (admin, date) row: on first collection of the day the row
/// is created with a zero placeholder opening balance (corrected at
/// closure time); otherwise `today_collection` is incremented in place
/// and the closing balance recomputed from the row's stored opening
/// balance. A single statement, so concurrent check-outs attributing
/// revenue to the same admin and date serialize safely.
pub fn record_collection(
    conn: &Connection,
    admin_id: &str,
    date: NaiveDate,
    amount: f64,
) -> DatabaseResult<()> {
    conn.execute(
        "INSERT INTO ledger_entries
             (admin_id, date, opening_balance, today_collection, payment_made, closing_balance)
         VALUES (?1, ?2, 0, ?3, 0, ?3)
         ON CONFLICT(admin_id, date) DO UPDATE SET
             today_collection = today_collection + excluded.today_collection,
             closing_balance = opening_balance + today_collection
                 + excluded.today_collection - payment_made",
        params![admin_id, format_date(date), amount],
    )?;
    debug!(admin_id, %date, amount, "Collection recorded");
    Ok(())
}

/// Submit (or resubmit) a daily closure for an admin.
///
/// Recomputes from scratch inside one transaction: today's collection so
/// far (zero if no check-out has happened yet), the opening balance from
/// the most recent strictly-earlier entry's closing balance (zero if
/// none), and the resulting closing balance. Re-enterable - a second
/// closure for the same date overwrites payment and balances.
///
/// The chain is read at call time only: closing an earlier date after a
/// later date was already closed does not rewrite the later entry.
pub fn submit_closure(
    conn: &mut Connection,
    admin_id: &str,
    date: NaiveDate,
    payment_made: f64,
) -> DatabaseResult<LedgerEntry> {
    let tx = conn.transaction()?;
    let date_str = format_date(date);

    let today_collection: f64 = tx
        .query_row(
            "SELECT today_collection FROM ledger_entries WHERE admin_id = ?1 AND date = ?2",
            params![admin_id, date_str],
            |row| row.get(0),
        )
        .or_else(no_rows_as_zero)?;

    let opening_balance: f64 = tx
        .query_row(
            "SELECT closing_balance FROM ledger_entries
             WHERE admin_id = ?1 AND date < ?2
             ORDER BY date DESC LIMIT 1",
            params![admin_id, date_str],
            |row| row.get(0),
        )
        .or_else(no_rows_as_zero)?;

    let closing_balance = opening_balance + today_collection - payment_made;

    tx.execute(
        "INSERT INTO ledger_entries
             (admin_id, date, opening_balance, today_collection, payment_made, closing_balance)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(admin_id, date) DO UPDATE SET
             opening_balance = excluded.opening_balance,
             payment_made = excluded.payment_made,
             closing_balance = excluded.closing_balance",
        params![
            admin_id,
            date_str,
            opening_balance,
            today_collection,
            payment_made,
            closing_balance,
        ],
    )?;
    tx.commit()?;

    debug!(admin_id, %date, closing_balance, "Closure submitted");
    Ok(LedgerEntry {
        admin_id: admin_id.to_string(),
        date,
        opening_balance,
        today_collection,
        payment_made,
        closing_balance,
    })
}

/// Get the ledger entry for an admin and date, if any.
pub fn get_ledger_entry(
    conn: &Connection,
    admin_id: &str,
    date: NaiveDate,
) -> DatabaseResult<Option<LedgerEntry>> {
    let mut stmt = conn.prepare_cached(
        "SELECT admin_id, date, opening_balance, today_collection, payment_made, closing_balance
         FROM ledger_entries WHERE admin_id = ?1 AND date = ?2",
    )?;

    let result = stmt.query_row(params![admin_id, format_date(date)], map_ledger_row);

    match result {
        Ok(entry) => Ok(Some(entry)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// List ledger entries for an admin, optionally bounded inclusively by
/// either endpoint, newest date first.
pub fn list_ledger_entries(
    conn: &Connection,
    admin_id: &str,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> DatabaseResult<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare_cached(
        "SELECT admin_id, date, opening_balance, today_collection, payment_made, closing_balance
         FROM ledger_entries
         WHERE admin_id = ?1
           AND (?2 IS NULL OR date >= ?2)
           AND (?3 IS NULL OR date <= ?3)
         ORDER BY date DESC",
    )?;

    let entries = stmt
        .query_map(
            params![
                admin_id,
                start_date.map(format_date),
                end_date.map(format_date),
            ],
            map_ledger_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

fn map_ledger_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerEntry> {
    Ok(LedgerEntry {
        admin_id: row.get(0)?,
        date: parse_date(row.get::<_, String>(1)?),
        opening_balance: row.get(2)?,
        today_collection: row.get(3)?,
        payment_made: row.get(4)?,
        closing_balance: row.get(5)?,
    })
}

fn no_rows_as_zero(e: rusqlite::Error) -> rusqlite::Result<f64> {
    match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(0.0),
        other => Err(other),
    }
}

// ==========================================
// Helpers
// ==========================================

/// Parse an RFC 3339 datetime string, falling back to current time on error.
fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Ledger dates are stored as ISO `YYYY-MM-DD` text, which sorts
/// chronologically under SQLite's lexicographic comparison.
fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(s: String) -> NaiveDate {
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").unwrap_or_else(|_| Utc::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn seed_lot_and_slot(conn: &Connection) {
        insert_lot(
            conn,
            &NewParkingLot {
                id: "lot-1".to_string(),
                name: "Central".to_string(),
                car_charge: "20/hour".to_string(),
                two_wheeler_charge: "10/hour".to_string(),
            },
        )
        .unwrap();
        insert_slot(
            conn,
            &NewSlot {
                id: "slot-1".to_string(),
                lot_id: "lot-1".to_string(),
                name: "A1".to_string(),
            },
        )
        .unwrap();
    }

    #[test]
    fn slot_insert_requires_existing_lot() {
        let conn = test_conn();
        let err = insert_slot(
            &conn,
            &NewSlot {
                id: "slot-1".to_string(),
                lot_id: "missing".to_string(),
                name: "A1".to_string(),
            },
        )
        .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn occupy_slot_is_conditional() {
        let conn = test_conn();
        seed_lot_and_slot(&conn);

        assert!(occupy_slot(&conn, "slot-1", "KA01AB1234", "t-1").unwrap());
        // Second occupy observes occupied and refuses.
        assert!(!occupy_slot(&conn, "slot-1", "KA02CD5678", "t-2").unwrap());

        let slot = get_slot(&conn, "slot-1").unwrap().unwrap();
        assert_eq!(slot.status, SlotStatus::Occupied);
        assert_eq!(slot.vehicle_reg_no.as_deref(), Some("KA01AB1234"));
        assert_eq!(slot.ticket_id.as_deref(), Some("t-1"));

        assert!(free_slot(&conn, "slot-1").unwrap());
        let slot = get_slot(&conn, "slot-1").unwrap().unwrap();
        assert_eq!(slot.status, SlotStatus::Free);
        assert!(slot.vehicle_reg_no.is_none());
        assert!(slot.ticket_id.is_none());
    }

    #[test]
    fn duplicate_open_session_is_conflict() {
        let conn = test_conn();
        seed_lot_and_slot(&conn);
        insert_slot(
            &conn,
            &NewSlot {
                id: "slot-2".to_string(),
                lot_id: "lot-1".to_string(),
                name: "A2".to_string(),
            },
        )
        .unwrap();

        let now = Utc::now();
        insert_session(&conn, "t-1", "lot-1", "slot-1", "KA01AB1234", "car", now).unwrap();
        let err = insert_session(&conn, "t-2", "lot-1", "slot-2", "KA01AB1234", "car", now)
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn close_session_exactly_once() {
        let conn = test_conn();
        seed_lot_and_slot(&conn);

        let start = Utc::now();
        insert_session(&conn, "t-1", "lot-1", "slot-1", "KA01AB1234", "car", start).unwrap();

        assert!(close_session(&conn, "t-1", Utc::now(), 2, 40.0).unwrap());
        // Already closed: the conditional update refuses a second close.
        assert!(!close_session(&conn, "t-1", Utc::now(), 5, 100.0).unwrap());

        let session = get_session(&conn, "t-1").unwrap().unwrap();
        assert_eq!(session.billed_hours, Some(2));
        assert_eq!(session.amount, Some(40.0));
        assert!(!session.is_open());
    }

    #[test]
    fn assignment_uniqueness_per_lot() {
        let mut conn = test_conn();
        seed_lot_and_slot(&conn);
        insert_admin(
            &conn,
            &NewAdminUser {
                subject_id: "admin-1".to_string(),
                name: "Asha".to_string(),
                role: Role::Admin,
            },
        )
        .unwrap();
        insert_admin(
            &conn,
            &NewAdminUser {
                subject_id: "admin-2".to_string(),
                name: "Ravi".to_string(),
                role: Role::Admin,
            },
        )
        .unwrap();

        assign_lot(&mut conn, "admin-1", "lot-1").unwrap();

        // Re-assigning, even to the same admin, is a conflict.
        assert!(assign_lot(&mut conn, "admin-1", "lot-1").unwrap_err().is_conflict());
        assert!(assign_lot(&mut conn, "admin-2", "lot-1").unwrap_err().is_conflict());

        assert_eq!(admins_for_lot(&conn, "lot-1").unwrap(), vec!["admin-1"]);
        assert_eq!(lots_for_admin(&conn, "admin-1").unwrap(), vec!["lot-1"]);

        unassign_lot(&conn, "admin-1", "lot-1").unwrap();
        assert!(admins_for_lot(&conn, "lot-1").unwrap().is_empty());
        assert!(unassign_lot(&conn, "admin-1", "lot-1").unwrap_err().is_not_found());
    }

    #[test]
    fn assign_validates_admin_and_lot() {
        let mut conn = test_conn();
        seed_lot_and_slot(&conn);

        assert!(assign_lot(&mut conn, "ghost", "lot-1").unwrap_err().is_not_found());

        insert_admin(
            &conn,
            &NewAdminUser {
                subject_id: "admin-1".to_string(),
                name: "Asha".to_string(),
                role: Role::Admin,
            },
        )
        .unwrap();
        assert!(assign_lot(&mut conn, "admin-1", "ghost-lot").unwrap_err().is_not_found());
    }

    #[test]
    fn record_collection_accumulates() {
        let conn = test_conn();
        insert_admin(
            &conn,
            &NewAdminUser {
                subject_id: "admin-1".to_string(),
                name: "Asha".to_string(),
                role: Role::Admin,
            },
        )
        .unwrap();

        let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        record_collection(&conn, "admin-1", day, 60.0).unwrap();
        record_collection(&conn, "admin-1", day, 15.5).unwrap();

        let entry = get_ledger_entry(&conn, "admin-1", day).unwrap().unwrap();
        assert_eq!(entry.opening_balance, 0.0);
        assert_eq!(entry.today_collection, 75.5);
        assert_eq!(entry.payment_made, 0.0);
        assert_eq!(entry.closing_balance, 75.5);
    }

    #[test]
    fn closure_chains_and_resubmits() {
        let mut conn = test_conn();
        insert_admin(
            &conn,
            &NewAdminUser {
                subject_id: "admin-1".to_string(),
                name: "Asha".to_string(),
                role: Role::Admin,
            },
        )
        .unwrap();

        let day1 = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2025, 3, 11).unwrap();

        record_collection(&conn, "admin-1", day1, 60.0).unwrap();
        let entry = submit_closure(&mut conn, "admin-1", day1, 10.0).unwrap();
        assert_eq!(entry.opening_balance, 0.0);
        assert_eq!(entry.today_collection, 60.0);
        assert_eq!(entry.closing_balance, 50.0);

        // Resubmission recomputes from scratch.
        let entry = submit_closure(&mut conn, "admin-1", day1, 25.0).unwrap();
        assert_eq!(entry.payment_made, 25.0);
        assert_eq!(entry.closing_balance, 35.0);

        // Day 2 opens with day 1's closing balance.
        record_collection(&conn, "admin-1", day2, 20.0).unwrap();
        let entry = submit_closure(&mut conn, "admin-1", day2, 0.0).unwrap();
        assert_eq!(entry.opening_balance, 35.0);
        assert_eq!(entry.closing_balance, 55.0);
    }

    #[test]
    fn closure_without_collections_creates_row() {
        let mut conn = test_conn();
        insert_admin(
            &conn,
            &NewAdminUser {
                subject_id: "admin-1".to_string(),
                name: "Asha".to_string(),
                role: Role::Admin,
            },
        )
        .unwrap();

        let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let entry = submit_closure(&mut conn, "admin-1", day, 0.0).unwrap();
        assert_eq!(entry.today_collection, 0.0);
        assert_eq!(entry.closing_balance, 0.0);
        assert!(get_ledger_entry(&conn, "admin-1", day).unwrap().is_some());
    }

    #[test]
    fn ledger_listing_is_date_descending_and_bounded() {
        let conn = test_conn();
        insert_admin(
            &conn,
            &NewAdminUser {
                subject_id: "admin-1".to_string(),
                name: "Asha".to_string(),
                role: Role::Admin,
            },
        )
        .unwrap();

        for day in 10..=14 {
            let date = NaiveDate::from_ymd_opt(2025, 3, day).unwrap();
            record_collection(&conn, "admin-1", date, day as f64).unwrap();
        }

        let all = list_ledger_entries(&conn, "admin-1", None, None).unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].date, NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
        assert_eq!(all[4].date, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());

        let bounded = list_ledger_entries(
            &conn,
            "admin-1",
            Some(NaiveDate::from_ymd_opt(2025, 3, 11).unwrap()),
            Some(NaiveDate::from_ymd_opt(2025, 3, 13).unwrap()),
        )
        .unwrap();
        assert_eq!(bounded.len(), 3);
        assert_eq!(bounded[0].date, NaiveDate::from_ymd_opt(2025, 3, 13).unwrap());
    }

    #[test]
    fn lot_stats_counts_occupancy() {
        let conn = test_conn();
        seed_lot_and_slot(&conn);
        insert_slot(
            &conn,
            &NewSlot {
                id: "slot-2".to_string(),
                lot_id: "lot-1".to_string(),
                name: "A2".to_string(),
            },
        )
        .unwrap();

        occupy_slot(&conn, "slot-1", "KA01AB1234", "t-1").unwrap();

        let stats = lot_stats(&conn, "lot-1").unwrap();
        assert_eq!(stats.total_slots, 2);
        assert_eq!(stats.occupied_slots, 1);
        assert_eq!(stats.free_slots, 1);

        assert!(lot_stats(&conn, "ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn occupancy_feed_primitive() {
        let conn = test_conn();
        seed_lot_and_slot(&conn);

        let slot =
            set_slot_occupancy(&conn, "slot-1", SlotStatus::Occupied, Some("KA01AB1234")).unwrap();
        assert_eq!(slot.status, SlotStatus::Occupied);
        assert_eq!(slot.vehicle_reg_no.as_deref(), Some("KA01AB1234"));

        let slot = set_slot_occupancy(&conn, "slot-1", SlotStatus::Free, None).unwrap();
        assert_eq!(slot.status, SlotStatus::Free);
        assert!(slot.vehicle_reg_no.is_none());

        assert!(set_slot_occupancy(&conn, "ghost", SlotStatus::Free, None)
            .unwrap_err()
            .is_not_found());
    }
}
