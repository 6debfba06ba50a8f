//! Database migrations.
//!
//! Migrations are run in order and tracked in the `migrations` table.

use crate::DatabaseResult;
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 3;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> DatabaseResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    info!(current_version, target_version = CURRENT_VERSION, "Running migrations");

    if current_version < 1 {
        migrate_v1_lots_and_slots(conn)?;
    }
    if current_version < 2 {
        migrate_v2_sessions(conn)?;
    }
    if current_version < 3 {
        migrate_v3_ledger(conn)?;
    }

    info!("Migrations complete");
    Ok(())
}

fn record_migration(conn: &Connection, version: i32, name: &str) -> DatabaseResult<()> {
    conn.execute(
        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )?;
    debug!(version, name, "Migration applied");
    Ok(())
}

/// V1: admins, lots, slots, assignments.
fn migrate_v1_lots_and_slots(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v1: lots and slots");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS admins (
            subject_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'admin',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS lots (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            car_charge TEXT NOT NULL DEFAULT '',
            two_wheeler_charge TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS slots (
            id TEXT PRIMARY KEY,
            lot_id TEXT NOT NULL,
            name TEXT NOT NULL,
            status INTEGER NOT NULL DEFAULT 0,
            vehicle_reg_no TEXT,
            ticket_id TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (lot_id) REFERENCES lots(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_slots_lot_id ON slots(lot_id);
        CREATE INDEX IF NOT EXISTS idx_slots_lot_status ON slots(lot_id, status);

        -- lot_id is the primary key: a lot can never carry two assignments.
        CREATE TABLE IF NOT EXISTS lot_assignments (
            lot_id TEXT PRIMARY KEY,
            admin_id TEXT NOT NULL,
            assigned_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (lot_id) REFERENCES lots(id) ON DELETE CASCADE,
            FOREIGN KEY (admin_id) REFERENCES admins(subject_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_lot_assignments_admin ON lot_assignments(admin_id);
        ",
    )?;

    record_migration(conn, 1, "lots_and_slots")
}

/// V2: parking sessions.
fn migrate_v2_sessions(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v2: sessions");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sessions (
            ticket_id TEXT PRIMARY KEY,
            lot_id TEXT NOT NULL,
            slot_id TEXT NOT NULL,
            vehicle_reg_no TEXT NOT NULL,
            vehicle_class TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT,
            billed_hours INTEGER,
            amount REAL,
            FOREIGN KEY (lot_id) REFERENCES lots(id),
            FOREIGN KEY (slot_id) REFERENCES slots(id)
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_vehicle ON sessions(vehicle_reg_no);
        CREATE INDEX IF NOT EXISTS idx_sessions_slot ON sessions(slot_id);

        -- At most one open session per vehicle, system-wide.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_open_vehicle
            ON sessions(vehicle_reg_no) WHERE end_time IS NULL;
        ",
    )?;

    record_migration(conn, 2, "sessions")
}

/// V3: admin payment ledger.
fn migrate_v3_ledger(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v3: ledger");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS ledger_entries (
            admin_id TEXT NOT NULL,
            date TEXT NOT NULL,
            opening_balance REAL NOT NULL DEFAULT 0,
            today_collection REAL NOT NULL DEFAULT 0,
            payment_made REAL NOT NULL DEFAULT 0,
            closing_balance REAL NOT NULL DEFAULT 0,
            PRIMARY KEY (admin_id, date),
            FOREIGN KEY (admin_id) REFERENCES admins(subject_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_ledger_admin_date ON ledger_entries(admin_id, date DESC);
        ",
    )?;

    record_migration(conn, 3, "ledger")
}
