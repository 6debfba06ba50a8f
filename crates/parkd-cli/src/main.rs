//! parkd command-line interface.
//!
//! Drives the parking engine against a local SQLite database. The
//! caller identity is taken from `--subject`/`--role`; in a deployed
//! system these come from a verified credential at the edge.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use parkd_engine::{
    parse_date, Caller, NewAdminUser, NewParkingLot, NewSlot, ParkingEngine, Role, SlotStatus,
};
use tracing_subscriber::EnvFilter;

/// parkd command-line interface.
#[derive(Parser)]
#[command(name = "parkd")]
#[command(about = "Parking session lifecycle and daily cash ledger")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the SQLite database. Defaults to ~/.parkd/parkd.db
    #[arg(long, env = "PARKD_DB", global = true)]
    db: Option<PathBuf>,

    /// Acting subject id
    #[arg(long, default_value = "root", global = true)]
    subject: String,

    /// Acting role (admin, super_admin)
    #[arg(long, default_value = "super_admin", global = true)]
    role: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Register an admin subject
    AddAdmin {
        id: String,
        name: String,
        /// Role for the new admin (admin, super_admin)
        #[arg(long, default_value = "admin")]
        admin_role: String,
    },
    /// Create a parking lot
    AddLot {
        id: String,
        name: String,
        /// Hourly car charge, e.g. "20/hour"
        #[arg(long, default_value = "")]
        car_charge: String,
        /// Hourly two-wheeler charge, e.g. "10/hour"
        #[arg(long, default_value = "")]
        two_wheeler_charge: String,
    },
    /// Create a slot in a lot
    AddSlot {
        id: String,
        lot_id: String,
        name: String,
    },
    /// List lots
    Lots,
    /// List slots in a lot
    Slots { lot_id: String },
    /// Occupancy statistics for a lot
    LotStats { lot_id: String },
    /// Assign a lot to an admin
    Assign { admin_id: String, lot_id: String },
    /// Remove an admin-lot assignment
    Unassign { admin_id: String, lot_id: String },
    /// Check a vehicle in to a slot
    CheckIn {
        lot_id: String,
        slot_id: String,
        vehicle_reg_no: String,
        /// Vehicle class, e.g. "car" or "bike"
        vehicle_class: String,
    },
    /// Check a vehicle out
    CheckOut { vehicle_reg_no: String },
    /// Set a slot's occupancy from an external detection feed
    SetOccupancy {
        slot_id: String,
        /// "occupied" or "free"
        status: String,
        #[arg(long)]
        vehicle_reg_no: Option<String>,
    },
    /// Submit a daily closure for an admin
    Closure {
        admin_id: String,
        /// Ledger date, YYYY-MM-DD
        date: String,
        /// Cash handed over
        payment: f64,
    },
    /// List an admin's ledger entries, newest first
    Ledger {
        admin_id: String,
        /// Inclusive start date, YYYY-MM-DD
        #[arg(long)]
        start: Option<String>,
        /// Inclusive end date, YYYY-MM-DD
        #[arg(long)]
        end: Option<String>,
    },
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn default_db_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".parkd").join("parkd.db"))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let db_path = match &cli.db {
        Some(path) => path.clone(),
        None => default_db_path()?,
    };
    let engine = ParkingEngine::open(&db_path).await?;
    let caller = Caller::new(cli.subject.clone(), Role::from_str(&cli.role));

    match cli.command {
        Commands::AddAdmin {
            id,
            name,
            admin_role,
        } => {
            let admin = engine
                .register_admin(
                    &caller,
                    NewAdminUser {
                        subject_id: id,
                        name,
                        role: Role::from_str(&admin_role),
                    },
                )
                .await?;
            print_json(&admin)?;
        }
        Commands::AddLot {
            id,
            name,
            car_charge,
            two_wheeler_charge,
        } => {
            let lot = engine
                .add_lot(
                    &caller,
                    NewParkingLot {
                        id,
                        name,
                        car_charge,
                        two_wheeler_charge,
                    },
                )
                .await?;
            print_json(&lot)?;
        }
        Commands::AddSlot { id, lot_id, name } => {
            let slot = engine
                .add_slot(&caller, NewSlot { id, lot_id, name })
                .await?;
            print_json(&slot)?;
        }
        Commands::Lots => {
            let lots = engine.list_lots().await?;
            print_json(&lots)?;
        }
        Commands::Slots { lot_id } => {
            let slots = engine.list_slots(&lot_id).await?;
            print_json(&slots)?;
        }
        Commands::LotStats { lot_id } => {
            let stats = engine.lot_stats(&lot_id).await?;
            print_json(&stats)?;
        }
        Commands::Assign { admin_id, lot_id } => {
            engine.assign_lot(&caller, &admin_id, &lot_id).await?;
            println!("Assigned lot {lot_id} to admin {admin_id}");
        }
        Commands::Unassign { admin_id, lot_id } => {
            engine.unassign_lot(&caller, &admin_id, &lot_id).await?;
            println!("Unassigned lot {lot_id} from admin {admin_id}");
        }
        Commands::CheckIn {
            lot_id,
            slot_id,
            vehicle_reg_no,
            vehicle_class,
        } => {
            let session = engine
                .check_in(&caller, &lot_id, &slot_id, &vehicle_reg_no, &vehicle_class)
                .await?;
            print_json(&session)?;
        }
        Commands::CheckOut { vehicle_reg_no } => {
            let receipt = engine.check_out(&caller, &vehicle_reg_no).await?;
            print_json(&receipt)?;
        }
        Commands::SetOccupancy {
            slot_id,
            status,
            vehicle_reg_no,
        } => {
            let status = match status.to_lowercase().as_str() {
                "occupied" => SlotStatus::Occupied,
                "free" => SlotStatus::Free,
                other => anyhow::bail!("Invalid status: {other}, expected occupied or free"),
            };
            let slot = engine
                .set_slot_occupancy(&slot_id, status, vehicle_reg_no.as_deref())
                .await?;
            print_json(&slot)?;
        }
        Commands::Closure {
            admin_id,
            date,
            payment,
        } => {
            let date = parse_date(&date)?;
            let entry = engine
                .submit_closure(&caller, &admin_id, date, payment)
                .await?;
            print_json(&entry)?;
        }
        Commands::Ledger {
            admin_id,
            start,
            end,
        } => {
            let start = start.as_deref().map(parse_date).transpose()?;
            let end = end.as_deref().map(parse_date).transpose()?;
            let entries = engine.list_ledger(&caller, &admin_id, start, end).await?;
            print_json(&entries)?;
        }
    }

    Ok(())
}
