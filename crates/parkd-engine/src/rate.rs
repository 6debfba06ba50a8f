//! Rate resolution and duration billing.

use chrono::{DateTime, Utc};
use parkd_database::{ParkingLot, VehicleClass};
use tracing::warn;

/// Extract the hourly magnitude from a raw charge string such as
/// `"20/hour"`. Everything before the first `/` is parsed as a float;
/// a malformed or empty charge degrades to a zero rate rather than
/// failing the check-out.
pub fn hourly_rate(raw: &str) -> f64 {
    let magnitude = raw.split('/').next().unwrap_or("").trim();
    match magnitude.parse::<f64>() {
        Ok(rate) => rate,
        Err(_) => {
            if !raw.is_empty() {
                warn!(charge = raw, "Unparseable charge string, billing at zero rate");
            }
            0.0
        }
    }
}

/// The hourly rate a lot charges for a vehicle class.
pub fn rate_for(lot: &ParkingLot, class: VehicleClass) -> f64 {
    match class {
        VehicleClass::FourWheeler => hourly_rate(&lot.car_charge),
        VehicleClass::TwoWheeler => hourly_rate(&lot.two_wheeler_charge),
    }
}

/// Billable hours for a stay: any nonzero fraction of an hour rounds up
/// to a whole hour. A zero-length (or clock-skewed negative) stay bills
/// zero hours.
pub fn billed_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let secs = (end - start).num_seconds();
    if secs <= 0 {
        0
    } else {
        (secs + 3599) / 3600
    }
}
