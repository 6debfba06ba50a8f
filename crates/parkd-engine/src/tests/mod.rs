//! Engine test suites.

mod ledger;

use crate::{Caller, NewAdminUser, NewParkingLot, NewSlot, ParkingEngine, Role};

pub(crate) async fn engine() -> ParkingEngine {
    ParkingEngine::in_memory().await.unwrap()
}

pub(crate) fn root() -> Caller {
    Caller::super_admin("root")
}

/// One lot with two slots, one assigned admin. Car rate 20/hour,
/// two-wheeler rate 10/hour.
pub(crate) async fn seed(engine: &ParkingEngine) {
    let root = root();
    engine
        .register_admin(
            &root,
            NewAdminUser {
                subject_id: "admin-1".to_string(),
                name: "Asha".to_string(),
                role: Role::Admin,
            },
        )
        .await
        .unwrap();
    engine
        .add_lot(
            &root,
            NewParkingLot {
                id: "lot-1".to_string(),
                name: "Central".to_string(),
                car_charge: "20/hour".to_string(),
                two_wheeler_charge: "10/hour".to_string(),
            },
        )
        .await
        .unwrap();
    for (id, name) in [("slot-1", "A1"), ("slot-2", "A2")] {
        engine
            .add_slot(
                &root,
                NewSlot {
                    id: id.to_string(),
                    lot_id: "lot-1".to_string(),
                    name: name.to_string(),
                },
            )
            .await
            .unwrap();
    }
    engine.assign_lot(&root, "admin-1", "lot-1").await.unwrap();
}
