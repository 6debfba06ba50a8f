//! Daily cash ledger tests.

use super::{engine, root, seed};
use crate::{Caller, NewAdminUser, Role};
use chrono::{DateTime, Duration, NaiveDate, Utc};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

fn at(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    date.and_hms_opt(hour, 0, 0).unwrap().and_utc()
}

#[tokio::test]
async fn check_out_accrues_to_assigned_admin() {
    let engine = engine().await;
    seed(&engine).await;
    let caller = Caller::admin("admin-1");

    // Two cars, 3 billed hours each at 20/hour.
    for (slot, vehicle) in [("slot-1", "KA01AB1234"), ("slot-2", "KA02CD5678")] {
        engine
            .check_in_at("lot-1", slot, vehicle, "car", at(day(10), 9))
            .await
            .unwrap();
        engine
            .check_out_at(vehicle, at(day(10), 9) + Duration::minutes(150))
            .await
            .unwrap();
    }

    let entries = engine
        .list_ledger(&caller, "admin-1", None, None)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].date, day(10));
    assert_eq!(entries[0].today_collection, 120.0);
    assert_eq!(entries[0].closing_balance, 120.0);
}

#[tokio::test]
async fn closure_computes_and_recomputes() {
    let engine = engine().await;
    seed(&engine).await;
    let caller = Caller::admin("admin-1");

    engine
        .check_in_at("lot-1", "slot-1", "KA01AB1234", "car", at(day(10), 9))
        .await
        .unwrap();
    engine
        .check_out_at("KA01AB1234", at(day(10), 12))
        .await
        .unwrap();

    let entry = engine
        .submit_closure(&caller, "admin-1", day(10), 10.0)
        .await
        .unwrap();
    assert_eq!(entry.opening_balance, 0.0);
    assert_eq!(entry.today_collection, 60.0);
    assert_eq!(entry.payment_made, 10.0);
    assert_eq!(entry.closing_balance, 50.0);

    // Resubmitting overwrites the payment and recomputes from scratch.
    let entry = engine
        .submit_closure(&caller, "admin-1", day(10), 25.0)
        .await
        .unwrap();
    assert_eq!(entry.payment_made, 25.0);
    assert_eq!(entry.closing_balance, 35.0);
}

#[tokio::test]
async fn opening_balance_carries_forward() {
    let engine = engine().await;
    seed(&engine).await;
    let caller = Caller::admin("admin-1");

    engine
        .check_in_at("lot-1", "slot-1", "KA01AB1234", "car", at(day(10), 9))
        .await
        .unwrap();
    engine
        .check_out_at("KA01AB1234", at(day(10), 12))
        .await
        .unwrap();
    engine
        .submit_closure(&caller, "admin-1", day(10), 10.0)
        .await
        .unwrap();

    // Day 12: the opening balance comes from the latest strictly
    // earlier entry, skipping the gap on day 11.
    engine
        .check_in_at("lot-1", "slot-1", "KA05EF9999", "bike", at(day(12), 9))
        .await
        .unwrap();
    engine
        .check_out_at("KA05EF9999", at(day(12), 11))
        .await
        .unwrap();

    let entry = engine
        .submit_closure(&caller, "admin-1", day(12), 0.0)
        .await
        .unwrap();
    assert_eq!(entry.opening_balance, 50.0);
    assert_eq!(entry.today_collection, 20.0);
    assert_eq!(entry.closing_balance, 70.0);
}

#[tokio::test]
async fn closure_without_collections() {
    let engine = engine().await;
    seed(&engine).await;
    let caller = Caller::admin("admin-1");

    let entry = engine
        .submit_closure(&caller, "admin-1", day(10), 0.0)
        .await
        .unwrap();
    assert_eq!(entry.today_collection, 0.0);
    assert_eq!(entry.closing_balance, 0.0);
}

#[tokio::test]
async fn ledger_listing_bounds() {
    let engine = engine().await;
    seed(&engine).await;
    let caller = Caller::admin("admin-1");

    for d in [10, 11, 12, 13] {
        engine
            .submit_closure(&caller, "admin-1", day(d), 0.0)
            .await
            .unwrap();
    }

    let all = engine
        .list_ledger(&caller, "admin-1", None, None)
        .await
        .unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].date, day(13));

    let bounded = engine
        .list_ledger(&caller, "admin-1", Some(day(11)), Some(day(12)))
        .await
        .unwrap();
    assert_eq!(bounded.len(), 2);
    assert_eq!(bounded[0].date, day(12));
    assert_eq!(bounded[1].date, day(11));
}

#[tokio::test]
async fn ledger_access_is_role_gated() {
    let engine = engine().await;
    seed(&engine).await;
    let root = root();
    engine
        .register_admin(
            &root,
            NewAdminUser {
                subject_id: "admin-2".to_string(),
                name: "Ravi".to_string(),
                role: Role::Admin,
            },
        )
        .await
        .unwrap();

    let other = Caller::admin("admin-2");

    // An admin cannot touch another admin's ledger.
    let err = engine
        .submit_closure(&other, "admin-1", day(10), 0.0)
        .await
        .unwrap_err();
    assert!(err.is_forbidden());
    let err = engine
        .list_ledger(&other, "admin-1", None, None)
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    // A super admin can.
    engine
        .submit_closure(&root, "admin-1", day(10), 0.0)
        .await
        .unwrap();
    engine
        .list_ledger(&root, "admin-1", None, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn closure_requires_registered_admin() {
    let engine = engine().await;
    seed(&engine).await;

    let err = engine
        .submit_closure(&root(), "ghost", day(10), 0.0)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
