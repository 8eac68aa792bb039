//! End-to-end ledger scenarios over the in-memory store.

use std::sync::Arc;

use boxoffice_core::config::LedgerConfig;
use boxoffice_core::store::{Item, ItemKey};
use boxoffice_orders::application::repository::{ImportOutcome, OrderRepository};
use boxoffice_orders::domain::commands::{
    Checkout, EventRange, PaymentSelector, PaymentStatusUpdate,
};
use boxoffice_orders::domain::events::{
    CREATE_ORDER, PROCEED_TO_CHECKOUT, PROCEED_TO_CHECKOUT_V2, UPDATE_PAYMENT_STATUS,
};
use boxoffice_orders::domain::order::{
    Customer, CustomerType, Money, Order, OrderItem, OrderStatus,
};
use boxoffice_orders::domain::payment::{
    Frequency, InstallmentPayment, PaymentStatus, PaymentStructure, StripeCorrelation,
};
use boxoffice_test_support::{FixedClock, InMemoryKeyValueStore, SequenceIdGenerator};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{Value, json};

fn repository(kv: &Arc<InMemoryKeyValueStore>) -> OrderRepository {
    OrderRepository::new(
        kv.clone(),
        Arc::new(FixedClock::fixture()),
        Arc::new(SequenceIdGenerator::new("evt")),
        &LedgerConfig::default(),
    )
}

fn customer() -> Customer {
    Customer {
        email: "romain.asnar@gmail.com".into(),
        fullname: "Romain Asnar".into(),
        kind: CustomerType::Leader,
    }
}

fn order(id: &str, structures: Vec<PaymentStructure>) -> Order {
    Order {
        id: id.into(),
        status: OrderStatus::Pending,
        date: FixedClock::fixture().0,
        items: vec![OrderItem {
            id: "full-pass".into(),
            title: "Full Pass".into(),
            includes: vec!["workshops".into(), "parties".into()],
            amount: 1,
            total: Money::new(30_000, "USD"),
        }],
        total: Money::new(30_000, "USD"),
        customer: customer(),
        promo_code: None,
        checked_in: false,
        payment_structures: structures,
    }
}

fn intent() -> StripeCorrelation {
    StripeCorrelation {
        id: "pi_1".into(),
        secret: "pi_1_secret".into(),
        customer_id: Some("cus_1".into()),
    }
}

fn direct_checkout(id: &str, ids: &SequenceIdGenerator) -> Checkout {
    Checkout {
        order: order(id, vec![PaymentStructure::direct(&Money::new(30_000, "USD"), ids)]),
        payment_intent: Some(intent()),
    }
}

fn installment_checkout(ids: &SequenceIdGenerator) -> Checkout {
    let plan = InstallmentPayment::split(
        &Money::new(30_000, "USD"),
        Frequency::Monthly,
        3,
        FixedClock::fixture().0,
        ids,
    )
    .unwrap();
    Checkout {
        order: order("order-1", vec![PaymentStructure::Installment(plan)]),
        payment_intent: Some(intent()),
    }
}

fn whole_day() -> EventRange {
    let now = FixedClock::fixture().0;
    EventRange::new(now - Duration::days(1), now + Duration::days(1)).unwrap()
}

#[tokio::test]
async fn test_direct_checkout_creates_pending_order() {
    // Arrange
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let repo = repository(&kv);
    let ids = SequenceIdGenerator::new("pay");

    // Act
    repo.save_checkout(&direct_checkout("order-1", &ids)).await.unwrap();

    // Assert
    let order = repo.get_order_by_id("order-1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_structures.len(), 1);
    assert!(!order.payment_structures[0].is_complete());
    let payments = repo.get_payments_by_order("order-1").await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Pending);
    assert_eq!(payments[0].stripe_id(), Some("pi_1"));
    let events = kv.table("events");
    assert_eq!(events.len(), 1);
    assert!(events.contains_key(&ItemKey::composite("evt-1", PROCEED_TO_CHECKOUT_V2)));
}

#[tokio::test]
async fn test_completed_payment_by_stripe_id_marks_order_paid() {
    // Arrange
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let repo = repository(&kv);
    let ids = SequenceIdGenerator::new("pay");
    repo.save_checkout(&direct_checkout("order-1", &ids)).await.unwrap();

    // Act
    let payment = repo
        .save_payment_status(&PaymentStatusUpdate {
            order_id: "order-1".into(),
            payment: PaymentSelector::StripeId("pi_1".into()),
            status: PaymentStatus::Completed,
        })
        .await
        .unwrap();

    // Assert
    assert_eq!(payment.status, PaymentStatus::Completed);
    let order = repo.get_order_by_id("order-1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    let stored = repo.get_payment_by_id(&payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Completed);
    assert_eq!(stored.stripe_id(), Some("pi_1"));
}

#[tokio::test]
async fn test_pending_payments_are_due_dates_before_cutoff() {
    // Arrange
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let repo = repository(&kv);
    let ids = SequenceIdGenerator::new("pay");
    repo.save_checkout(&installment_checkout(&ids)).await.unwrap();
    let cutoff = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

    // Act
    let before_first_charge = repo.get_pending_payments(cutoff).await.unwrap();
    repo.save_payment_status(&PaymentStatusUpdate {
        order_id: "order-1".into(),
        payment: PaymentSelector::Id("pay-1".into()),
        status: PaymentStatus::Completed,
    })
    .await
    .unwrap();
    let after_first_charge = repo.get_pending_payments(cutoff).await.unwrap();

    // Assert
    let ids_of = |payments: &[boxoffice_orders::domain::payment::Payment]| {
        payments.iter().map(|p| p.id.clone()).collect::<Vec<_>>()
    };
    assert_eq!(ids_of(&before_first_charge), vec!["pay-1", "pay-2"]);
    assert_eq!(ids_of(&after_first_charge), vec!["pay-2"]);
    assert!(before_first_charge.iter().all(|p| p.amount == 10_000));
    let order = repo.get_order_by_id("order-1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::PartiallyPaid);
}

#[tokio::test]
async fn test_pending_payments_cutoff_is_exclusive() {
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let repo = repository(&kv);
    let ids = SequenceIdGenerator::new("pay");
    repo.save_checkout(&installment_checkout(&ids)).await.unwrap();

    let pending = repo.get_pending_payments(FixedClock::fixture().0).await.unwrap();

    assert!(pending.is_empty());
}

#[tokio::test]
async fn test_importing_same_row_twice_keeps_one_record() {
    // Arrange
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let repo = repository(&kv);
    let ids = SequenceIdGenerator::new("pay");
    let first = direct_checkout("order-1", &ids);
    let mut second = direct_checkout("order-2", &ids);
    second.order.customer.email = " Romain.Asnar@gmail.com".into();

    // Act
    let initial = repo.import_checkouts(&[first.clone()]).await.unwrap();
    let repeated = repo.import_checkouts(&[second, first]).await.unwrap();

    // Assert
    assert_eq!(
        initial,
        vec![ImportOutcome::Imported {
            order_id: "order-1".into()
        }]
    );
    assert_eq!(
        repeated,
        vec![
            ImportOutcome::Duplicate {
                order_id: "order-1".into()
            },
            ImportOutcome::Duplicate {
                order_id: "order-1".into()
            },
        ]
    );
    assert_eq!(kv.table("import_orders").len(), 1);
    assert!(repo.get_order_by_id("order-2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicates_within_one_import_are_skipped() {
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let repo = repository(&kv);
    let ids = SequenceIdGenerator::new("pay");

    let outcomes = repo
        .import_checkouts(&[direct_checkout("order-1", &ids), direct_checkout("order-2", &ids)])
        .await
        .unwrap();

    assert_eq!(
        outcomes[1],
        ImportOutcome::Duplicate {
            order_id: "order-1".into()
        }
    );
    assert_eq!(kv.table("orders").len(), 1);
    let fingerprint = kv.table("import_orders").into_values().next().unwrap();
    let record = repo
        .get_import_order(fingerprint["fingerprint"].as_str().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.order_id, "order-1");
}

#[tokio::test]
async fn test_replay_restores_deleted_order_row() {
    // Arrange
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let repo = repository(&kv);
    let ids = SequenceIdGenerator::new("pay");
    repo.save_checkout(&direct_checkout("order-1", &ids)).await.unwrap();
    repo.save_payment_status(&PaymentStatusUpdate {
        order_id: "order-1".into(),
        payment: PaymentSelector::Id("pay-1".into()),
        status: PaymentStatus::Completed,
    })
    .await
    .unwrap();
    repo.update_order_check_in("order-1", true).await.unwrap();
    let before = kv.table("orders");
    kv.remove("orders", &ItemKey::partition("order-1"));
    assert!(repo.get_order_by_id("order-1").await.unwrap().is_none());

    // Act
    let report = repo.replay_events(whole_day()).await.unwrap();

    // Assert
    assert_eq!(report.replayed, 3);
    assert_eq!(report.awaiting_migration, 0);
    assert_eq!(kv.table("orders"), before);
    let order = repo.get_order_by_id("order-1").await.unwrap().unwrap();
    assert!(order.checked_in);
    assert_eq!(order.status, OrderStatus::Paid);
}

#[tokio::test]
async fn test_replay_is_deterministic_and_idempotent() {
    // Arrange
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let repo = repository(&kv);
    let ids = SequenceIdGenerator::new("pay");
    repo.save_checkout(&installment_checkout(&ids)).await.unwrap();
    repo.save_checkout(&direct_checkout("order-2", &ids)).await.unwrap();
    repo.save_payment_status(&PaymentStatusUpdate {
        order_id: "order-1".into(),
        payment: PaymentSelector::Id("pay-2".into()),
        status: PaymentStatus::Completed,
    })
    .await
    .unwrap();
    let orders = kv.table("orders");
    let payments = kv.table("payments");
    let events = kv.table("events");

    // Act
    kv.clear_table("orders");
    kv.clear_table("payments");
    repo.replay_events(whole_day()).await.unwrap();
    repo.replay_events(whole_day()).await.unwrap();

    // Assert
    assert_eq!(kv.table("orders"), orders);
    assert_eq!(kv.table("payments"), payments);
    assert_eq!(kv.table("events"), events);
}

#[tokio::test]
async fn test_replaying_check_in_without_its_checkout_leaves_order_absent() {
    // Arrange
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let ids = SequenceIdGenerator::new("pay");
    repository(&kv)
        .save_checkout(&direct_checkout("order-1", &ids))
        .await
        .unwrap();
    let later = FixedClock::fixture().advanced(Duration::hours(2));
    let repo = OrderRepository::new(
        kv.clone(),
        Arc::new(later),
        Arc::new(SequenceIdGenerator::new("evt")),
        &LedgerConfig::default(),
    );
    repo.update_order_check_in("order-1", true).await.unwrap();
    kv.clear_table("orders");

    // Act
    let report = repo
        .replay_events(
            EventRange::new(later.0 - Duration::minutes(1), later.0 + Duration::minutes(1))
                .unwrap(),
        )
        .await
        .unwrap();

    // Assert
    assert_eq!(report.replayed, 1);
    assert!(kv.table("orders").is_empty());
    assert_eq!(repo.get_order_by_id("order-1").await.unwrap(), None);
}

#[tokio::test]
async fn test_check_in_sets_only_the_flag() {
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let repo = repository(&kv);
    let ids = SequenceIdGenerator::new("pay");
    repo.save_checkout(&direct_checkout("order-1", &ids)).await.unwrap();
    let before = repo.get_order_by_id("order-1").await.unwrap().unwrap();

    repo.update_order_check_in("order-1", true).await.unwrap();

    let after = repo.get_order_by_id("order-1").await.unwrap().unwrap();
    assert!(after.checked_in);
    assert_eq!(Order { checked_in: false, ..after }, before);
}

fn item(value: Value) -> Item {
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn test_migrated_create_order_matches_legacy_order() {
    // Arrange
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let repo = repository(&kv);
    kv.insert(
        "events",
        ItemKey::composite("legacy-1", CREATE_ORDER),
        item(json!({
            "id": "legacy-1",
            "name": CREATE_ORDER,
            "time": "2026-01-15T09:00:00.000Z",
            "data": {
                "id": "order-1",
                "status": "pending",
                "date": "2026-01-15T09:00:00.000Z",
                "items": [],
                "total": {"amount": 30000, "currency": "USD"},
                "customer": {"email": "romain.asnar@gmail.com", "fullname": "Romain Asnar", "type": "leader"},
                "promoCode": "EARLYBIRD",
                "paymentIntent": {"id": "pi_legacy", "secret": "pi_legacy_secret"}
            }
        })),
    );

    // Act
    let report = repo.migrate_events(whole_day()).await.unwrap();

    // Assert
    assert_eq!(report.transformed, 1);
    let order = repo.get_order_by_id("order-1").await.unwrap().unwrap();
    assert_eq!(order.customer, customer());
    assert_eq!(order.promo_code.as_deref(), Some("EARLYBIRD"));
    assert_eq!(order.total, Money::new(30_000, "USD"));
    assert_eq!(order.structures_total(), 30_000);
    let payments = repo.get_payments_by_order("order-1").await.unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].id, "evt-1");
    assert_ne!(payments[0].id, "legacy-1");
    assert_eq!(payments[0].stripe_id(), Some("pi_legacy"));
    let migrated = kv
        .table("events")
        .remove(&ItemKey::composite("legacy-1", PROCEED_TO_CHECKOUT_V2))
        .unwrap();
    assert_eq!(migrated["schemaVersion"], 3);
    assert_eq!(migrated["time"], "2026-01-15T09:00:00.000Z");
}

fn second_generation_order(status: &str) -> Value {
    json!({
        "id": "order-1",
        "status": "pending",
        "date": "2026-01-15T09:00:00.000Z",
        "items": [],
        "total": {"amount": 30000, "currency": "USD"},
        "customer": {"email": "romain.asnar@gmail.com", "fullname": "Romain Asnar", "type": "leader"},
        "paymentIntent": {"id": "pi_v2", "secret": "pi_v2_secret"},
        "paymentStructures": [{
            "type": "direct",
            "amount": 30000,
            "currency": "USD",
            "status": status,
            "paymentId": "pay-v2"
        }]
    })
}

fn seed_second_generation(kv: &InMemoryKeyValueStore) {
    kv.insert(
        "events",
        ItemKey::composite("v2-1", PROCEED_TO_CHECKOUT),
        item(json!({
            "id": "v2-1",
            "name": PROCEED_TO_CHECKOUT,
            "time": "2026-01-15T09:00:00.000Z",
            "schemaVersion": 2,
            "data": {"order": second_generation_order("pending")}
        })),
    );
    kv.insert(
        "events",
        ItemKey::composite("v2-2", UPDATE_PAYMENT_STATUS),
        item(json!({
            "id": "v2-2",
            "name": UPDATE_PAYMENT_STATUS,
            "time": "2026-01-15T09:05:00.000Z",
            "schemaVersion": 2,
            "data": {
                "order": second_generation_order("pending"),
                "paymentId": "pay-v2",
                "status": "completed"
            }
        })),
    );
}

#[tokio::test]
async fn test_replay_upgrades_second_generation_events() {
    // Arrange
    let kv = Arc::new(InMemoryKeyValueStore::new());
    seed_second_generation(&kv);
    let repo = repository(&kv);

    // Act
    let report = repo.replay_events(whole_day()).await.unwrap();

    // Assert
    assert_eq!(report.replayed, 2);
    assert_eq!(report.awaiting_migration, 0);
    let row = &kv.table("orders")[&ItemKey::partition("order-1")];
    assert_eq!(row["schemaVersion"], 3);
    assert!(!row.contains_key("paymentIntent"));
    let order = repo.get_order_by_id("order-1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert!(order.payment_structures[0].is_complete());
    let payment = repo.get_payment_by_stripe_id("pi_v2").await.unwrap().unwrap();
    assert_eq!(payment.id, "pay-v2");
    assert_eq!(payment.order_id, "order-1");
    assert_eq!(payment.status, PaymentStatus::Completed);
}

#[tokio::test]
async fn test_migration_leaves_pass_through_records_untouched() {
    // Arrange
    let kv = Arc::new(InMemoryKeyValueStore::new());
    seed_second_generation(&kv);
    let repo = repository(&kv);
    let ids = SequenceIdGenerator::new("pay");
    repo.save_checkout(&direct_checkout("order-2", &ids)).await.unwrap();
    let events_before = kv.table("events");

    // Act
    let report = repo.migrate_events(whole_day()).await.unwrap();

    // Assert
    assert_eq!(report.scanned, 3);
    assert_eq!(report.passed_through, 3);
    assert_eq!(report.transformed, 0);
    let events_after = kv.table("events");
    assert_eq!(events_after, events_before);
    let key = ItemKey::composite("v2-1", PROCEED_TO_CHECKOUT);
    assert_eq!(
        serde_json::to_string(&events_after[&key]).unwrap(),
        serde_json::to_string(&events_before[&key]).unwrap()
    );
    let order = repo.get_order_by_id("order-1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
}
