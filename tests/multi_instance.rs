use chrono::NaiveDate;
use tempfile::TempDir;

use roomledger::engine::{BlockChanges, CalendarMonth, Entity};
use roomledger::model::{GuestDetails, NewReservation, RoomId, Stay};
use roomledger::{Config, Engine, EngineError};

// ── Test infrastructure ──────────────────────────────────────

/// Two independent engines (separate pools) over one database file, the way
/// two server processes would share it.
async fn two_instances() -> (TempDir, Engine, Engine) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("shared.db").display());
    let config = Config::for_database(url);
    let a = Engine::open(&config).await.unwrap();
    let b = Engine::open(&config).await.unwrap();
    (dir, a, b)
}

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn stay(start: &str, end: &str) -> Stay {
    Stay::new(d(start), d(end)).unwrap()
}

fn request(room_id: RoomId, stay: Stay, n: usize) -> NewReservation {
    NewReservation {
        room_id,
        stay,
        guest: GuestDetails {
            first_name: format!("Guest{n}"),
            last_name: "Load".into(),
            email: format!("guest{n}@example.com"),
            phone: "555-0199".into(),
        },
    }
}

/// Every pair of restrictions on a room is disjoint.
async fn assert_no_overlaps(engine: &Engine, room_id: RoomId, window: Stay) {
    let rows = engine.restrictions_for_room_in_range(room_id, window).await.unwrap();
    for (i, a) in rows.iter().enumerate() {
        for b in &rows[i + 1..] {
            assert!(
                !a.stay.overlaps(&b.stay),
                "room {room_id}: restriction {} {:?} overlaps {} {:?}",
                a.id,
                a.stay,
                b.id,
                b.stay
            );
        }
    }
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn writes_are_visible_across_instances() {
    let (_dir, a, b) = two_instances().await;
    let room = a.create_room("Shared Suite").await.unwrap();
    let id = a
        .create_reservation(request(room, stay("2025-04-01", "2025-04-04"), 0))
        .await
        .unwrap();

    assert_eq!(b.reservation_by_id(id).await.unwrap().room_id, room);
    assert!(!b.is_room_free(room, stay("2025-04-03", "2025-04-05")).await.unwrap());

    let err = b
        .create_reservation(request(room, stay("2025-04-02", "2025-04-03"), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    b.delete_reservation(id).await.unwrap();
    assert!(a.is_room_free(room, stay("2025-04-01", "2025-04-04")).await.unwrap());
    assert!(matches!(
        a.reservation_by_id(id).await,
        Err(EngineError::NotFound(Entity::Reservation, _))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn contended_rooms_never_double_book() {
    let (_dir, a, b) = two_instances().await;
    let rooms = a
        .ensure_rooms(&["North".to_string(), "South".to_string(), "East".to_string()])
        .await
        .unwrap();

    // Staggered three-night stays; neighbours overlap by one or two nights.
    let starts = ["2025-07-01", "2025-07-02", "2025-07-03", "2025-07-04", "2025-07-05"];
    let mut handles = Vec::new();
    for (n, room) in rooms.iter().enumerate() {
        for (k, start) in starts.iter().enumerate() {
            let engine = if (n + k) % 2 == 0 { a.clone() } else { b.clone() };
            let start = d(start);
            let req = request(room.id, Stay::new(start, start + chrono::Days::new(3)).unwrap(), n * 10 + k);
            handles.push(tokio::spawn(async move { engine.create_reservation(req).await }));
        }
    }

    let mut booked = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => booked += 1,
            Err(EngineError::Conflict(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    let july = stay("2025-07-01", "2025-08-01");
    for room in &rooms {
        assert_no_overlaps(&a, room.id, july).await;
    }
    // At least one stay per room fits, at most two disjoint ones.
    assert!(booked >= rooms.len() && booked <= rooms.len() * 2, "booked {booked}");
    assert_eq!(a.all_reservations().await.unwrap().len(), booked);
}

#[tokio::test]
async fn reconcile_loses_to_a_concurrent_booking() {
    let (_dir, a, b) = two_instances().await;
    let room = a.create_room("Garden Room").await.unwrap();
    let view = a.calendar(CalendarMonth::new(2025, 9).unwrap()).await.unwrap();

    // Another instance books the night the owner is about to block.
    b.create_reservation(request(room, stay("2025-09-12", "2025-09-14"), 0))
        .await
        .unwrap();

    let changes = [BlockChanges::new(room).add(d("2025-09-01")).add(d("2025-09-13"))];
    let err = a.reconcile_blocks(&view.token, &changes).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict(r) if r == room));

    let after = b.calendar(CalendarMonth::new(2025, 9).unwrap()).await.unwrap();
    let row = after.room(room).unwrap();
    assert!(row.block_ids().is_empty());
    assert!(row.reservation_on(d("2025-09-13")).is_some());
}

#[tokio::test]
async fn token_from_one_instance_works_on_another() {
    let (_dir, a, b) = two_instances().await;
    let room = a.create_room("Loft").await.unwrap();
    let block = a.insert_manual_block(room, d("2025-10-10")).await.unwrap();

    let view = a.calendar(CalendarMonth::new(2025, 10).unwrap()).await.unwrap();
    let fresh = b
        .reconcile_blocks(&view.token, &[BlockChanges::new(room).add(d("2025-10-11"))])
        .await
        .unwrap();

    let row = fresh.room(room).unwrap();
    assert_eq!(row.block_on(d("2025-10-10")), None);
    assert!(row.block_on(d("2025-10-11")).is_some());
    assert!(matches!(
        a.delete_restriction(block).await,
        Err(EngineError::NotFound(Entity::Restriction, _))
    ));
}
