use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};

use roomledger::engine::{BlockChanges, CalendarMonth};
use roomledger::model::{GuestDetails, NewReservation, RoomId, Stay};
use roomledger::{Config, Engine, EngineError};

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date")
}

fn night_stay(offset: u64, nights: u64) -> Stay {
    let start = base_date() + Days::new(offset);
    Stay::new(start, start + Days::new(nights)).expect("non-empty stay")
}

fn request(room_id: RoomId, stay: Stay) -> NewReservation {
    NewReservation {
        room_id,
        stay,
        guest: GuestDetails {
            first_name: "Bench".into(),
            last_name: "Guest".into(),
            email: "bench@example.com".into(),
            phone: "555-0000".into(),
        },
    }
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

async fn setup(engine: &Engine, n_rooms: usize) -> Vec<RoomId> {
    let names: Vec<String> = (0..n_rooms).map(|i| format!("Bench Room {i:03}")).collect();
    let rooms = engine.ensure_rooms(&names).await.expect("seed rooms");
    println!("  created {} rooms", rooms.len());
    rooms.into_iter().map(|r| r.id).collect()
}

async fn phase1_sequential(engine: &Engine, room_id: RoomId) {
    let n = 1000;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n {
        let t = Instant::now();
        engine
            .create_reservation(request(room_id, night_stay(i as u64, 1)))
            .await
            .expect("sequential booking");
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("write latency", &mut latencies);
}

async fn phase2_contention(engine: &Engine, rooms: &[RoomId]) {
    let n_tasks = 16;
    let n_per_task = 100;
    let booked = Arc::new(AtomicUsize::new(0));
    let conflicts = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    // Every task walks the same rooms and dates, so most attempts collide.
    let mut handles = Vec::new();
    for t in 0..n_tasks {
        let engine = engine.clone();
        let rooms = rooms.to_vec();
        let booked = booked.clone();
        let conflicts = conflicts.clone();
        handles.push(tokio::spawn(async move {
            for j in 0..n_per_task {
                let room_id = rooms[(t + j) % rooms.len()];
                let stay = night_stay(2000 + (j as u64 % 50) * 2, 2);
                match engine.create_reservation(request(room_id, stay)).await {
                    Ok(_) => {
                        booked.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(EngineError::Conflict(_)) => {
                        conflicts.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => eprintln!("  booking failed: {e}"),
                }
            }
        }));
    }
    for h in handles {
        let _ = h.await;
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    println!(
        "  {n_tasks} tasks x {n_per_task} attempts = {total} in {:.2}s: {} booked, {} conflicts",
        elapsed.as_secs_f64(),
        booked.load(Ordering::Relaxed),
        conflicts.load(Ordering::Relaxed),
    );
}

async fn phase3_read_under_load(engine: &Engine, rooms: &[RoomId]) {
    let stop = Arc::new(AtomicBool::new(false));

    let mut writer_handles = Vec::new();
    for w in 0..4u64 {
        let engine = engine.clone();
        let room_id = rooms[w as usize % rooms.len()];
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let mut i = 0u64;
            while !stop.load(Ordering::Relaxed) {
                let _ = engine
                    .insert_manual_block(room_id, base_date() + Days::new(5000 + w * 1000 + i))
                    .await;
                i += 1;
            }
        }));
    }

    let n_readers = 8;
    let reads_per_reader = 300;
    let mut reader_handles = Vec::new();
    for r in 0..n_readers {
        let engine = engine.clone();
        let room_id = rooms[r % rooms.len()];
        reader_handles.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(reads_per_reader);
            for i in 0..reads_per_reader {
                let stay = night_stay(i as u64 % 365, 3);
                let t = Instant::now();
                if i % 2 == 0 {
                    let _ = engine.is_room_free(room_id, stay).await;
                } else {
                    let _ = engine.free_rooms(stay).await;
                }
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all = Vec::new();
    for h in reader_handles {
        if let Ok(latencies) = h.await {
            all.extend(latencies);
        }
    }
    stop.store(true, Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }
    print_latency("availability latency", &mut all);
}

async fn phase4_calendar(engine: &Engine) {
    let month = CalendarMonth::containing(base_date()).expect("valid month");
    let n = 50;
    let mut build = Vec::with_capacity(n);
    let mut reconcile = Vec::with_capacity(n);

    for _ in 0..n {
        let t = Instant::now();
        let view = engine.calendar(month).await.expect("calendar");
        build.push(t.elapsed());

        let changes: Vec<BlockChanges> = view.unchanged();
        let t = Instant::now();
        engine.reconcile_blocks(&view.token, &changes).await.expect("reconcile");
        reconcile.push(t.elapsed());
    }
    print_latency("calendar build", &mut build);
    print_latency("no-op reconcile", &mut reconcile);
}

#[tokio::main]
async fn main() {
    let dir = tempfile::tempdir().expect("scratch dir");
    let url = format!("sqlite://{}", dir.path().join("stress.db").display());
    let mut config = Config::for_database(url);
    config.op_timeout = Duration::from_secs(10);
    config.busy_timeout = Duration::from_secs(10);

    println!("=== roomledger stress benchmark ===");
    println!("database: {}\n", config.database_url);

    let engine = Engine::open(&config).await.expect("open engine");

    println!("[setup]");
    let rooms = setup(&engine, 20).await;

    println!("\n[phase 1] sequential booking throughput");
    phase1_sequential(&engine, rooms[0]).await;

    println!("\n[phase 2] contended bookings");
    phase2_contention(&engine, &rooms[1..5]).await;

    println!("\n[phase 3] availability latency under write load");
    phase3_read_under_load(&engine, &rooms[5..]).await;

    println!("\n[phase 4] calendar build and reconcile");
    phase4_calendar(&engine).await;

    println!("\n=== benchmark complete ===");
}
