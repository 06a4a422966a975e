//! Text rendering of query answers and run summaries.

use hotel_kv_migrate::mapper::MigrationPlan;
use hotel_kv_migrate::query::{BookingDetail, KeyContents, KeyInfo, UserBookings};
use hotel_kv_migrate::{Booking, Hotel, HealthCheckResult, MigrationResult, Placement, Traced, User};

pub fn user_line(user: &User) -> String {
    format!("User {}: {} <{}>", user.id, user.name, user.email)
}

pub fn hotel_line(hotel: &Hotel) -> String {
    format!("Hotel {}: {} ({})", hotel.id, hotel.name, hotel.city)
}

pub fn booking_line(booking: &Booking) -> String {
    format!(
        "Booking {}: user {} at hotel {} on {}",
        booking.id, booking.user_id, booking.hotel_id, booking.date
    )
}

pub fn print_placements(touched: &[Placement]) {
    if touched.is_empty() {
        return;
    }
    println!("\n  Keys read:");
    for placement in touched {
        println!("    {}", placement);
    }
}

pub fn print_optional<T>(traced: &Traced<Option<T>>, what: &str, line: impl Fn(&T) -> String) {
    match &traced.value {
        Some(value) => println!("{}", line(value)),
        None => println!("{} not found", what),
    }
    print_placements(&traced.touched);
}

pub fn print_list<T>(traced: &Traced<Vec<T>>, empty: &str, line: impl Fn(&T) -> String) {
    if traced.value.is_empty() {
        println!("{}", empty);
    }
    for value in &traced.value {
        println!("{}", line(value));
    }
    print_placements(&traced.touched);
}

pub fn print_user_bookings(traced: &Traced<Option<UserBookings>>, user_id: i64) {
    match &traced.value {
        None => println!("User {} not found", user_id),
        Some(history) => {
            println!("{}", user_line(&history.user));
            if history.bookings.is_empty() {
                println!("  No bookings");
            }
            for entry in &history.bookings {
                let hotel = entry
                    .hotel
                    .as_ref()
                    .map(|h| format!("{} in {}", h.name, h.city))
                    .unwrap_or_else(|| format!("missing hotel {}", entry.booking.hotel_id));
                println!(
                    "  Booking {} on {}: {}",
                    entry.booking.id, entry.booking.date, hotel
                );
            }
        }
    }
    print_placements(&traced.touched);
}

pub fn print_booking_detail(traced: &Traced<Option<BookingDetail>>, booking_id: i64) {
    match &traced.value {
        None => println!("Booking {} not found", booking_id),
        Some(detail) => {
            println!("{}", booking_line(&detail.booking));
            match &detail.user {
                Some(user) => println!("  {}", user_line(user)),
                None => println!("  User {} is missing", detail.booking.user_id),
            }
            match &detail.hotel {
                Some(hotel) => println!("  {}", hotel_line(hotel)),
                None => println!("  Hotel {} is missing", detail.booking.hotel_id),
            }
        }
    }
    print_placements(&traced.touched);
}

pub fn print_key_info(info: &KeyInfo) {
    println!("Key: {}", info.key);
    println!("  Placement: {}", info.placement);
    match &info.kind {
        None => println!("  Does not exist"),
        Some(kind) => println!("  Type: {}", kind),
    }
    match &info.contents {
        KeyContents::Missing => {}
        KeyContents::Hash(fields) => {
            for (name, value) in fields {
                println!("    {}: {}", name, value);
            }
        }
        KeyContents::List(items) => println!("  Items ({}): {:?}", items.len(), items),
        KeyContents::Set(members) => println!("  Members ({}): {:?}", members.len(), members),
        KeyContents::String(value) => println!("  Value: {}", value),
    }
}

pub fn print_plan(plan: &MigrationPlan) {
    use hotel_kv_migrate::mapper::EntityKind;

    println!("\nDry run: no writes applied");
    println!("  Users: {}", plan.count(EntityKind::User));
    println!("  Hotels: {}", plan.count(EntityKind::Hotel));
    println!("  Bookings: {}", plan.count(EntityKind::Booking));
    println!("  Writes: {}", plan.write_count());

    let mut nodes: Vec<_> = plan.node_distribution().into_iter().collect();
    nodes.sort();
    for (node, writes) in nodes {
        println!("    {}: {} writes", node, writes);
    }
    for warning in &plan.warnings {
        println!("  Warning: {}", warning);
    }
}

pub fn print_result(result: &MigrationResult) {
    println!("\nMigration {}!", result.status.replace('_', " "));
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);
    println!(
        "  Users: {} migrated, {} failed",
        result.users.migrated, result.users.failed
    );
    println!(
        "  Hotels: {} migrated, {} failed",
        result.hotels.migrated, result.hotels.failed
    );
    println!(
        "  Bookings: {} migrated, {} failed",
        result.bookings.migrated, result.bookings.failed
    );
    println!(
        "  Writes: {} applied, {} failed",
        result.writes_applied, result.writes_failed
    );

    let origin = if result.live_topology { "live" } else { "static" };
    println!("  Placement ({} slot table):", origin);
    for (node, writes) in &result.node_distribution {
        println!("    {}: {} writes", node, writes);
    }

    if !result.failed_keys.is_empty() {
        println!("  Failed keys: {:?}", result.failed_keys);
    }
    for warning in &result.warnings {
        println!("  Warning: {}", warning);
    }

    if let Some(report) = &result.verification {
        let failed = report.failures().count();
        if failed == 0 {
            println!("  Verification: {} checks passed", report.checks.len());
        } else {
            println!(
                "  Verification: {} of {} checks failed",
                failed,
                report.checks.len()
            );
            for check in report.failures() {
                println!(
                    "    {} ({}): {}",
                    check.key,
                    check.name,
                    check.detail.as_deref().unwrap_or("")
                );
            }
        }
    }
}

pub fn print_health(result: &HealthCheckResult) {
    println!("Health Check Results:");
    println!(
        "  Source ({}): {} ({}ms)",
        result.source_type,
        if result.source_error.is_none() { "OK" } else { "FAILED" },
        result.source_latency_ms
    );
    if let Some(ref err) = result.source_error {
        println!("    Error: {}", err);
    }
    println!(
        "  Target ({}): {} ({}ms)",
        result.target_type,
        if result.target_error.is_none() { "OK" } else { "FAILED" },
        result.target_latency_ms
    );
    if let Some(ref err) = result.target_error {
        println!("    Error: {}", err);
    }
    println!(
        "  Slot table: {}",
        if result.live_topology { "live" } else { "static" }
    );
    println!(
        "\n  Overall: {}",
        if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
    );
}
