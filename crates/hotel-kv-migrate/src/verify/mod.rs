//! Post-migration read-back verification.
//!
//! Verification is advisory: it samples a few keys after the writes have
//! been applied and reports what it finds. A failed check is logged and
//! recorded in the [`VerifyReport`]; it never fails the migration.

use std::collections::HashMap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::{keys, Booking, Record, Snapshot, User};
use crate::error::Result;
use crate::store::KvStore;

/// Outcome of one read-back check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyCheck {
    /// Short description of what was checked.
    pub name: String,

    /// Key that was read.
    pub key: String,

    pub passed: bool,

    /// Mismatch or read error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl VerifyCheck {
    fn pass(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            passed: true,
            detail: None,
        }
    }

    fn fail(name: impl Into<String>, key: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            passed: false,
            detail: Some(detail.into()),
        }
    }
}

/// All checks from one verification pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyReport {
    /// User whose keys were sampled.
    pub sampled_user: Option<i64>,
    pub checks: Vec<VerifyCheck>,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &VerifyCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }

    fn record(&mut self, check: VerifyCheck) {
        if let Some(detail) = &check.detail {
            warn!("Verification mismatch on {} ({}): {}", check.key, check.name, detail);
        }
        self.checks.push(check);
    }
}

/// Pick the user to sample: the lowest-id user with bookings, otherwise the
/// lowest-id user.
fn sample_user(snapshot: &Snapshot) -> Option<&User> {
    snapshot
        .users
        .iter()
        .filter(|u| snapshot.bookings_for_user(u.id).next().is_some())
        .min_by_key(|u| u.id)
        .or_else(|| snapshot.users.iter().min_by_key(|u| u.id))
}

/// Read back a sample of the migrated data and compare it with the snapshot.
pub async fn verify(store: &dyn KvStore, snapshot: &Snapshot) -> VerifyReport {
    let mut report = VerifyReport::default();

    for (key, expected) in [
        (keys::USERS_ALL, snapshot.users.len()),
        (keys::HOTELS_ALL, snapshot.hotels.len()),
        (keys::BOOKINGS_ALL, snapshot.bookings.len()),
    ] {
        report.record(check_index_size(store, key, expected).await);
    }

    if let Some(user) = sample_user(snapshot) {
        report.sampled_user = Some(user.id);
        report.record(check_record(store, "user record", user).await);

        let list_key = keys::user_bookings(user.id);
        match store.list_range(&list_key).await {
            Ok(listed) => {
                report.record(check_list_membership(snapshot, user.id, &list_key, &listed));
                if let Some(first) = listed.first() {
                    sample_booking(store, snapshot, first, &mut report).await;
                }
            }
            Err(e) => report.record(VerifyCheck::fail(
                "relationship list",
                list_key,
                format!("read failed: {}", e),
            )),
        }
    }

    let failed = report.failures().count();
    if failed == 0 {
        info!("Verification passed: {} checks", report.checks.len());
    } else {
        warn!(
            "Verification found {} mismatch(es) in {} checks",
            failed,
            report.checks.len()
        );
    }
    report
}

async fn sample_booking(
    store: &dyn KvStore,
    snapshot: &Snapshot,
    listed_id: &str,
    report: &mut VerifyReport,
) {
    let booking = listed_id
        .parse::<i64>()
        .ok()
        .and_then(|id| snapshot.bookings.iter().find(|b| b.id == id));
    let Some(booking) = booking else {
        report.record(VerifyCheck::fail(
            "booking record",
            format!("booking:{}", listed_id),
            "listed booking id is not in the source",
        ));
        return;
    };

    report.record(check_record(store, "booking record", booking).await);

    match snapshot.hotels.iter().find(|h| h.id == booking.hotel_id) {
        Some(hotel) => report.record(check_record(store, "hotel record", hotel).await),
        None => report.record(VerifyCheck::fail(
            "hotel record",
            keys::hotel(booking.hotel_id),
            "booking references a hotel missing from the source",
        )),
    }
}

async fn check_index_size(store: &dyn KvStore, key: &str, expected: usize) -> VerifyCheck {
    let name = "membership index size";
    match store.members(key).await {
        Ok(members) if members.len() == expected => VerifyCheck::pass(name, key),
        Ok(members) => VerifyCheck::fail(
            name,
            key,
            format!("expected {} members, found {}", expected, members.len()),
        ),
        Err(e) => VerifyCheck::fail(name, key, format!("read failed: {}", e)),
    }
}

async fn check_record<R>(store: &dyn KvStore, name: &str, expected: &R) -> VerifyCheck
where
    R: Record + PartialEq + Debug,
{
    let key = expected.key();
    match read_record::<R>(store, &key).await {
        Ok(Some(actual)) if &actual == expected => VerifyCheck::pass(name, key),
        Ok(Some(actual)) => VerifyCheck::fail(
            name,
            key,
            format!("expected {:?}, found {:?}", expected, actual),
        ),
        Ok(None) => VerifyCheck::fail(name, key, "record is missing"),
        Err(e) => VerifyCheck::fail(name, key, format!("read failed: {}", e)),
    }
}

async fn read_record<R: Record>(store: &dyn KvStore, key: &str) -> Result<Option<R>> {
    let fields: HashMap<String, String> = store.get_fields(key).await?;
    if fields.is_empty() {
        return Ok(None);
    }
    R::from_fields(key, &fields).map(Some)
}

fn check_list_membership(
    snapshot: &Snapshot,
    user_id: i64,
    key: &str,
    listed: &[String],
) -> VerifyCheck {
    let name = "relationship list";
    let mut expected: Vec<String> = snapshot
        .bookings_for_user(user_id)
        .map(|b: &Booking| b.id.to_string())
        .collect();
    let mut actual = listed.to_vec();
    expected.sort();
    actual.sort();

    if actual == expected {
        VerifyCheck::pass(name, key)
    } else {
        VerifyCheck::fail(
            name,
            key,
            format!("expected ids {:?}, found {:?}", expected, actual),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Hotel;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    fn snapshot() -> Snapshot {
        Snapshot {
            users: vec![
                User {
                    id: 2,
                    name: "Bob".into(),
                    email: "b@x.com".into(),
                    created_at: None,
                },
                User {
                    id: 1,
                    name: "Alice".into(),
                    email: "a@x.com".into(),
                    created_at: None,
                },
            ],
            hotels: vec![Hotel {
                id: 1,
                name: "Grand".into(),
                city: "Paris".into(),
                created_at: None,
            }],
            bookings: vec![Booking {
                id: 1,
                user_id: 2,
                hotel_id: 1,
                date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                created_at: None,
            }],
        }
    }

    async fn populate(store: &MemoryStore, snapshot: &Snapshot) {
        for user in &snapshot.users {
            store.set_fields(&user.key(), &user.to_fields()).await.unwrap();
            store.add_member(keys::USERS_ALL, &user.id.to_string()).await.unwrap();
        }
        for hotel in &snapshot.hotels {
            store.set_fields(&hotel.key(), &hotel.to_fields()).await.unwrap();
            store.add_member(keys::HOTELS_ALL, &hotel.id.to_string()).await.unwrap();
        }
        for booking in &snapshot.bookings {
            store.set_fields(&booking.key(), &booking.to_fields()).await.unwrap();
            store
                .push_front(&keys::user_bookings(booking.user_id), &booking.id.to_string())
                .await
                .unwrap();
            store
                .add_member(keys::BOOKINGS_ALL, &booking.id.to_string())
                .await
                .unwrap();
        }
    }

    #[test]
    fn test_sample_prefers_user_with_bookings() {
        let snapshot = snapshot();
        assert_eq!(sample_user(&snapshot).map(|u| u.id), Some(2));

        let mut no_bookings = snapshot.clone();
        no_bookings.bookings.clear();
        assert_eq!(sample_user(&no_bookings).map(|u| u.id), Some(1));

        assert!(sample_user(&Snapshot::default()).is_none());
    }

    #[tokio::test]
    async fn test_clean_store_passes() {
        let snapshot = snapshot();
        let store = MemoryStore::new();
        populate(&store, &snapshot).await;

        let report = verify(&store, &snapshot).await;
        assert_eq!(report.sampled_user, Some(2));
        // three index sizes, user, list, booking, hotel
        assert_eq!(report.checks.len(), 7);
        assert!(report.passed(), "{:?}", report.checks);
    }

    #[tokio::test]
    async fn test_mismatches_are_reported_not_raised() {
        let snapshot = snapshot();
        let store = MemoryStore::new();
        populate(&store, &snapshot).await;

        store.delete("hotel:1").await.unwrap();
        store
            .set_fields("user:2", &[("name".to_string(), "Robert".to_string())])
            .await
            .unwrap();
        store.add_member(keys::USERS_ALL, "99").await.unwrap();

        let report = verify(&store, &snapshot).await;
        assert!(!report.passed());

        let failed: Vec<&str> = report.failures().map(|c| c.key.as_str()).collect();
        assert!(failed.contains(&"hotel:1"));
        assert!(failed.contains(&"user:2"));
        assert!(failed.contains(&keys::USERS_ALL));
        assert!(!failed.contains(&"booking:1"));
    }

    #[tokio::test]
    async fn test_read_error_is_a_failed_check() {
        let snapshot = snapshot();
        let store = MemoryStore::new();
        populate(&store, &snapshot).await;

        store.delete("user:2:bookings").await.unwrap();
        store.set_scalar("user:2:bookings", "oops").await.unwrap();

        let report = verify(&store, &snapshot).await;
        let list_check = report
            .checks
            .iter()
            .find(|c| c.name == "relationship list")
            .unwrap();
        assert!(!list_check.passed);
        assert!(list_check.detail.as_deref().unwrap().contains("read failed"));
    }

    #[tokio::test]
    async fn test_empty_snapshot_checks_indexes_only() {
        let store = MemoryStore::new();
        let report = verify(&store, &Snapshot::default()).await;
        assert_eq!(report.checks.len(), 3);
        assert!(report.passed());
        assert_eq!(report.sampled_user, None);
    }
}
