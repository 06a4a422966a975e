//! Relational to key-value mapping.
//!
//! [`Mapper::plan`] turns a [`Snapshot`] into the complete, ordered list of
//! writes that represent it in the key-value store. Planning never touches a
//! store; applying the plan is the orchestrator's job.
//!
//! | Relational concept      | Key-value form                         |
//! |-------------------------|----------------------------------------|
//! | row                     | hash `{entity}:{id}`                   |
//! | Bookings.user_id FK     | list `user:{id}:bookings`              |
//! | table membership        | set `{entities}:all`                   |
//! | UNIQUE(email)           | string `user:email:{email}`            |
//! | non-unique city / date  | set `hotels:city:{city}` etc.          |

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{MigrationConfig, RelationshipOrder};
use crate::core::{keys, Booking, Hotel, Record, Snapshot, User};
use crate::routing::{Placement, Router};

/// Entity a write belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Hotel,
    Booking,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::User => "user",
            EntityKind::Hotel => "hotel",
            EntityKind::Booking => "booking",
        })
    }
}

/// A single store operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WriteOp {
    /// Upsert hash fields.
    SetFields {
        key: String,
        fields: Vec<(String, String)>,
    },
    /// Remove a key before it is rebuilt.
    Delete { key: String },
    /// Prepend to a list.
    PushFront { key: String, value: String },
    /// Add to a set.
    AddMember { key: String, member: String },
    /// Set a plain string.
    SetScalar { key: String, value: String },
}

impl WriteOp {
    /// Short operation name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            WriteOp::SetFields { .. } => "set_fields",
            WriteOp::Delete { .. } => "delete",
            WriteOp::PushFront { .. } => "push_front",
            WriteOp::AddMember { .. } => "add_member",
            WriteOp::SetScalar { .. } => "set_scalar",
        }
    }

    pub fn key(&self) -> &str {
        match self {
            WriteOp::SetFields { key, .. }
            | WriteOp::Delete { key }
            | WriteOp::PushFront { key, .. }
            | WriteOp::AddMember { key, .. }
            | WriteOp::SetScalar { key, .. } => key,
        }
    }
}

/// A write together with where its key lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedWrite {
    pub op: WriteOp,
    pub placement: Placement,
}

/// Every write needed for one source row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityWrites {
    pub kind: EntityKind,
    pub id: i64,
    pub writes: Vec<PlannedWrite>,
}

/// Ordered writes for a whole snapshot: Users, then Hotels, then Bookings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub entities: Vec<EntityWrites>,
    /// Integrity hazards found while planning.
    pub warnings: Vec<String>,
}

impl MigrationPlan {
    /// All writes in execution order.
    pub fn writes(&self) -> impl Iterator<Item = &PlannedWrite> {
        self.entities.iter().flat_map(|e| e.writes.iter())
    }

    pub fn write_count(&self) -> usize {
        self.entities.iter().map(|e| e.writes.len()).sum()
    }

    /// Number of entities of one kind.
    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities.iter().filter(|e| e.kind == kind).count()
    }

    /// Writes per owning node.
    pub fn node_distribution(&self) -> HashMap<String, usize> {
        let mut dist = HashMap::new();
        for write in self.writes() {
            *dist.entry(write.placement.primary.clone()).or_insert(0) += 1;
        }
        dist
    }
}

/// Mapping options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapperOptions {
    pub relationship_order: RelationshipOrder,
    pub reset_relationship_lists: bool,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            relationship_order: RelationshipOrder::BookingId,
            reset_relationship_lists: true,
        }
    }
}

impl From<&MigrationConfig> for MapperOptions {
    fn from(config: &MigrationConfig) -> Self {
        Self {
            relationship_order: config.relationship_order,
            reset_relationship_lists: config.reset_relationship_lists,
        }
    }
}

/// Builds migration plans.
pub struct Mapper<'a> {
    router: &'a Router,
    options: MapperOptions,
}

impl<'a> Mapper<'a> {
    pub fn new(router: &'a Router, options: MapperOptions) -> Self {
        Self { router, options }
    }

    /// Plan the writes for a snapshot.
    pub fn plan(&self, snapshot: &Snapshot) -> MigrationPlan {
        let mut plan = MigrationPlan::default();
        plan.entities.reserve(snapshot.row_count());

        let mut emails: HashMap<&str, i64> = HashMap::new();
        for user in &snapshot.users {
            if let Some(previous) = emails.insert(user.email.as_str(), user.id) {
                let msg = format!(
                    "users {} and {} share email '{}'; {} will win the email index",
                    previous,
                    user.id,
                    user.email,
                    keys::user_email(&user.email)
                );
                warn!("{}", msg);
                plan.warnings.push(msg);
            }
            plan.entities.push(self.user_writes(user));
        }

        for hotel in &snapshot.hotels {
            plan.entities.push(self.hotel_writes(hotel));
        }

        let user_ids: HashSet<i64> = snapshot.users.iter().map(|u| u.id).collect();
        let hotel_ids: HashSet<i64> = snapshot.hotels.iter().map(|h| h.id).collect();

        // Lists already cleared by their user's writes.
        let mut reset_owners: HashSet<i64> = if self.options.reset_relationship_lists {
            user_ids.clone()
        } else {
            HashSet::new()
        };

        for booking in self.ordered_bookings(snapshot) {
            if !user_ids.contains(&booking.user_id) {
                let msg = format!(
                    "booking {} references missing user {}",
                    booking.id, booking.user_id
                );
                warn!("{}", msg);
                plan.warnings.push(msg);
            }
            if !hotel_ids.contains(&booking.hotel_id) {
                let msg = format!(
                    "booking {} references missing hotel {}",
                    booking.id, booking.hotel_id
                );
                warn!("{}", msg);
                plan.warnings.push(msg);
            }
            let reset_list =
                self.options.reset_relationship_lists && reset_owners.insert(booking.user_id);
            plan.entities.push(self.booking_writes(booking, reset_list));
        }

        debug!(
            "Planned {} writes for {} entities",
            plan.write_count(),
            plan.entities.len()
        );
        plan
    }

    fn ordered_bookings<'s>(&self, snapshot: &'s Snapshot) -> Vec<&'s Booking> {
        let mut bookings: Vec<&Booking> = snapshot.bookings.iter().collect();
        if self.options.relationship_order == RelationshipOrder::BookingId {
            bookings.sort_by_key(|b| b.id);
        }
        bookings
    }

    fn write(&self, op: WriteOp) -> PlannedWrite {
        let placement = self.router.placement(op.key());
        PlannedWrite { op, placement }
    }

    fn user_writes(&self, user: &User) -> EntityWrites {
        let id = user.id.to_string();
        let mut writes = vec![self.write(WriteOp::SetFields {
            key: user.key(),
            fields: user.to_fields(),
        })];
        if self.options.reset_relationship_lists {
            writes.push(self.write(WriteOp::Delete {
                key: keys::user_bookings(user.id),
            }));
        }
        writes.push(self.write(WriteOp::AddMember {
            key: keys::USERS_ALL.to_string(),
            member: id.clone(),
        }));
        writes.push(self.write(WriteOp::SetScalar {
            key: keys::user_email(&user.email),
            value: id,
        }));

        EntityWrites {
            kind: EntityKind::User,
            id: user.id,
            writes,
        }
    }

    fn hotel_writes(&self, hotel: &Hotel) -> EntityWrites {
        let id = hotel.id.to_string();
        let writes = vec![
            self.write(WriteOp::SetFields {
                key: hotel.key(),
                fields: hotel.to_fields(),
            }),
            self.write(WriteOp::AddMember {
                key: keys::HOTELS_ALL.to_string(),
                member: id.clone(),
            }),
            self.write(WriteOp::AddMember {
                key: keys::hotels_in_city(&hotel.city),
                member: id,
            }),
        ];

        EntityWrites {
            kind: EntityKind::Hotel,
            id: hotel.id,
            writes,
        }
    }

    /// `reset_list` clears the owner's list first; set for the first booking
    /// of an owner with no user row, whose list nothing else resets.
    fn booking_writes(&self, booking: &Booking, reset_list: bool) -> EntityWrites {
        let id = booking.id.to_string();
        let list_key = keys::user_bookings(booking.user_id);
        let mut writes = vec![self.write(WriteOp::SetFields {
            key: booking.key(),
            fields: booking.to_fields(),
        })];
        if reset_list {
            writes.push(self.write(WriteOp::Delete {
                key: list_key.clone(),
            }));
        }
        writes.push(self.write(WriteOp::PushFront {
            key: list_key,
            value: id.clone(),
        }));
        writes.push(self.write(WriteOp::AddMember {
            key: keys::BOOKINGS_ALL.to_string(),
            member: id.clone(),
        }));
        writes.push(self.write(WriteOp::AddMember {
            key: keys::bookings_on_date(booking.date),
            member: id,
        }));

        EntityWrites {
            kind: EntityKind::Booking,
            id: booking.id,
            writes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn user(id: i64, name: &str, email: &str) -> User {
        User {
            id,
            name: name.into(),
            email: email.into(),
            created_at: None,
        }
    }

    fn booking(id: i64, user_id: i64, hotel_id: i64, d: &str) -> Booking {
        Booking {
            id,
            user_id,
            hotel_id,
            date: date(d),
            created_at: None,
        }
    }

    fn scenario() -> Snapshot {
        Snapshot {
            users: vec![user(1, "Alice", "a@x.com")],
            hotels: vec![Hotel {
                id: 1,
                name: "Grand".into(),
                city: "Paris".into(),
                created_at: None,
            }],
            bookings: vec![booking(1, 1, 1, "2024-05-01")],
        }
    }

    fn ops(plan: &MigrationPlan) -> Vec<&WriteOp> {
        plan.writes().map(|w| &w.op).collect()
    }

    #[test]
    fn test_plan_for_single_booking() {
        let router = Router::default();
        let plan = Mapper::new(&router, MapperOptions::default()).plan(&scenario());

        assert!(plan.warnings.is_empty());
        assert_eq!(plan.count(EntityKind::User), 1);
        assert_eq!(plan.count(EntityKind::Hotel), 1);
        assert_eq!(plan.count(EntityKind::Booking), 1);

        let kinds: Vec<EntityKind> = plan.entities.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EntityKind::User, EntityKind::Hotel, EntityKind::Booking]
        );

        let ops = ops(&plan);
        assert_eq!(
            ops[0],
            &WriteOp::SetFields {
                key: "user:1".into(),
                fields: vec![
                    ("id".into(), "1".into()),
                    ("name".into(), "Alice".into()),
                    ("email".into(), "a@x.com".into()),
                ],
            }
        );
        assert_eq!(
            ops[1],
            &WriteOp::Delete {
                key: "user:1:bookings".into()
            }
        );
        assert!(ops.contains(&&WriteOp::SetScalar {
            key: "user:email:a@x.com".into(),
            value: "1".into()
        }));
        assert!(ops.contains(&&WriteOp::AddMember {
            key: "hotels:city:Paris".into(),
            member: "1".into()
        }));
        assert!(ops.contains(&&WriteOp::PushFront {
            key: "user:1:bookings".into(),
            value: "1".into()
        }));
        assert!(ops.contains(&&WriteOp::AddMember {
            key: "bookings:date:2024-05-01".into(),
            member: "1".into()
        }));
        assert_eq!(plan.write_count(), 4 + 3 + 4);
    }

    #[test]
    fn test_every_write_carries_its_placement() {
        let router = Router::default();
        let plan = Mapper::new(&router, MapperOptions::default()).plan(&scenario());
        for write in plan.writes() {
            assert_eq!(write.placement.key, write.op.key());
            assert_eq!(write.placement, router.placement(write.op.key()));
        }

        let dist = plan.node_distribution();
        assert_eq!(dist.values().sum::<usize>(), plan.write_count());
    }

    #[test]
    fn test_booking_id_order_sorts_bookings() {
        let router = Router::default();
        let mut snapshot = scenario();
        snapshot.bookings = vec![
            booking(3, 1, 1, "2024-05-03"),
            booking(1, 1, 1, "2024-05-01"),
            booking(2, 1, 1, "2024-05-02"),
        ];

        let plan = Mapper::new(&router, MapperOptions::default()).plan(&snapshot);
        let pushed: Vec<&str> = plan
            .writes()
            .filter_map(|w| match &w.op {
                WriteOp::PushFront { value, .. } => Some(value.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(pushed, vec!["1", "2", "3"]);

        let options = MapperOptions {
            relationship_order: RelationshipOrder::Source,
            ..MapperOptions::default()
        };
        let plan = Mapper::new(&router, options).plan(&snapshot);
        let pushed: Vec<&str> = plan
            .writes()
            .filter_map(|w| match &w.op {
                WriteOp::PushFront { value, .. } => Some(value.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(pushed, vec!["3", "1", "2"]);
    }

    #[test]
    fn test_no_reset_without_option() {
        let router = Router::default();
        let options = MapperOptions {
            reset_relationship_lists: false,
            ..MapperOptions::default()
        };
        let plan = Mapper::new(&router, options).plan(&scenario());
        assert!(!plan
            .writes()
            .any(|w| matches!(w.op, WriteOp::Delete { .. })));
    }

    #[test]
    fn test_duplicate_email_is_warned() {
        let router = Router::default();
        let mut snapshot = scenario();
        snapshot.users.push(user(2, "Alicia", "a@x.com"));

        let plan = Mapper::new(&router, MapperOptions::default()).plan(&snapshot);
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.warnings[0].contains("a@x.com"));

        // Both users still map; the later one owns the index entry.
        let email_writes: Vec<&str> = plan
            .writes()
            .filter_map(|w| match &w.op {
                WriteOp::SetScalar { value, .. } => Some(value.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(email_writes, vec!["1", "2"]);
    }

    #[test]
    fn test_orphaned_booking_is_warned() {
        let router = Router::default();
        let mut snapshot = scenario();
        snapshot.bookings.push(booking(2, 9, 8, "2024-06-01"));

        let plan = Mapper::new(&router, MapperOptions::default()).plan(&snapshot);
        assert_eq!(plan.warnings.len(), 2);
        assert!(plan.warnings.iter().any(|w| w.contains("missing user 9")));
        assert!(plan.warnings.iter().any(|w| w.contains("missing hotel 8")));
        assert_eq!(plan.count(EntityKind::Booking), 2);
    }

    #[test]
    fn test_orphan_owner_list_is_reset_once() {
        let router = Router::default();
        let mut snapshot = scenario();
        snapshot.bookings.push(booking(3, 9, 1, "2024-06-02"));
        snapshot.bookings.push(booking(2, 9, 1, "2024-06-01"));

        let plan = Mapper::new(&router, MapperOptions::default()).plan(&snapshot);
        let list_ops: Vec<&WriteOp> = plan
            .writes()
            .map(|w| &w.op)
            .filter(|op| op.key() == "user:9:bookings")
            .collect();
        assert_eq!(
            list_ops,
            vec![
                &WriteOp::Delete {
                    key: "user:9:bookings".into()
                },
                &WriteOp::PushFront {
                    key: "user:9:bookings".into(),
                    value: "2".into()
                },
                &WriteOp::PushFront {
                    key: "user:9:bookings".into(),
                    value: "3".into()
                },
            ]
        );

        // Owners with a user row are reset by the user's writes only.
        let deletes = plan
            .writes()
            .filter(|w| w.op == WriteOp::Delete { key: "user:1:bookings".into() })
            .count();
        assert_eq!(deletes, 1);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let router = Router::default();
        let mapper = Mapper::new(&router, MapperOptions::default());
        let a: Vec<PlannedWrite> = mapper.plan(&scenario()).writes().cloned().collect();
        let b: Vec<PlannedWrite> = mapper.plan(&scenario()).writes().cloned().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_snapshot() {
        let router = Router::default();
        let plan = Mapper::new(&router, MapperOptions::default()).plan(&Snapshot::default());
        assert_eq!(plan.write_count(), 0);
        assert!(plan.entities.is_empty());
    }
}
