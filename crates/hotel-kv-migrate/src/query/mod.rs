//! Relational-style reads over the key-value store.
//!
//! There are no joins: each query starts at one key, follows the ids it finds
//! there and reads the records they name. Every key read along the way is
//! recorded with its [`Placement`] in the returned [`Traced`] value. The
//! placements are diagnostics only and never change the answer.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::core::{keys, Booking, Hotel, Record, User};
use crate::error::{MigrateError, Result};
use crate::routing::{Placement, Router};
use crate::store::{self, KeyKind, KvStore};

/// A query answer plus the placement of every key read to produce it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Traced<T> {
    pub value: T,
    pub touched: Vec<Placement>,
}

/// A booking with its hotel, as listed in a user's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingEntry {
    pub booking: Booking,
    /// `None` when the hotel record is missing.
    pub hotel: Option<Hotel>,
}

/// A user and their bookings, in relationship-list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBookings {
    pub user: User,
    pub bookings: Vec<BookingEntry>,
}

/// A booking joined to its user and hotel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDetail {
    pub booking: Booking,
    pub user: Option<User>,
    pub hotel: Option<Hotel>,
}

/// Raw contents of a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum KeyContents {
    Missing,
    Hash(BTreeMap<String, String>),
    List(Vec<String>),
    /// Members sorted for display.
    Set(Vec<String>),
    String(String),
}

/// Everything known about one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    pub key: String,
    pub exists: bool,
    pub kind: Option<KeyKind>,
    pub contents: KeyContents,
    pub placement: Placement,
}

/// Collects placements while a query runs.
struct Trace<'a> {
    router: &'a Router,
    touched: Vec<Placement>,
}

impl<'a> Trace<'a> {
    fn new(router: &'a Router) -> Self {
        Self {
            router,
            touched: Vec::new(),
        }
    }

    fn touch(&mut self, key: &str) {
        let placement = self.router.placement(key);
        debug!("read {}", placement);
        self.touched.push(placement);
    }

    fn finish<T>(self, value: T) -> Traced<T> {
        Traced {
            value,
            touched: self.touched,
        }
    }
}

/// Sort set members numerically so listings are reproducible.
fn sorted_ids(key: &str, members: Vec<String>) -> Result<Vec<i64>> {
    let mut ids = members
        .iter()
        .map(|m| {
            m.parse::<i64>()
                .map_err(|e| MigrateError::decode(key, format!("member '{}': {}", m, e)))
        })
        .collect::<Result<Vec<_>>>()?;
    ids.sort_unstable();
    Ok(ids)
}

/// Read-only query layer.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn KvStore>,
    router: Router,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn KvStore>, router: Router) -> Self {
        Self { store, router }
    }

    /// Connect to the configured destination only; no source is needed to query.
    pub async fn connect(config: &Config) -> Result<Self> {
        let store = store::connect(&config.target, config.migration.connect_retry()).await?;
        let mut router = Router::from_config(&config.routing)?;
        if config.routing.live_topology {
            router.refresh(store.as_ref()).await;
        }
        Ok(Self::new(store, router))
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    async fn record<R: Record>(&self, trace: &mut Trace<'_>, key: &str) -> Result<Option<R>> {
        trace.touch(key);
        let fields: HashMap<String, String> = self.store.get_fields(key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        R::from_fields(key, &fields).map(Some)
    }

    async fn records<R: Record>(&self, trace: &mut Trace<'_>, index: &str) -> Result<Vec<R>> {
        trace.touch(index);
        let ids = sorted_ids(index, self.store.members(index).await?)?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let key = format!("{}:{}", R::ENTITY, id);
            match self.record::<R>(trace, &key).await? {
                Some(record) => records.push(record),
                None => warn!("{} lists {} but {} is missing", index, id, key),
            }
        }
        Ok(records)
    }

    /// Direct record lookup.
    pub async fn user_by_id(&self, id: i64) -> Result<Traced<Option<User>>> {
        let mut trace = Trace::new(&self.router);
        let user = self.record(&mut trace, &keys::user(id)).await?;
        Ok(trace.finish(user))
    }

    /// Email index, then the user record.
    pub async fn user_by_email(&self, email: &str) -> Result<Traced<Option<User>>> {
        let mut trace = Trace::new(&self.router);
        let index_key = keys::user_email(email);
        trace.touch(&index_key);

        let user = match self.store.get_scalar(&index_key).await? {
            Some(raw) => {
                let id = raw.parse::<i64>().map_err(|e| {
                    MigrateError::decode(&index_key, format!("user id '{}': {}", raw, e))
                })?;
                self.record(&mut trace, &keys::user(id)).await?
            }
            None => None,
        };
        Ok(trace.finish(user))
    }

    /// The user, their relationship list, each listed booking and its hotel.
    ///
    /// `None` if the user does not exist; a user without bookings yields an
    /// empty list.
    pub async fn user_bookings(&self, user_id: i64) -> Result<Traced<Option<UserBookings>>> {
        let mut trace = Trace::new(&self.router);
        let Some(user) = self.record::<User>(&mut trace, &keys::user(user_id)).await? else {
            return Ok(trace.finish(None));
        };

        let list_key = keys::user_bookings(user_id);
        trace.touch(&list_key);
        let listed = self.store.list_range(&list_key).await?;

        let mut bookings = Vec::with_capacity(listed.len());
        for raw in listed {
            let booking_key = keys::booking(&raw);
            let Some(booking) = self.record::<Booking>(&mut trace, &booking_key).await? else {
                warn!("{} lists {} but it is missing", list_key, booking_key);
                continue;
            };
            let hotel = self
                .record::<Hotel>(&mut trace, &keys::hotel(booking.hotel_id))
                .await?;
            bookings.push(BookingEntry { booking, hotel });
        }

        Ok(trace.finish(Some(UserBookings { user, bookings })))
    }

    pub async fn hotel_by_id(&self, id: i64) -> Result<Traced<Option<Hotel>>> {
        let mut trace = Trace::new(&self.router);
        let hotel = self.record(&mut trace, &keys::hotel(id)).await?;
        Ok(trace.finish(hotel))
    }

    /// Hotels in a city, sorted by id. Unknown cities yield an empty list.
    pub async fn hotels_by_city(&self, city: &str) -> Result<Traced<Vec<Hotel>>> {
        let mut trace = Trace::new(&self.router);
        let hotels = self.records(&mut trace, &keys::hotels_in_city(city)).await?;
        Ok(trace.finish(hotels))
    }

    /// The booking record, then its user and hotel.
    pub async fn booking_by_id(&self, id: i64) -> Result<Traced<Option<BookingDetail>>> {
        let mut trace = Trace::new(&self.router);
        let Some(booking) = self.record::<Booking>(&mut trace, &keys::booking(id)).await? else {
            return Ok(trace.finish(None));
        };

        let user = self.record(&mut trace, &keys::user(booking.user_id)).await?;
        let hotel = self.record(&mut trace, &keys::hotel(booking.hotel_id)).await?;
        Ok(trace.finish(Some(BookingDetail {
            booking,
            user,
            hotel,
        })))
    }

    pub async fn all_users(&self) -> Result<Traced<Vec<User>>> {
        let mut trace = Trace::new(&self.router);
        let users = self.records(&mut trace, keys::USERS_ALL).await?;
        Ok(trace.finish(users))
    }

    pub async fn all_hotels(&self) -> Result<Traced<Vec<Hotel>>> {
        let mut trace = Trace::new(&self.router);
        let hotels = self.records(&mut trace, keys::HOTELS_ALL).await?;
        Ok(trace.finish(hotels))
    }

    pub async fn all_bookings(&self) -> Result<Traced<Vec<Booking>>> {
        let mut trace = Trace::new(&self.router);
        let bookings = self.records(&mut trace, keys::BOOKINGS_ALL).await?;
        Ok(trace.finish(bookings))
    }

    /// Existence, primitive kind, raw contents and placement of any key.
    pub async fn key_info(&self, key: &str) -> Result<Traced<KeyInfo>> {
        let mut trace = Trace::new(&self.router);
        trace.touch(key);

        let kind = self.store.key_kind(key).await?;
        let contents = match kind {
            None => KeyContents::Missing,
            Some(KeyKind::Hash) => {
                KeyContents::Hash(self.store.get_fields(key).await?.into_iter().collect())
            }
            Some(KeyKind::List) => KeyContents::List(self.store.list_range(key).await?),
            Some(KeyKind::Set) => {
                let mut members = self.store.members(key).await?;
                members.sort();
                KeyContents::Set(members)
            }
            Some(KeyKind::String) => {
                KeyContents::String(self.store.get_scalar(key).await?.unwrap_or_default())
            }
        };

        let info = KeyInfo {
            key: key.to_string(),
            exists: kind.is_some(),
            kind,
            contents,
            placement: self.router.placement(key),
        };
        Ok(trace.finish(info))
    }
}
