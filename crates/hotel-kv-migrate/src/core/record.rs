//! Typed relational entities and their flat text-field encoding.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::keys;
use crate::error::{MigrateError, Result};

/// Date format used for booking dates in both stores.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A row that maps onto one hash record in the key-value store.
///
/// `to_fields` and `from_fields` are the only place where field names are
/// spelled out; everything else works with the typed struct.
pub trait Record: Sized {
    /// Entity name used as the key prefix (`user`, `hotel`, `booking`).
    const ENTITY: &'static str;

    /// Primary key.
    fn id(&self) -> i64;

    /// Key of the hash record.
    fn key(&self) -> String {
        format!("{}:{}", Self::ENTITY, self.id())
    }

    /// Encode every field as text, in a stable order.
    fn to_fields(&self) -> Vec<(String, String)>;

    /// Decode a record previously written by `to_fields`.
    fn from_fields(key: &str, fields: &HashMap<String, String>) -> Result<Self>;
}

/// Users row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Hotels row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotel {
    pub id: i64,
    pub name: String,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Bookings row. `user_id` and `hotel_id` are the foreign keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub hotel_id: i64,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// One complete, point-in-time read of the three source tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub hotels: Vec<Hotel>,
    #[serde(default)]
    pub bookings: Vec<Booking>,
}

impl Snapshot {
    /// Total number of rows across all tables.
    pub fn row_count(&self) -> usize {
        self.users.len() + self.hotels.len() + self.bookings.len()
    }

    /// Bookings owned by a user, in snapshot order.
    pub fn bookings_for_user(&self, user_id: i64) -> impl Iterator<Item = &Booking> {
        self.bookings.iter().filter(move |b| b.user_id == user_id)
    }
}

fn push_created_at(fields: &mut Vec<(String, String)>, created_at: &Option<String>) {
    if let Some(ts) = created_at {
        fields.push(("created_at".to_string(), ts.clone()));
    }
}

fn required<'a>(key: &str, fields: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| MigrateError::decode(key, format!("missing field '{}'", name)))
}

fn required_id(key: &str, fields: &HashMap<String, String>, name: &str) -> Result<i64> {
    let raw = required(key, fields, name)?;
    raw.parse::<i64>()
        .map_err(|e| MigrateError::decode(key, format!("field '{}' = '{}': {}", name, raw, e)))
}

/// Parse a `YYYY-MM-DD` date, as stored in both the source and the hash records.
pub fn parse_date(key: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| MigrateError::decode(key, format!("date '{}': {}", raw, e)))
}

impl Record for User {
    const ENTITY: &'static str = "user";

    fn id(&self) -> i64 {
        self.id
    }

    fn key(&self) -> String {
        keys::user(self.id)
    }

    fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("id".to_string(), self.id.to_string()),
            ("name".to_string(), self.name.clone()),
            ("email".to_string(), self.email.clone()),
        ];
        push_created_at(&mut fields, &self.created_at);
        fields
    }

    fn from_fields(key: &str, fields: &HashMap<String, String>) -> Result<Self> {
        Ok(Self {
            id: required_id(key, fields, "id")?,
            name: required(key, fields, "name")?.to_string(),
            email: required(key, fields, "email")?.to_string(),
            created_at: fields.get("created_at").cloned(),
        })
    }
}

impl Record for Hotel {
    const ENTITY: &'static str = "hotel";

    fn id(&self) -> i64 {
        self.id
    }

    fn key(&self) -> String {
        keys::hotel(self.id)
    }

    fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("id".to_string(), self.id.to_string()),
            ("name".to_string(), self.name.clone()),
            ("city".to_string(), self.city.clone()),
        ];
        push_created_at(&mut fields, &self.created_at);
        fields
    }

    fn from_fields(key: &str, fields: &HashMap<String, String>) -> Result<Self> {
        Ok(Self {
            id: required_id(key, fields, "id")?,
            name: required(key, fields, "name")?.to_string(),
            city: required(key, fields, "city")?.to_string(),
            created_at: fields.get("created_at").cloned(),
        })
    }
}

impl Record for Booking {
    const ENTITY: &'static str = "booking";

    fn id(&self) -> i64 {
        self.id
    }

    fn key(&self) -> String {
        keys::booking(self.id)
    }

    fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("id".to_string(), self.id.to_string()),
            ("user_id".to_string(), self.user_id.to_string()),
            ("hotel_id".to_string(), self.hotel_id.to_string()),
            ("date".to_string(), self.date.format(DATE_FORMAT).to_string()),
        ];
        push_created_at(&mut fields, &self.created_at);
        fields
    }

    fn from_fields(key: &str, fields: &HashMap<String, String>) -> Result<Self> {
        Ok(Self {
            id: required_id(key, fields, "id")?,
            user_id: required_id(key, fields, "user_id")?,
            hotel_id: required_id(key, fields, "hotel_id")?,
            date: parse_date(key, required(key, fields, "date")?)?,
            created_at: fields.get("created_at").cloned(),
        })
    }
}
