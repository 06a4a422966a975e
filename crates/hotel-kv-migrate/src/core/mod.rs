//! Core types shared by every component.
//!
//! - [`record`]: typed Users/Hotels/Bookings rows and their text-field encoding
//! - [`keys`]: the key layout of the migrated dataset
//! - [`retry`]: bounded retry for connection establishment

pub mod keys;
pub mod record;
pub mod retry;

pub use record::{Booking, Hotel, Record, Snapshot, User, DATE_FORMAT};
pub use retry::ConnectRetry;
