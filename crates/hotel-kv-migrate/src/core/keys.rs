//! Key layout of the migrated dataset.
//!
//! | Key                      | Primitive | Contents                         |
//! |--------------------------|-----------|----------------------------------|
//! | `user:{id}`              | hash      | user fields                      |
//! | `hotel:{id}`             | hash      | hotel fields                     |
//! | `booking:{id}`           | hash      | booking fields                   |
//! | `user:{id}:bookings`     | list      | booking ids, newest prepended    |
//! | `users:all` etc.         | set       | every id of the entity           |
//! | `user:email:{email}`     | string    | user id                          |
//! | `hotels:city:{city}`     | set       | hotel ids in the city            |
//! | `bookings:date:{date}`   | set       | booking ids on the date          |

use std::fmt::Display;

pub const USERS_ALL: &str = "users:all";
pub const HOTELS_ALL: &str = "hotels:all";
pub const BOOKINGS_ALL: &str = "bookings:all";

pub fn user(id: impl Display) -> String {
    format!("user:{}", id)
}

pub fn hotel(id: impl Display) -> String {
    format!("hotel:{}", id)
}

pub fn booking(id: impl Display) -> String {
    format!("booking:{}", id)
}

pub fn user_bookings(user_id: impl Display) -> String {
    format!("user:{}:bookings", user_id)
}

pub fn user_email(email: &str) -> String {
    format!("user:email:{}", email)
}

pub fn hotels_in_city(city: &str) -> String {
    format!("hotels:city:{}", city)
}

pub fn bookings_on_date(date: impl Display) -> String {
    format!("bookings:date:{}", date)
}
