//! Menu-driven querying on top of the query commands.

use dialoguer::{Input, Select};
use hotel_kv_migrate::{MigrateError, QueryEngine};

use crate::{run_query, QueryCommand};

const MENU: &[&str] = &[
    "User by id",
    "User by email",
    "User's bookings",
    "Hotel by id",
    "Hotels in a city",
    "Booking by id",
    "All users",
    "All hotels",
    "All bookings",
    "Key info",
    "Exit",
];

fn prompt_error(e: dialoguer::Error) -> MigrateError {
    MigrateError::Io(std::io::Error::other(e.to_string()))
}

fn ask_text(prompt: &str) -> Result<String, MigrateError> {
    Input::<String>::new()
        .with_prompt(prompt)
        .interact_text()
        .map_err(prompt_error)
}

fn ask_id(prompt: &str) -> Result<i64, MigrateError> {
    Input::<i64>::new()
        .with_prompt(prompt)
        .interact_text()
        .map_err(prompt_error)
}

/// Map a menu entry to a query, prompting for its argument.
fn prompt_query(selection: usize) -> Result<Option<QueryCommand>, MigrateError> {
    let query = match selection {
        0 => QueryCommand::User {
            id: ask_id("  User id")?,
        },
        1 => QueryCommand::Email {
            email: ask_text("  Email")?,
        },
        2 => QueryCommand::Bookings {
            user_id: ask_id("  User id")?,
        },
        3 => QueryCommand::Hotel {
            id: ask_id("  Hotel id")?,
        },
        4 => QueryCommand::City {
            city: ask_text("  City")?,
        },
        5 => QueryCommand::Booking {
            id: ask_id("  Booking id")?,
        },
        6 => QueryCommand::Users,
        7 => QueryCommand::Hotels,
        8 => QueryCommand::AllBookings,
        9 => QueryCommand::Key {
            key: ask_text("  Key")?,
        },
        _ => return Ok(None),
    };
    Ok(Some(query))
}

/// Loop over the menu until the user picks Exit.
pub async fn run(engine: &QueryEngine) -> Result<(), MigrateError> {
    loop {
        println!();
        let selection = Select::new()
            .with_prompt("What would you like to look up?")
            .items(MENU)
            .default(0)
            .interact()
            .map_err(prompt_error)?;

        let Some(query) = prompt_query(selection)? else {
            return Ok(());
        };

        println!();
        // A failed lookup is reported and the menu continues.
        if let Err(e) = run_query(engine, &query, false).await {
            eprintln!("{}", e.format_detailed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_entries_without_arguments() {
        assert_eq!(prompt_query(6).unwrap(), Some(QueryCommand::Users));
        assert_eq!(prompt_query(7).unwrap(), Some(QueryCommand::Hotels));
        assert_eq!(prompt_query(8).unwrap(), Some(QueryCommand::AllBookings));
        assert_eq!(prompt_query(MENU.len() - 1).unwrap(), None);
    }
}
