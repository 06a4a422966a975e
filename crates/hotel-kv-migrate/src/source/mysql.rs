//! MySQL/MariaDB snapshot reader.
//!
//! Uses SQLx for the connection pool. Every column is cast to a signed
//! integer or text on the server, so decoding does not depend on the exact
//! column types of the source schema.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlSslMode};
use tracing::{debug, info};

use super::SnapshotReader;
use crate::config::SourceConfig;
use crate::core::record::parse_date;
use crate::core::{keys, Booking, ConnectRetry, Hotel, Snapshot, User};
use crate::error::Result;

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Snapshot reads are sequential; two connections cover reads plus ping.
const POOL_MAX_CONNECTIONS: u32 = 2;

type UserRow = (i64, String, String, Option<String>);
type HotelRow = (i64, String, String, Option<String>);
type BookingRow = (i64, i64, i64, String, Option<String>);

/// MySQL source reader.
pub struct MysqlReader {
    pool: MySqlPool,
    include_created_at: bool,
}

impl MysqlReader {
    /// Connect, retrying per `retry` until the server answers `SELECT 1`.
    pub async fn connect(config: &SourceConfig, retry: ConnectRetry) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(MySqlSslMode::Preferred);

        let target = config.describe();
        let pool = retry
            .run(&target, || {
                let options = options.clone();
                async move {
                    let pool = MySqlPoolOptions::new()
                        .max_connections(POOL_MAX_CONNECTIONS)
                        .acquire_timeout(POOL_CONNECTION_TIMEOUT)
                        .connect_with(options)
                        .await?;
                    sqlx::query("SELECT 1").execute(&pool).await?;
                    Ok::<_, sqlx::Error>(pool)
                }
            })
            .await?;

        info!("Connected to {}", target);

        Ok(Self {
            pool,
            include_created_at: config.include_created_at,
        })
    }

    fn created_at_column(&self) -> &'static str {
        if self.include_created_at {
            "CAST(created_at AS CHAR)"
        } else {
            "CAST(NULL AS CHAR)"
        }
    }

    async fn read_users(&self) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT CAST(id AS SIGNED), CAST(name AS CHAR), CAST(email AS CHAR), {} \
             FROM Users ORDER BY id",
            self.created_at_column()
        );
        let rows: Vec<UserRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        debug!("Users: {} rows", rows.len());

        Ok(rows
            .into_iter()
            .map(|(id, name, email, created_at)| User {
                id,
                name,
                email,
                created_at,
            })
            .collect())
    }

    async fn read_hotels(&self) -> Result<Vec<Hotel>> {
        let sql = format!(
            "SELECT CAST(id AS SIGNED), CAST(name AS CHAR), CAST(city AS CHAR), {} \
             FROM Hotels ORDER BY id",
            self.created_at_column()
        );
        let rows: Vec<HotelRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        debug!("Hotels: {} rows", rows.len());

        Ok(rows
            .into_iter()
            .map(|(id, name, city, created_at)| Hotel {
                id,
                name,
                city,
                created_at,
            })
            .collect())
    }

    async fn read_bookings(&self) -> Result<Vec<Booking>> {
        let sql = format!(
            "SELECT CAST(id AS SIGNED), CAST(user_id AS SIGNED), CAST(hotel_id AS SIGNED), \
             CAST(date AS CHAR), {} FROM Bookings ORDER BY id",
            self.created_at_column()
        );
        let rows: Vec<BookingRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        debug!("Bookings: {} rows", rows.len());

        rows.into_iter()
            .map(|(id, user_id, hotel_id, date, created_at)| {
                Ok(Booking {
                    id,
                    user_id,
                    hotel_id,
                    date: parse_date(&keys::booking(id), &date)?,
                    created_at,
                })
            })
            .collect()
    }
}

#[async_trait]
impl SnapshotReader for MysqlReader {
    async fn read_snapshot(&self) -> Result<Snapshot> {
        let snapshot = Snapshot {
            users: self.read_users().await?,
            hotels: self.read_hotels().await?,
            bookings: self.read_bookings().await?,
        };
        info!(
            "Read snapshot: {} users, {} hotels, {} bookings",
            snapshot.users.len(),
            snapshot.hotels.len(),
            snapshot.bookings.len()
        );
        Ok(snapshot)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn source_type(&self) -> &str {
        "mysql"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
