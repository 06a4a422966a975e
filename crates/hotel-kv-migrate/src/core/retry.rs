//! Bounded retry for connection establishment.
//!
//! Only connecting is retried. Reads and writes issued once a connection
//! exists fail straight through to the caller.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{MigrateError, Result};

/// How many times to try connecting and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectRetry {
    pub attempts: u32,
    pub delay: Duration,
}

impl ConnectRetry {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// A single attempt with no delay.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Run `connect` until it succeeds or attempts are exhausted.
    ///
    /// The last underlying error is reported inside `MigrateError::Connection`.
    pub async fn run<T, E, F, Fut>(&self, target: &str, mut connect: F) -> Result<T>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let mut last_error = String::new();
        for attempt in 1..=self.attempts {
            match connect().await {
                Ok(conn) => {
                    if attempt > 1 {
                        debug!("Connected to {} on attempt {}", target, attempt);
                    }
                    return Ok(conn);
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < self.attempts {
                        warn!(
                            "Connection to {} failed (attempt {}/{}): {}",
                            target, attempt, self.attempts, last_error
                        );
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }
        Err(MigrateError::connection(target, self.attempts, last_error))
    }
}
