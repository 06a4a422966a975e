//! hotel-kv-migrate CLI - migrate the hotel booking dataset into a Redis cluster.

mod interactive;
mod output;

use clap::{Parser, Subcommand};
use hotel_kv_migrate::{Config, MigrateError, Orchestrator, QueryEngine, Router};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "hotel-kv-migrate")]
#[command(about = "Migrate Users/Hotels/Bookings into a sharded key-value store")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the source and write it to the key-value store
    Migrate {
        /// Dry run: read the source and show the planned writes without applying them
        #[arg(long)]
        dry_run: bool,
    },

    /// Query the migrated data
    Query {
        #[command(subcommand)]
        query: QueryCommand,
    },

    /// Menu-driven querying
    Interactive {
        /// Run the migration first, then open the menu on the same store
        #[arg(long)]
        migrate: bool,
    },

    /// Show the hash slot and static owner node of keys (offline)
    Slot {
        /// Keys to locate
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Test source and target connections
    HealthCheck,
}

#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub(crate) enum QueryCommand {
    /// User by id
    User { id: i64 },

    /// User by email, through the email index
    Email { email: String },

    /// A user's bookings with their hotels
    Bookings { user_id: i64 },

    /// Hotel by id
    Hotel { id: i64 },

    /// Hotels in a city
    City { city: String },

    /// Booking by id, with its user and hotel
    Booking { id: i64 },

    /// All users, sorted by id
    Users,

    /// All hotels, sorted by id
    Hotels,

    /// All bookings, sorted by id
    AllBookings,

    /// Type, contents and placement of any key
    Key { key: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    // Slot lookups are offline; a config file only contributes node labels.
    if let Commands::Slot { keys } = &cli.command {
        return locate_keys(&cli.config, keys, cli.output_json);
    }

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Slot { .. } => unreachable!(), // Handled above
        Commands::Migrate { dry_run } => {
            let orchestrator = Orchestrator::new(config).await?;

            if dry_run {
                let plan = orchestrator.plan_only().await?;
                if cli.output_json {
                    print_json(&plan)?;
                } else {
                    output::print_plan(&plan);
                }
            } else {
                let result = orchestrator.run().await?;
                if cli.output_json {
                    println!("{}", result.to_json()?);
                } else {
                    output::print_result(&result);
                }
            }

            orchestrator.close().await;
        }

        Commands::Query { query } => {
            let engine = QueryEngine::connect(&config).await?;
            run_query(&engine, &query, cli.output_json).await?;
        }

        Commands::Interactive { migrate } => {
            let engine = if migrate {
                let orchestrator = Orchestrator::new(config).await?;
                let result = orchestrator.run().await?;
                output::print_result(&result);
                orchestrator.close().await;
                orchestrator.query_engine()
            } else {
                QueryEngine::connect(&config).await?
            };
            interactive::run(&engine).await?;
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::new(config).await?;
            let result = orchestrator.health_check().await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                output::print_health(&result);
            }

            if let Some(err) = &result.source_error {
                return Err(MigrateError::connection(&result.source_type, 1, err));
            }
            if let Some(err) = &result.target_error {
                return Err(MigrateError::connection(&result.target_type, 1, err));
            }
        }
    }

    Ok(())
}

/// Run one query and print its answer with the placement of every key read.
pub(crate) async fn run_query(
    engine: &QueryEngine,
    query: &QueryCommand,
    json: bool,
) -> Result<(), MigrateError> {
    match query {
        QueryCommand::User { id } => {
            let traced = engine.user_by_id(*id).await?;
            if json {
                return print_json(&traced);
            }
            output::print_optional(&traced, &format!("User {}", id), output::user_line);
        }
        QueryCommand::Email { email } => {
            let traced = engine.user_by_email(email).await?;
            if json {
                return print_json(&traced);
            }
            output::print_optional(
                &traced,
                &format!("User with email {}", email),
                output::user_line,
            );
        }
        QueryCommand::Bookings { user_id } => {
            let traced = engine.user_bookings(*user_id).await?;
            if json {
                return print_json(&traced);
            }
            output::print_user_bookings(&traced, *user_id);
        }
        QueryCommand::Hotel { id } => {
            let traced = engine.hotel_by_id(*id).await?;
            if json {
                return print_json(&traced);
            }
            output::print_optional(&traced, &format!("Hotel {}", id), output::hotel_line);
        }
        QueryCommand::City { city } => {
            let traced = engine.hotels_by_city(city).await?;
            if json {
                return print_json(&traced);
            }
            output::print_list(
                &traced,
                &format!("No hotels in {}", city),
                output::hotel_line,
            );
        }
        QueryCommand::Booking { id } => {
            let traced = engine.booking_by_id(*id).await?;
            if json {
                return print_json(&traced);
            }
            output::print_booking_detail(&traced, *id);
        }
        QueryCommand::Users => {
            let traced = engine.all_users().await?;
            if json {
                return print_json(&traced);
            }
            output::print_list(&traced, "No users", output::user_line);
        }
        QueryCommand::Hotels => {
            let traced = engine.all_hotels().await?;
            if json {
                return print_json(&traced);
            }
            output::print_list(&traced, "No hotels", output::hotel_line);
        }
        QueryCommand::AllBookings => {
            let traced = engine.all_bookings().await?;
            if json {
                return print_json(&traced);
            }
            output::print_list(&traced, "No bookings", output::booking_line);
        }
        QueryCommand::Key { key } => {
            let traced = engine.key_info(key).await?;
            if json {
                return print_json(&traced.value);
            }
            output::print_key_info(&traced.value);
        }
    }
    Ok(())
}

fn locate_keys(config_path: &Path, keys: &[String], json: bool) -> Result<(), MigrateError> {
    let router = if config_path.exists() {
        Router::from_config(&Config::load(config_path)?.routing)?
    } else {
        Router::default()
    };

    let placements: Vec<_> = keys.iter().map(|k| router.static_placement(k)).collect();
    if json {
        return print_json(&placements);
    }
    for placement in &placements {
        println!("{}", placement);
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), MigrateError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so --output-json stays parseable.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format '{}'", other)),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_query_subcommands() {
        let cli = Cli::parse_from(["hotel-kv-migrate", "query", "email", "a@x.com"]);
        match cli.command {
            Commands::Query { query } => assert_eq!(
                query,
                QueryCommand::Email {
                    email: "a@x.com".into()
                }
            ),
            _ => panic!("expected query"),
        }

        let cli = Cli::parse_from(["hotel-kv-migrate", "query", "all-bookings"]);
        assert!(matches!(
            cli.command,
            Commands::Query {
                query: QueryCommand::AllBookings
            }
        ));
    }

    #[test]
    fn test_slot_requires_a_key() {
        assert!(Cli::try_parse_from(["hotel-kv-migrate", "slot"]).is_err());
    }
}
