//! DB Helper - Main entry point.
//!
//! Inserts a set of users through a stored procedure inside one transaction,
//! using a singleton `Database`, and prints the id returned by the last call.

use db_helper::config::{Config, UserRecord};
use db_helper::dispatch_driver;
use db_helper::{CommandRequest, Database, DbResult, Driver, Parameter, Value};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Run the procedure once per parameter set and return the last result.
async fn call_procedure<D: Driver>(
    database: &mut Database<D>,
    procedure: &str,
    parameter_sets: Vec<Vec<Parameter>>,
) -> DbResult<Option<Value>> {
    let mut last = None;
    for parameters in parameter_sets {
        let request = CommandRequest::stored_procedure(procedure).with_parameters(parameters);
        last = database.execute_scalar(request).await?;
    }
    Ok(last)
}

async fn insert_users<D: Driver>(
    database: &mut Database<D>,
    procedure: &str,
    users: &[UserRecord],
) -> DbResult<Option<Value>> {
    let mut parameter_sets = Vec::with_capacity(users.len());
    for user in users {
        parameter_sets.push(database.get_parameters(user.to_parameters())?);
    }

    let transaction = database.begin_transaction().await?;
    info!(transaction_id = %transaction.id(), count = users.len(), "Inserting users");

    match call_procedure(database, procedure, parameter_sets).await {
        Ok(last_id) => {
            database.commit_transaction().await?;
            database.get_connection()?.close().await?;
            Ok(last_id)
        }
        Err(e) => {
            error!(error = %e, "Insert failed, rolling back");
            if let Err(rollback_err) = database.rollback_transaction().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    // Initialize logging
    init_tracing(&config);

    let db_config = config.database_config()?;
    let users = config.users()?;
    let db_type = db_config.database_type()?;

    info!(
        database_type = %db_type,
        connection = %db_config.masked_connection_string(),
        procedure = %config.procedure,
        "Starting DB Helper v{}",
        env!("CARGO_PKG_VERSION")
    );

    let last_id = dispatch_driver!(db_type, driver => {
        let mut database = Database::from_config(driver, &db_config);
        let result = insert_users(&mut database, &config.procedure, &users).await;
        database.dispose().await;
        result
    })?;

    match last_id {
        Some(id) => println!("{id}"),
        None => println!("Procedure returned no rows"),
    }
    Ok(())
}
