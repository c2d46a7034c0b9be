//! Driver dispatch macros.
//!
//! `Database` is generic over its driver, so code that only learns the
//! backend at runtime (from a connection string) needs one match arm per
//! driver. The macro below generates those arms, binding the concrete driver
//! to a name so the body can stay written once.

/// Run `$body` with `$driver` bound to the driver for `$db_type`.
///
/// Each arm is monomorphized separately, so `$body` may use the driver in
/// generic position.
///
/// # Example
///
/// ```ignore
/// let db_type = config.database_type()?;
/// dispatch_driver!(db_type, driver => {
///     let mut db = Database::new(driver, url, true);
///     db.execute_scalar("SELECT 1").await
/// })
/// ```
#[macro_export]
macro_rules! dispatch_driver {
    ($db_type:expr, $driver:ident => $body:expr) => {
        match $db_type {
            $crate::models::DatabaseType::SQLite => {
                let $driver = $crate::db::driver::SqliteDriver;
                $body
            }
            $crate::models::DatabaseType::PostgreSQL => {
                let $driver = $crate::db::driver::PostgresDriver;
                $body
            }
            $crate::models::DatabaseType::MySQL => {
                let $driver = $crate::db::driver::MySqlDriver;
                $body
            }
        }
    };
}

pub use dispatch_driver;
