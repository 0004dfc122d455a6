/// Database layer
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool with health checks
/// - `migrations`: embedded migration runner
/// - `seed`: demo users and tasks for development databases
///
/// Models and their repository operations live in the crate-level `models`
/// module.
///
/// # Example
///
/// ```no_run
/// use taskmm_shared::db::pool::{create_pool, DatabaseConfig};
/// use taskmm_shared::db::{migrations, seed};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     };
///
///     let pool = create_pool(&config).await?;
///     migrations::run_migrations(&pool).await?;
///     seed::seed(&pool).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
pub mod seed;
