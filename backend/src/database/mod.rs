//! Database connection pool, migrations and health probing.

pub mod pool;

pub use pool::{
    create_lazy_pool, create_pool, create_pool_with_retry, ping, run_migrations, Database,
    DatabaseError,
};
