// Database migrations module
// SQLite is the only supported backend; statements are idempotent.

mod sqlite;
pub use sqlite::run_migrations as run_sqlite_migrations;
