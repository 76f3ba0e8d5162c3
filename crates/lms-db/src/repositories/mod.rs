// All repository functions are generic over `E: Executor<'e, Database = Postgres>`
// so they accept both a `&PgPool` (direct query) and a `&mut Transaction` (atomic operations).
// Functions that maintain a derived column take `&mut PgConnection` instead, because
// they read and write in several statements that must share the caller's transaction.

pub mod catalog;
pub mod enrollment;
pub mod review;
pub mod token;
pub mod user;
