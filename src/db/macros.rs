//! Database dispatch macros.
//!
//! Most operations exist once per backend in parallel submodules. The macro
//! below generates the `match` over [`DbPool`](crate::db::DbPool) that routes
//! a call to the right one.

/// Generate the match arms that route a call to the backend of a `DbPool`.
///
/// ```ignore
/// impl_db_dispatch!(pool, {
///     MySql(p) => mysql::fetch_rows(p, sql).await,
///     Postgres(p) => postgres::fetch_rows(p, sql).await,
///     SQLite(p) => sqlite::fetch_rows(p, sql).await,
/// })
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($pool:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $pool {
            $(
                $crate::db::pool::DbPool::$variant($p) => $body,
            )+
        }
    };
}

pub use impl_db_dispatch;
