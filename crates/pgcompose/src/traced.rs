//! Traced database connections.
//!
//! Everything pgcompose sends to Postgres goes through [`TracedConn`], which
//! wraps each call in a `tracing::debug_span!` carrying the SQL text.

use std::ops::Deref;

use futures_util::future::BoxFuture;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Error, NoTls, Row};
use tracing::Instrument;

/// A database connection pgcompose can run statements on.
///
/// Implemented for `tokio_postgres::Client` and `deadpool_postgres::Object`.
pub trait Connection: Send + Sync {
    /// Execute a statement, returning the number of rows affected.
    fn execute<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Result<u64, Error>>;

    /// Execute a query, returning all rows.
    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Result<Vec<Row>, Error>>;

    /// Execute one or more statements over the simple query protocol.
    fn batch_execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<(), Error>>;
}

impl Connection for tokio_postgres::Client {
    fn execute<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Result<u64, Error>> {
        Box::pin(tokio_postgres::Client::execute(self, sql, params))
    }

    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Result<Vec<Row>, Error>> {
        Box::pin(tokio_postgres::Client::query(self, sql, params))
    }

    fn batch_execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(tokio_postgres::Client::batch_execute(self, sql))
    }
}

impl Connection for deadpool_postgres::Object {
    fn execute<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Result<u64, Error>> {
        // Deref to the underlying Client to avoid recursion
        let client: &tokio_postgres::Client = self.deref();
        Box::pin(client.execute(sql, params))
    }

    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Result<Vec<Row>, Error>> {
        let client: &tokio_postgres::Client = self.deref();
        Box::pin(client.query(sql, params))
    }

    fn batch_execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<(), Error>> {
        let client: &tokio_postgres::Client = self.deref();
        Box::pin(client.batch_execute(sql))
    }
}

/// A wrapper around a connection that logs every call via tracing.
pub struct TracedConn<'a, C: Connection> {
    conn: &'a C,
}

impl<'a, C: Connection> TracedConn<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Execute a statement, returning the number of rows affected.
    pub async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64, Error> {
        let span = tracing::debug_span!(
            "db.execute",
            sql = %sql,
            params = params.len(),
            affected = tracing::field::Empty,
        );
        let affected = self
            .conn
            .execute(sql, params)
            .instrument(span.clone())
            .await?;
        span.record("affected", affected);
        Ok(affected)
    }

    /// Execute a query, returning all rows.
    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Error> {
        let span = tracing::debug_span!(
            "db.query",
            sql = %sql,
            params = params.len(),
            rows = tracing::field::Empty,
        );
        let rows = self
            .conn
            .query(sql, params)
            .instrument(span.clone())
            .await?;
        span.record("rows", rows.len());
        Ok(rows)
    }

    /// Execute one or more parameterless statements.
    pub async fn batch_execute(&self, sql: &str) -> Result<(), Error> {
        let span = tracing::debug_span!("db.execute", sql = %sql);
        self.conn.batch_execute(sql).instrument(span).await
    }
}

/// Extension trait to get a traced wrapper from a connection.
pub trait ConnectionExt: Connection + Sized {
    /// Wrap this connection in a `TracedConn` for query logging.
    fn traced(&self) -> TracedConn<'_, Self> {
        TracedConn::new(self)
    }
}

impl<C: Connection> ConnectionExt for C {}

/// A connection pool handing out connections that implement [`Connection`].
#[derive(Clone)]
pub struct TracedPool {
    inner: deadpool_postgres::Pool,
}

impl TracedPool {
    pub fn new(pool: deadpool_postgres::Pool) -> Self {
        Self { inner: pool }
    }

    /// Build a pool for a `postgres://` connection string.
    pub fn from_url(url: &str) -> crate::Result<Self> {
        let config = deadpool_postgres::Config {
            url: Some(url.to_string()),
            ..Default::default()
        };
        let pool = config
            .create_pool(Some(deadpool_postgres::Runtime::Tokio1), NoTls)
            .map_err(|e| crate::Error::Config(format!("cannot create pool: {e}")))?;
        Ok(Self::new(pool))
    }

    /// Get a connection from the pool.
    pub async fn get(&self) -> Result<deadpool_postgres::Object, deadpool_postgres::PoolError> {
        let span = tracing::debug_span!("db.pool.get");
        self.inner.get().instrument(span).await
    }

    /// Get the inner pool (for cases where you need the raw pool).
    pub fn inner(&self) -> &deadpool_postgres::Pool {
        &self.inner
    }
}
