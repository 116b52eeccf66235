//! Query API types.
use std::{fmt, marker::PhantomData};

use crate::{
    Result,
    decode::Decode,
    encode::{Encode, Encoded},
    executor::Executor,
    fetch::{Fetch, FetchStream, StreamMap},
    row::{FromRow, Row},
    sql::Sql,
};

/// Run a query yielding dynamically shaped [`Row`]s.
#[inline]
pub fn query<'val, SQL, Exe>(sql: SQL, exe: Exe) -> Query<'val, SQL, Exe, StreamRow<Row>> {
    Query { sql, exe, params: Vec::new(), _p: PhantomData }
}

/// Run a query yielding rows decoded into `R`.
#[inline]
pub fn query_as<'val, SQL, Exe, R>(sql: SQL, exe: Exe) -> Query<'val, SQL, Exe, StreamRow<R>> {
    Query { sql, exe, params: Vec::new(), _p: PhantomData }
}

/// Run a query yielding a single column decoded into `D`.
#[inline]
pub fn query_scalar<'val, SQL, Exe, D>(sql: SQL, exe: Exe) -> Query<'val, SQL, Exe, StreamScalar<D>> {
    Query { sql, exe, params: Vec::new(), _p: PhantomData }
}

/// Run a statement for its effect, yielding a [`QueryResult`].
#[inline]
pub fn execute<'val, SQL, Exe>(sql: SQL, exe: Exe) -> Query<'val, SQL, Exe, StreamRow<()>> {
    Query { sql, exe, params: Vec::new(), _p: PhantomData }
}

/// The query API: a statement, its bound parameters, and where it runs.
#[derive(Debug)]
#[must_use = "a query does nothing until fetched or executed"]
pub struct Query<'val, SQL, Exe, M> {
    sql: SQL,
    exe: Exe,
    params: Vec<Encoded<'val>>,
    _p: PhantomData<M>,
}

impl<'val, SQL, Exe, M> Query<'val, SQL, Exe, M> {
    /// Bind the next parameter, `$1` first.
    ///
    /// Parameters must cover every placeholder in the query before
    /// execution; the server rejects the `Bind` otherwise.
    #[inline]
    pub fn bind<V: Encode<'val>>(mut self, value: V) -> Self {
        self.params.push(value.encode());
        self
    }
}

impl<'val, SQL, Exe, M> Query<'val, SQL, Exe, M>
where
    SQL: Sql,
    Exe: Executor,
    M: StreamMap,
{
    /// Fetch rows using the [`Stream`][futures_core::Stream] api.
    ///
    /// The returned stream must be polled to completion or dropped before
    /// the connection runs another command; a drop schedules a drain to
    /// `ReadyForQuery`.
    #[inline]
    pub fn fetch(self) -> FetchStream<'val, SQL, Exe::Future, Exe::Transport, M> {
        FetchStream::new(self.sql, self.exe.connection(), self.params)
    }

    /// Fetch all rows into a [`Vec`].
    #[inline]
    pub fn fetch_all(self) -> Fetch<'val, SQL, Exe::Future, Exe::Transport, M, CollectAll<M::Output>> {
        Fetch::new(self.sql, self.exe.connection(), self.params, CollectAll(Vec::new()))
    }

    /// Fetch exactly one row: zero rows is [`RowNotFound`], more than one
    /// is [`TooManyRows`].
    #[inline]
    pub fn fetch_one(self) -> Fetch<'val, SQL, Exe::Future, Exe::Transport, M, CollectOne<M::Output>> {
        Fetch::new(self.sql, self.exe.connection(), self.params, CollectOne(None))
    }

    /// Fetch the first row if any.
    #[inline]
    pub fn fetch_optional(
        self,
    ) -> Fetch<'val, SQL, Exe::Future, Exe::Transport, M, CollectOpt<M::Output>> {
        Fetch::new(self.sql, self.exe.connection(), self.params, CollectOpt(None))
    }

    /// Execute the statement and report affected rows.
    #[inline]
    pub fn execute(self) -> Fetch<'val, SQL, Exe::Future, Exe::Transport, M, CollectCmd> {
        Fetch::new(self.sql, self.exe.connection(), self.params, CollectCmd)
    }
}

impl<'val, SQL, Exe, M> IntoFuture for Query<'val, SQL, Exe, M>
where
    SQL: Sql + Unpin,
    Exe: Executor + Unpin,
    M: StreamMap + Unpin,
{
    type Output = Result<QueryResult>;

    type IntoFuture = Fetch<'val, SQL, Exe::Future, Exe::Transport, M, CollectCmd>;

    #[inline]
    fn into_future(self) -> Self::IntoFuture {
        self.execute()
    }
}

/// Outcome of a statement run for its effect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueryResult {
    /// Rows inserted, updated, deleted, moved, or fetched.
    pub rows_affected: u64,
    /// The oid reported by `INSERT`, zero on modern servers and for every
    /// other command.
    pub last_insert_oid: u32,
}

// ===== Stream Adapters =====

/// Maps each row through [`FromRow`].
pub struct StreamRow<R>(PhantomData<R>);

/// Maps each single-column row through [`Decode`].
pub struct StreamScalar<D>(PhantomData<D>);

impl<R> StreamMap for StreamRow<R>
where
    R: FromRow,
{
    type Output = R;

    #[inline]
    fn map(row: Row) -> Result<Self::Output> {
        R::from_row(row).map_err(Into::into)
    }
}

impl<D> StreamMap for StreamScalar<D>
where
    D: Decode,
{
    type Output = D;

    #[inline]
    fn map(row: Row) -> Result<Self::Output> {
        match <(D,)>::from_row(row) {
            Ok(ok) => Ok(ok.0),
            Err(err) => Err(err.into()),
        }
    }
}

// ===== Fetch Collectors =====

/// Collects stream output for the fetch futures; `finish` receives the
/// parsed command tag when the server sent one.
pub trait FetchCollect<R> {
    type Output;

    fn value(&mut self, input: R) -> Result<()>;

    fn finish(&mut self, cmd: Option<QueryResult>) -> Result<Self::Output>;
}

/// Collector behind [`fetch_all`][Query::fetch_all].
#[derive(Debug)]
pub struct CollectAll<R>(pub(crate) Vec<R>);

/// Collector behind [`fetch_one`][Query::fetch_one].
#[derive(Debug)]
pub struct CollectOne<R>(pub(crate) Option<R>);

/// Collector behind [`fetch_optional`][Query::fetch_optional].
#[derive(Debug)]
pub struct CollectOpt<R>(pub(crate) Option<R>);

/// Collector behind [`execute`][Query::execute].
#[derive(Debug)]
pub struct CollectCmd;

impl<R> FetchCollect<R> for CollectAll<R> {
    type Output = Vec<R>;

    #[inline]
    fn value(&mut self, input: R) -> Result<()> {
        self.0.push(input);
        Ok(())
    }

    #[inline]
    fn finish(&mut self, _: Option<QueryResult>) -> Result<Self::Output> {
        Ok(std::mem::take(&mut self.0))
    }
}

impl<R> FetchCollect<R> for CollectOne<R> {
    type Output = R;

    #[inline]
    fn value(&mut self, input: R) -> Result<()> {
        match self.0 {
            None => {
                self.0 = Some(input);
                Ok(())
            }
            Some(_) => Err(TooManyRows.into()),
        }
    }

    #[inline]
    fn finish(&mut self, _: Option<QueryResult>) -> Result<Self::Output> {
        match self.0.take() {
            Some(row) => Ok(row),
            None => Err(RowNotFound.into()),
        }
    }
}

impl<R> FetchCollect<R> for CollectOpt<R> {
    type Output = Option<R>;

    #[inline]
    fn value(&mut self, input: R) -> Result<()> {
        if self.0.is_none() {
            self.0 = Some(input);
        }
        Ok(())
    }

    #[inline]
    fn finish(&mut self, _: Option<QueryResult>) -> Result<Self::Output> {
        Ok(self.0.take())
    }
}

impl<R> FetchCollect<R> for CollectCmd {
    type Output = QueryResult;

    #[inline]
    fn value(&mut self, _: R) -> Result<()> {
        Ok(())
    }

    #[inline]
    fn finish(&mut self, cmd: Option<QueryResult>) -> Result<Self::Output> {
        Ok(cmd.unwrap_or_default())
    }
}

/// `fetch_one` received no rows.
#[derive(Debug)]
pub struct RowNotFound;

impl std::error::Error for RowNotFound { }

impl fmt::Display for RowNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("no rows returned where one was expected")
    }
}

/// `fetch_one` received more than one row.
#[derive(Debug)]
pub struct TooManyRows;

impl std::error::Error for TooManyRows { }

impl fmt::Display for TooManyRows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("more than one row returned where one was expected")
    }
}
