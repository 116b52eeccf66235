//! The extended query state machine.
//!
//! One cycle is three exchanges:
//!
//! 1. `Parse` + `Flush`, answered by `ParseComplete` (skipped on a
//!    statement-cache hit),
//! 2. `Close` (previous unnamed portal) + `Bind` + `Describe` + `Flush`,
//!    answered by `CloseComplete`, `BindComplete`, and `RowDescription`
//!    or `NoData`,
//! 3. `Execute` + `Sync` + `Flush`, answered by zero or more `DataRow`s,
//!    a terminator, and `ReadyForQuery`.
//!
//! Server errors raised before the machine's own `Sync` is on the wire are
//! answered with a `Sync` here; afterwards only the pending drain is
//! registered. Either way the connection resynchronizes before its next
//! command.
use futures_core::Stream;
use std::{
    fmt,
    hash::{DefaultHasher, Hash, Hasher},
    marker::PhantomData,
    mem,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, ready},
};

use crate::{
    Error, Result,
    encode::Encoded,
    postgres::{ProtocolError, backend, frontend},
    query::{FetchCollect, QueryResult},
    row::{FieldDescription, Row},
    sql::Sql,
    statement::{PortalName, StatementName},
    transport::PgTransport,
};

/// Maps raw rows to the stream's output, see
/// [`StreamRow`][crate::query::StreamRow] and
/// [`StreamScalar`][crate::query::StreamScalar].
pub trait StreamMap {
    type Output;

    fn map(row: Row) -> Result<Self::Output>;
}

#[derive(Debug)]
pub(crate) struct PrepareData {
    sqlid: u64,
    stmt: StatementName,
    cache_hit: bool,
}

/// Hash the query, consult the statement cache, and buffer `Parse` +
/// `Flush` on a miss.
fn prepare<IO: PgTransport>(sql: &impl Sql, params: &[Encoded], io: &mut IO) -> PrepareData {
    let persist = sql.persistent();
    let sql = sql.sql().trim();

    let sqlid = {
        let mut hasher = DefaultHasher::new();
        sql.hash(&mut hasher);
        hasher.finish()
    };

    if persist {
        if let Some(stmt) = io.get_stmt(sqlid) {
            return PrepareData { sqlid, stmt, cache_hit: true };
        }
    }

    let stmt = match persist {
        true => io.next_statement(),
        false => StatementName::unnamed(),
    };

    io.send(frontend::Parse { prepare_name: stmt.as_str(), sql, params });
    io.send(frontend::Flush);

    PrepareData { sqlid, stmt, cache_hit: false }
}

/// Buffer `Close` (unnamed portal) + `Bind` + `Describe` + `Flush`.
fn portal<IO: PgTransport>(stmt: &StatementName, params: &[Encoded], io: &mut IO) {
    let portal = PortalName::unnamed();

    io.send(frontend::Close { variant: b'P', name: portal.as_str() });
    io.send(frontend::Bind { portal_name: portal.as_str(), stmt_name: stmt.as_str(), params });
    io.send(frontend::Describe { kind: b'P', name: portal.as_str() });
    io.send(frontend::Flush);
}

/// Decode a [`CommandComplete`][backend::CommandComplete] tag.
///
/// `INSERT` carries `oid rows`, the other commands just `rows`.
pub(crate) fn command_complete(cmd: &backend::CommandComplete) -> QueryResult {
    let mut words = cmd.tag.split_whitespace();
    let mut result = QueryResult::default();

    match words.next() {
        Some("INSERT") => {
            result.last_insert_oid = words.next().and_then(|w| w.parse().ok()).unwrap_or(0);
            result.rows_affected = words.next().and_then(|w| w.parse().ok()).unwrap_or(0);
        }
        Some("SELECT" | "UPDATE" | "DELETE" | "MERGE" | "MOVE" | "FETCH" | "COPY") => {
            result.rows_affected = words.next().and_then(|w| w.parse().ok()).unwrap_or(0);
        }
        _ => { }
    }

    result
}

/// A streaming result set.
///
/// Single pass and interlocked with the connection: it holds the
/// transport for its whole life, and must be polled to completion (or
/// dropped, which schedules a drain to `ReadyForQuery`) before the
/// connection runs anything else.
#[derive(Debug)]
#[must_use = "streams do nothing unless polled"]
pub struct FetchStream<'val, SQL, ExeFut, IO: PgTransport, M> {
    sql: SQL,
    io: Option<IO>,
    phase: Phase<ExeFut>,
    params: Vec<Encoded<'val>>,
    fields: Option<Arc<[FieldDescription]>>,
    cmd: Option<backend::CommandComplete>,
    _p: PhantomData<M>,
}

#[derive(Debug)]
enum Phase<ExeFut> {
    Connect { f: ExeFut },
    Prepare,
    PrepareFlush(PrepareData),
    PrepareComplete(PrepareData),
    Portal(PrepareData),
    PortalFlush,
    CloseRecv,
    BindRecv,
    DescribeRecv,
    Execute,
    ExecuteFlush,
    Rows,
    ReadyForQuery,
    Invalid,
    Complete,
}

impl<ExeFut> Default for Phase<ExeFut> {
    fn default() -> Self {
        Phase::Invalid
    }
}

impl<'val, SQL, ExeFut, IO: PgTransport, M> FetchStream<'val, SQL, ExeFut, IO, M> {
    pub(crate) fn new(sql: SQL, exe: ExeFut, params: Vec<Encoded<'val>>) -> Self {
        Self {
            sql,
            io: None,
            phase: Phase::Connect { f: exe },
            params,
            fields: None,
            cmd: None,
            _p: PhantomData,
        }
    }

    pub(crate) fn take_command(&mut self) -> Option<backend::CommandComplete> {
        self.cmd.take()
    }

    /// Abort the command: resynchronize (with a `Sync` of our own unless
    /// one is already on the wire) and surface `err`.
    fn abort<T>(&mut self, sync: bool, err: Error) -> Poll<Option<Result<T>>> {
        let io = self.io.as_mut().expect("io is connected in protocol phases");
        if sync {
            io.send(frontend::Sync);
        }
        io.ready_request();
        self.phase = Phase::Complete;
        Poll::Ready(Some(Err(err)))
    }
}

impl<SQL, ExeFut, IO, M> Stream for FetchStream<'_, SQL, ExeFut, IO, M>
where
    SQL: Sql + Unpin,
    ExeFut: Future<Output = Result<IO>> + Unpin,
    IO: PgTransport + Unpin,
    M: StreamMap + Unpin,
{
    type Item = Result<M::Output>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let me = self.get_mut();

        loop {
            match &mut me.phase {
                Phase::Connect { f } => {
                    let io = ready!(Pin::new(f).poll(cx)?);
                    me.io = Some(io);
                    me.phase = Phase::Prepare;
                }
                Phase::Prepare => {
                    let data = prepare(&me.sql, &me.params, me.io.as_mut().unwrap());
                    me.phase = match data.cache_hit {
                        true => Phase::Portal(data),
                        false => Phase::PrepareFlush(data),
                    };
                }
                Phase::PrepareFlush(_) => {
                    ready!(me.io.as_mut().unwrap().poll_flush(cx)?);
                    let Phase::PrepareFlush(data) = mem::take(&mut me.phase) else {
                        unreachable!()
                    };
                    me.phase = Phase::PrepareComplete(data);
                }
                Phase::PrepareComplete(_) => {
                    match ready!(me.io.as_mut().unwrap().poll_recv::<backend::ParseComplete>(cx)) {
                        Ok(backend::ParseComplete) => { }
                        Err(err) => return me.abort(true, err),
                    }
                    let Phase::PrepareComplete(data) = mem::take(&mut me.phase) else {
                        unreachable!()
                    };
                    if !data.stmt.is_unnamed() {
                        me.io.as_mut().unwrap().add_stmt(data.sqlid, data.stmt.clone());
                    }
                    me.phase = Phase::Portal(data);
                }
                Phase::Portal(_) => {
                    let Phase::Portal(data) = mem::take(&mut me.phase) else {
                        unreachable!()
                    };
                    portal(&data.stmt, &me.params, me.io.as_mut().unwrap());
                    me.phase = Phase::PortalFlush;
                }
                Phase::PortalFlush => {
                    ready!(me.io.as_mut().unwrap().poll_flush(cx)?);
                    me.phase = Phase::CloseRecv;
                }
                Phase::CloseRecv => {
                    match ready!(me.io.as_mut().unwrap().poll_recv::<backend::CloseComplete>(cx)) {
                        Ok(backend::CloseComplete) => me.phase = Phase::BindRecv,
                        Err(err) => return me.abort(true, err),
                    }
                }
                Phase::BindRecv => {
                    match ready!(me.io.as_mut().unwrap().poll_recv::<backend::BindComplete>(cx)) {
                        Ok(backend::BindComplete) => me.phase = Phase::DescribeRecv,
                        Err(err) => return me.abort(true, err),
                    }
                }
                Phase::DescribeRecv => {
                    use backend::BackendMessage::*;
                    match ready!(me.io.as_mut().unwrap().poll_recv(cx)) {
                        Ok(RowDescription(rd)) => match FieldDescription::parse_all(rd) {
                            Ok(fields) => {
                                me.fields = Some(fields);
                                me.phase = Phase::Execute;
                            }
                            Err(err) => return me.abort(true, err.into()),
                        },
                        Ok(NoData(_)) => {
                            me.fields = Some(Vec::new().into());
                            me.phase = Phase::Execute;
                        }
                        Ok(f) => return me.abort(true, f.unexpected("describing portal").into()),
                        Err(err) => return me.abort(true, err),
                    }
                }
                Phase::Execute => {
                    let io = me.io.as_mut().unwrap();
                    io.send(frontend::Execute { portal_name: "", max_row: 0 });
                    io.send(frontend::Sync);
                    io.send(frontend::Flush);
                    me.phase = Phase::ExecuteFlush;
                }
                Phase::ExecuteFlush => {
                    ready!(me.io.as_mut().unwrap().poll_flush(cx)?);
                    me.phase = Phase::Rows;
                }
                Phase::Rows => {
                    use backend::BackendMessage::*;
                    let io = me.io.as_mut().unwrap();
                    match ready!(io.poll_recv(cx)) {
                        Ok(DataRow(dr)) => {
                            let fields = me.fields.clone().expect("portal described before execute");
                            let result = Row::new(fields, io.registry(), dr)
                                .map_err(Error::from)
                                .and_then(M::map);
                            if result.is_err() {
                                io.ready_request();
                                me.phase = Phase::Complete;
                            }
                            return Poll::Ready(Some(result));
                        }
                        Ok(CommandComplete(cmd)) => {
                            me.cmd = Some(cmd);
                            me.phase = Phase::ReadyForQuery;
                        }
                        Ok(EmptyQueryResponse(_)) => {
                            return me.abort(false, EmptyQueryError.into());
                        }
                        Ok(PortalSuspended(_)) => {
                            return me.abort(false, ProtocolError::PortalSuspended.into());
                        }
                        Ok(f) => return me.abort(false, f.unexpected("fetching rows").into()),
                        Err(err) => return me.abort(false, err),
                    }
                }
                Phase::ReadyForQuery => {
                    match ready!(me.io.as_mut().unwrap().poll_recv::<backend::ReadyForQuery>(cx)) {
                        Ok(_) => {
                            me.phase = Phase::Complete;
                            return Poll::Ready(None);
                        }
                        Err(err) => return me.abort(false, err),
                    }
                }
                Phase::Invalid => unreachable!("phase taken without replacement"),
                Phase::Complete => return Poll::Ready(None),
            }
        }
    }
}

impl<SQL, ExeFut, IO: PgTransport, M> Drop for FetchStream<'_, SQL, ExeFut, IO, M> {
    fn drop(&mut self) {
        let Some(io) = self.io.as_mut() else { return };
        match &self.phase {
            Phase::Complete | Phase::Connect { .. } | Phase::Invalid => { }
            // our Sync is not on the wire yet
            Phase::Prepare
            | Phase::PrepareFlush(_)
            | Phase::PrepareComplete(_)
            | Phase::Portal(_)
            | Phase::PortalFlush
            | Phase::CloseRecv
            | Phase::BindRecv
            | Phase::DescribeRecv
            | Phase::Execute => {
                io.send(frontend::Sync);
                io.ready_request();
            }
            // Execute already carried a Sync, only register the drain
            Phase::ExecuteFlush | Phase::Rows | Phase::ReadyForQuery => {
                io.ready_request();
            }
        }
    }
}

/// Future driving a [`FetchStream`] into a collector.
#[derive(Debug)]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Fetch<'val, SQL, ExeFut, IO: PgTransport, M, C> {
    stream: FetchStream<'val, SQL, ExeFut, IO, M>,
    collect: C,
}

impl<'val, SQL, ExeFut, IO: PgTransport, M, C> Fetch<'val, SQL, ExeFut, IO, M, C> {
    pub(crate) fn new(sql: SQL, exe: ExeFut, params: Vec<Encoded<'val>>, collect: C) -> Self {
        Self { stream: FetchStream::new(sql, exe, params), collect }
    }
}

impl<SQL, ExeFut, IO, M, C> Future for Fetch<'_, SQL, ExeFut, IO, M, C>
where
    SQL: Sql + Unpin,
    ExeFut: Future<Output = Result<IO>> + Unpin,
    IO: PgTransport + Unpin,
    M: StreamMap + Unpin,
    C: FetchCollect<M::Output> + Unpin,
{
    type Output = Result<C::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let me = self.get_mut();

        loop {
            match ready!(Pin::new(&mut me.stream).poll_next(cx)) {
                Some(Ok(value)) => me.collect.value(value)?,
                Some(Err(err)) => return Poll::Ready(Err(err)),
                None => {
                    let cmd = me.stream.take_command();
                    let cmd = cmd.as_ref().map(command_complete);
                    return Poll::Ready(me.collect.finish(cmd));
                }
            }
        }
    }
}

/// The query string was empty.
#[derive(Debug)]
pub struct EmptyQueryError;

impl std::error::Error for EmptyQueryError { }

impl fmt::Display for EmptyQueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("the query string was empty")
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;

    use super::command_complete;
    use crate::postgres::{BackendProtocol, backend::CommandComplete};

    fn tag(s: &'static str) -> CommandComplete {
        let mut body = Vec::from(s.as_bytes());
        body.push(0);
        CommandComplete::decode(b'C', Bytes::from(body)).unwrap()
    }

    #[test]
    fn insert_carries_oid_and_rows() {
        let result = command_complete(&tag("INSERT 0 1"));
        assert_eq!(result.rows_affected, 1);
        assert_eq!(result.last_insert_oid, 0);

        let result = command_complete(&tag("INSERT 16999 3"));
        assert_eq!(result.rows_affected, 3);
        assert_eq!(result.last_insert_oid, 16999);
    }

    #[test]
    fn row_count_commands() {
        assert_eq!(command_complete(&tag("SELECT 42")).rows_affected, 42);
        assert_eq!(command_complete(&tag("UPDATE 7")).rows_affected, 7);
        assert_eq!(command_complete(&tag("DELETE 0")).rows_affected, 0);
        assert_eq!(command_complete(&tag("FETCH 5")).rows_affected, 5);
        assert_eq!(command_complete(&tag("MOVE 2")).rows_affected, 2);
    }

    #[test]
    fn bare_tags_report_zero() {
        assert_eq!(command_complete(&tag("CREATE TABLE")).rows_affected, 0);
        assert_eq!(command_complete(&tag("DROP TABLE")).rows_affected, 0);
        assert_eq!(command_complete(&tag("BEGIN")).rows_affected, 0);
    }
}
