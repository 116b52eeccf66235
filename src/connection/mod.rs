//! Postgres connection.
use bytes::{Buf, BytesMut};
use lru::LruCache;
use std::{
    collections::HashMap,
    io,
    num::NonZeroUsize,
    sync::Arc,
    task::{Context, Poll, ready},
};

mod config;
pub use config::{Config, ParseError};

use crate::{
    Result,
    common::verbose,
    net::Socket,
    phase,
    postgres::{
        BackendProtocol, DatabaseError, FrontendProtocol, TransactionStatus,
        backend::{BackendKeyData, ErrorResponse, NoticeResponse, ParameterStatus, ReadyForQuery},
        frontend,
    },
    registry::{self, TypeRegistry},
    statement::StatementName,
    transport::{PgTransport, PgTransportExt},
};

const DEFAULT_BUF_CAPACITY: usize = 1024;
const DEFAULT_STMT_CACHE: NonZeroUsize = NonZeroUsize::new(24).unwrap();

/// A single postgres connection.
///
/// One command is in flight at a time; the `&mut` receiver on every
/// operation is what enforces it. Prepared statements are cached
/// transparently under connection-minted names. `NoticeResponse` and
/// asynchronous `ParameterStatus` reports are absorbed wherever they
/// appear.
pub struct Connection {
    // io
    socket: Socket,
    read_buf: BytesMut,
    write_buf: BytesMut,

    // what the server told us
    server_params: HashMap<String, String>,
    key_data: Option<BackendKeyData>,
    tx_status: TransactionStatus,

    // per connection state
    stmts: LruCache<u64, StatementName>,
    stmt_counter: u32,
    registry: Arc<TypeRegistry>,

    // ReadyForQuery messages owed to abandoned or failed commands
    sync_pending: usize,
}

impl Connection {
    /// Connect and authenticate via url.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with(&Config::parse(url)?).await
    }

    /// Connect and authenticate from environment variables, see
    /// [`Config::from_env`].
    pub async fn connect_env() -> Result<Self> {
        Self::connect_with(&Config::from_env()).await
    }

    /// Connect and authenticate with an explicit config.
    ///
    /// After authentication the type registry is loaded from the system
    /// catalogs, so server-defined array, composite, and enum types decode
    /// from the first query on.
    pub async fn connect_with(config: &Config) -> Result<Self> {
        let socket = match &config.socket {
            Some(path) => Socket::connect_unix(path).await?,
            None if config.host.starts_with('/') => {
                let path = format!("{}/.s.PGSQL.{}", &*config.host, config.port);
                Socket::connect_unix(&path).await?
            }
            None => Socket::connect_tcp(&config.host, config.port).await?,
        };

        let mut conn = Self {
            socket,
            read_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            write_buf: BytesMut::with_capacity(DEFAULT_BUF_CAPACITY),
            server_params: HashMap::new(),
            key_data: None,
            tx_status: TransactionStatus::Idle,
            stmts: LruCache::new(DEFAULT_STMT_CACHE),
            stmt_counter: 0,
            registry: Arc::new(TypeRegistry::default()),
            sync_pending: 0,
        };

        let outcome = phase::startup(config, &mut conn).await?;
        conn.key_data = outcome.key_data;
        conn.tx_status = outcome.status;

        conn.reload_types().await?;

        Ok(conn)
    }

    /// Gracefully close the connection.
    pub async fn close(mut self) -> io::Result<()> {
        self.send(frontend::Terminate);
        self.flush().await?;
        self.socket.shutdown().await
    }

    /// A server parameter reported at startup or since, e.g.
    /// `server_version`.
    pub fn server_param(&self, name: &str) -> Option<&str> {
        self.server_params.get(name).map(String::as_str)
    }

    /// Backend process id and secret key for out-of-band cancellation.
    pub fn backend_key_data(&self) -> Option<&BackendKeyData> {
        self.key_data.as_ref()
    }

    /// Transaction status from the most recent `ReadyForQuery`.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.tx_status
    }

    /// The current type registry snapshot.
    pub fn type_registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Re-run the catalog queries and swap in a fresh type registry.
    ///
    /// Needed after `CREATE TYPE` on this or another connection for the
    /// new type to decode.
    pub async fn reload_types(&mut self) -> Result<()> {
        let registry = registry::load(self).await?;
        self.registry = Arc::new(registry);
        Ok(())
    }
}

macro_rules! poll_message {
    (
        poll($io:ident, $cx:ident);
        let $msgtype:ident;
        let $body:ident;
    ) => {
        let Some(mut header) = $io.read_buf.get(..5) else {
            $io.read_buf.reserve(DEFAULT_BUF_CAPACITY);
            ready!(crate::io::poll_read(&mut $io.socket, &mut $io.read_buf, $cx)?);
            continue;
        };

        let $msgtype = header.get_u8();
        let len = header.get_i32() as usize;

        if $io.read_buf.len() - 1/*msgtype*/ < len {
            $io.read_buf.reserve(1 + len);
            ready!(crate::io::poll_read(&mut $io.socket, &mut $io.read_buf, $cx)?);
            continue;
        }

        $io.read_buf.advance(5);
        let $body = $io.read_buf.split_to(len - 4).freeze();
    };
}

impl Connection {
    /// Flush buffered writes and drain every message owed to a pending
    /// sync, so the next receive starts on a clean cycle.
    fn poll_healthcheck(&mut self, cx: &mut Context) -> Poll<Result<()>> {
        if !self.write_buf.is_empty() {
            ready!(crate::io::poll_write_all(&mut self.socket, &mut self.write_buf, cx)?);
        }

        while self.sync_pending != 0 {
            poll_message! {
                poll(self, cx);
                let msgtype;
                let body;
            }

            match msgtype {
                ReadyForQuery::MSGTYPE => {
                    self.tx_status = ReadyForQuery::decode(msgtype, body)?.status;
                    self.sync_pending -= 1;
                }
                ErrorResponse::MSGTYPE => {
                    // the command this belonged to is gone
                    let _err = ErrorResponse::decode(msgtype, body)?;
                    verbose!("discarded: {}", DatabaseError::from(_err));
                }
                NoticeResponse::MSGTYPE => {
                    let _notice = NoticeResponse::decode(msgtype, body)?;
                    verbose!("{}", _notice.message());
                }
                ParameterStatus::MSGTYPE => {
                    let status = ParameterStatus::decode(msgtype, body)?;
                    self.server_params.insert(status.name, status.value);
                }
                _ => { } // everything else until ReadyForQuery belongs to the dead command
            }
        }

        Poll::Ready(Ok(()))
    }
}

impl PgTransport for Connection {
    fn poll_flush(&mut self, cx: &mut Context) -> Poll<io::Result<()>> {
        crate::io::poll_write_all(&mut self.socket, &mut self.write_buf, cx)
    }

    fn poll_recv<B: BackendProtocol>(&mut self, cx: &mut Context) -> Poll<Result<B>> {
        ready!(self.poll_healthcheck(cx)?);

        loop {
            poll_message! {
                poll(self, cx);
                let msgtype;
                let body;
            }

            match msgtype {
                ErrorResponse::MSGTYPE => {
                    let err = ErrorResponse::decode(msgtype, body)?;
                    return Poll::Ready(Err(DatabaseError::from(err).into()));
                }
                NoticeResponse::MSGTYPE => {
                    let _notice = NoticeResponse::decode(msgtype, body)?;
                    verbose!("{}", _notice.message());
                }
                ParameterStatus::MSGTYPE => {
                    let status = ParameterStatus::decode(msgtype, body)?;
                    self.server_params.insert(status.name, status.value);
                }
                ReadyForQuery::MSGTYPE => {
                    // observe the transaction status on the way through
                    self.tx_status = ReadyForQuery::decode(msgtype, body.clone())?.status;
                    return Poll::Ready(Ok(B::decode(msgtype, body)?));
                }
                _ => return Poll::Ready(Ok(B::decode(msgtype, body)?)),
            }
        }
    }

    fn ready_request(&mut self) {
        self.sync_pending += 1;
    }

    fn send<F: FrontendProtocol>(&mut self, message: F) {
        frontend::write(message, &mut self.write_buf);
    }

    fn send_startup(&mut self, startup: frontend::Startup) {
        startup.write(&mut self.write_buf);
    }

    fn get_stmt(&mut self, sqlid: u64) -> Option<StatementName> {
        self.stmts.get(&sqlid).cloned()
    }

    fn add_stmt(&mut self, sqlid: u64, name: StatementName) {
        if let Some((_, evicted)) = self.stmts.push(sqlid, name) {
            if !evicted.is_unnamed() {
                verbose!("closing evicted statement {evicted}");
                self.send(frontend::Close { variant: b'S', name: evicted.as_str() });
                self.send(frontend::Sync);
                self.ready_request();
            }
        }
    }

    fn next_statement(&mut self) -> StatementName {
        let id = self.stmt_counter;
        self.stmt_counter = self.stmt_counter.wrapping_add(1);
        StatementName::minted(id)
    }

    fn registry(&self) -> Arc<TypeRegistry> {
        Arc::clone(&self.registry)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("socket", &self.socket)
            .field("tx_status", &self.tx_status)
            .field("server_params", &self.server_params)
            .field("sync_pending", &self.sync_pending)
            .finish_non_exhaustive()
    }
}
