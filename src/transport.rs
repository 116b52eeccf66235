//! The [`PgTransport`] trait.
use std::{
    io,
    sync::Arc,
    task::{Context, Poll},
};

use crate::{
    Result,
    postgres::{BackendProtocol, FrontendProtocol, frontend},
    registry::TypeRegistry,
    statement::StatementName,
};

/// A buffered stream which can send and receive postgres messages, plus the
/// per-connection state the extended query flow needs.
pub trait PgTransport: Unpin {
    /// Poll to flush buffered messages into the underlying io.
    fn poll_flush(&mut self, cx: &mut Context) -> Poll<io::Result<()>>;

    /// Poll to receive a message.
    ///
    /// Calling `poll_recv` also flushes buffered messages and drains any
    /// pending [`ready_request`][PgTransport::ready_request] before reading.
    ///
    /// Implementors absorb `NoticeResponse` and mid-stream
    /// `ParameterStatus` without returning them, and return
    /// `ErrorResponse` as [`Err`]. Resynchronization (`Sync`) is the
    /// caller's decision, not the transport's.
    fn poll_recv<B: BackendProtocol>(&mut self, cx: &mut Context) -> Poll<Result<B>>;

    /// Request to ignore all backend messages until the next
    /// `ReadyForQuery` before further receives.
    fn ready_request(&mut self);

    /// Buffer a message towards the backend.
    ///
    /// Flush with [`poll_flush`][PgTransport::poll_flush] or
    /// [`flush`][PgTransportExt::flush] afterwards.
    fn send<F: FrontendProtocol>(&mut self, message: F);

    /// Buffer the [`Startup`][frontend::Startup] message, which has no
    /// message-type byte and thus no [`FrontendProtocol`] impl.
    fn send_startup(&mut self, startup: frontend::Startup);

    /// Check for an already prepared statement by query hash.
    fn get_stmt(&mut self, sqlid: u64) -> Option<StatementName>;

    /// Cache a prepared statement by query hash.
    fn add_stmt(&mut self, sqlid: u64, name: StatementName);

    /// Mint a statement name unique within this connection.
    fn next_statement(&mut self) -> StatementName;

    /// The type registry loaded at startup.
    fn registry(&self) -> Arc<TypeRegistry>;
}

impl<P> PgTransport for &mut P
where
    P: PgTransport,
{
    fn poll_flush(&mut self, cx: &mut Context) -> Poll<io::Result<()>> {
        P::poll_flush(self, cx)
    }

    fn poll_recv<B: BackendProtocol>(&mut self, cx: &mut Context) -> Poll<Result<B>> {
        P::poll_recv(self, cx)
    }

    fn ready_request(&mut self) {
        P::ready_request(self);
    }

    fn send<F: FrontendProtocol>(&mut self, message: F) {
        P::send(self, message);
    }

    fn send_startup(&mut self, startup: frontend::Startup) {
        P::send_startup(self, startup);
    }

    fn get_stmt(&mut self, sqlid: u64) -> Option<StatementName> {
        P::get_stmt(self, sqlid)
    }

    fn add_stmt(&mut self, sqlid: u64, name: StatementName) {
        P::add_stmt(self, sqlid, name);
    }

    fn next_statement(&mut self) -> StatementName {
        P::next_statement(self)
    }

    fn registry(&self) -> Arc<TypeRegistry> {
        P::registry(self)
    }
}

/// An extension trait to provide a `Future` API for [`PgTransport`].
pub trait PgTransportExt: PgTransport {
    /// Flush the underlying io.
    fn flush(&mut self) -> impl Future<Output = io::Result<()>> {
        std::future::poll_fn(|cx| self.poll_flush(cx))
    }

    /// Receive a backend message.
    fn recv<B: BackendProtocol>(&mut self) -> impl Future<Output = Result<B>> {
        std::future::poll_fn(|cx| self.poll_recv(cx))
    }
}

impl<T> PgTransportExt for T where T: PgTransport { }
