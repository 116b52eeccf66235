//! The [`Executor`] trait.
use std::future::Ready;

use crate::{Result, transport::PgTransport};

/// A type that can produce a [`PgTransport`].
///
/// `&mut Connection` is the canonical executor: acquiring it is free and
/// the exclusive borrow guarantees one command in flight at a time.
pub trait Executor: Unpin {
    /// The produced transport.
    type Transport: PgTransport;

    /// Future that resolves to [`Executor::Transport`].
    type Future: Future<Output = Result<Self::Transport>> + Unpin;

    /// Acquire the transport.
    fn connection(self) -> Self::Future;
}

impl<T: PgTransport> Executor for &mut T {
    type Transport = Self;

    type Future = Ready<Result<Self>>;

    fn connection(self) -> Self::Future {
        std::future::ready(Ok(self))
    }
}

#[cfg(test)]
mod test {
    use super::Executor;
    use crate::query::query;

    #[allow(unused, reason = "type assertion")]
    async fn assert_type<E: Executor>(e: E) {
        let _ = query("", e).fetch_all().await;
    }

    #[allow(unused, reason = "type assertion")]
    async fn assert_reborrow<E: Executor>(e: E) {
        let mut e = e.connection().await.unwrap();
        let _ = query("", &mut e).fetch_all().await;
        let _ = query("", &mut e).fetch_all().await;
    }
}
