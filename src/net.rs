//! Transport: a reliable bidirectional byte stream.
use std::io;

/// Either a `TcpStream` or a `UnixStream`, behind one `AsyncRead`/`AsyncWrite`
/// type.
///
/// Requires the `tokio` feature, otherwise every operation panics at runtime.
pub struct Socket {
    kind: Kind,
}

enum Kind {
    #[cfg(feature = "tokio")]
    Tcp(tokio::net::TcpStream),
    #[cfg(all(feature = "tokio", unix))]
    Unix(tokio::net::UnixStream),
    #[cfg(not(feature = "tokio"))]
    Disabled(std::convert::Infallible),
}

impl Socket {
    pub async fn connect_tcp(host: &str, port: u16) -> io::Result<Socket> {
        #[cfg(feature = "tokio")]
        {
            let socket = tokio::net::TcpStream::connect((host, port)).await?;
            socket.set_nodelay(true)?;
            Ok(Socket { kind: Kind::Tcp(socket) })
        }

        #[cfg(not(feature = "tokio"))]
        {
            let _ = (host, port);
            panic!("runtime disabled")
        }
    }

    pub async fn connect_unix(path: &str) -> io::Result<Socket> {
        #[cfg(all(feature = "tokio", unix))]
        {
            let socket = tokio::net::UnixStream::connect(path).await?;
            Ok(Socket { kind: Kind::Unix(socket) })
        }

        #[cfg(not(all(feature = "tokio", unix)))]
        {
            let _ = path;
            panic!("runtime disabled")
        }
    }

    /// Shut the write half down, flushing what the OS still buffers.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        #[cfg(feature = "tokio")]
        {
            use std::pin::Pin;
            use tokio::io::AsyncWrite;
            std::future::poll_fn(|cx| Pin::new(&mut *self).poll_shutdown(cx)).await
        }

        #[cfg(not(feature = "tokio"))]
        {
            panic!("runtime disabled")
        }
    }
}

#[cfg(feature = "tokio")]
impl tokio::io::AsyncRead for Socket {
    fn poll_read(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        use std::pin::Pin;
        match &mut self.kind {
            Kind::Tcp(t) => Pin::new(t).poll_read(cx, buf),
            #[cfg(unix)]
            Kind::Unix(u) => Pin::new(u).poll_read(cx, buf),
        }
    }
}

#[cfg(feature = "tokio")]
impl tokio::io::AsyncWrite for Socket {
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<io::Result<usize>> {
        use std::pin::Pin;
        match &mut self.kind {
            Kind::Tcp(t) => Pin::new(t).poll_write(cx, buf),
            #[cfg(unix)]
            Kind::Unix(u) => Pin::new(u).poll_write(cx, buf),
        }
    }

    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        use std::pin::Pin;
        match &mut self.kind {
            Kind::Tcp(t) => Pin::new(t).poll_flush(cx),
            #[cfg(unix)]
            Kind::Unix(u) => Pin::new(u).poll_flush(cx),
        }
    }

    fn poll_shutdown(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<io::Result<()>> {
        use std::pin::Pin;
        match &mut self.kind {
            Kind::Tcp(t) => Pin::new(t).poll_shutdown(cx),
            #[cfg(unix)]
            Kind::Unix(u) => Pin::new(u).poll_shutdown(cx),
        }
    }

    fn is_write_vectored(&self) -> bool {
        match &self.kind {
            Kind::Tcp(t) => t.is_write_vectored(),
            #[cfg(unix)]
            Kind::Unix(u) => u.is_write_vectored(),
        }
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, _f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            #[cfg(feature = "tokio")]
            Kind::Tcp(tcp) => std::fmt::Debug::fmt(tcp, _f),
            #[cfg(all(feature = "tokio", unix))]
            Kind::Unix(unix) => std::fmt::Debug::fmt(unix, _f),
            #[cfg(not(feature = "tokio"))]
            Kind::Disabled(i) => match *i { },
        }
    }
}
