//! Connection startup phase.
//!
//! <https://www.postgresql.org/docs/17/protocol-flow.html#PROTOCOL-FLOW-START-UP>
use md5::{Digest, Md5};
use std::fmt::Write;

use crate::{
    Result,
    common::verbose,
    connection::Config,
    postgres::{
        TransactionStatus,
        backend::{Authentication, BackendKeyData, BackendMessage},
        frontend,
    },
    transport::{PgTransport, PgTransportExt},
};

/// Everything the backend reported between `Startup` and `ReadyForQuery`.
pub(crate) struct StartupOutcome {
    pub key_data: Option<BackendKeyData>,
    pub status: TransactionStatus,
}

/// Perform the startup message exchange and authentication.
///
/// `ParameterStatus` reports are absorbed by the transport; this returns
/// the backend key data and the first transaction status.
pub(crate) async fn startup<IO: PgTransport>(config: &Config, mut io: IO) -> Result<StartupOutcome> {
    // To begin a session, a frontend opens a connection to the server
    // and sends a startup message.
    io.send_startup(frontend::Startup {
        user: config.user(),
        database: config.dbname(),
        params: config.params(),
    });
    io.flush().await?;

    // The server then sends an appropriate authentication request message,
    // to which the frontend must reply with an appropriate authentication
    // response message. For all methods this library speaks there is at
    // most one request and one response.
    loop {
        match io.recv().await? {
            Authentication::Ok => break,
            Authentication::CleartextPassword => {
                io.send(frontend::PasswordMessage { password: require_password(config)? });
                io.flush().await?;
            }
            Authentication::MD5Password { salt } => {
                let hashed = md5_password(config.user(), require_password(config)?, salt);
                io.send(frontend::PasswordMessage { password: &hashed });
                io.flush().await?;
            }
            other => return Err(UnsupportedAuth { method: other.method() }.into()),
        }
    }

    // After AuthenticationOk a backend process is being started; the
    // frontend waits through ParameterStatus and BackendKeyData until
    // ReadyForQuery.
    let mut key_data = None;

    loop {
        match io.recv().await? {
            BackendMessage::ReadyForQuery(rfq) => {
                return Ok(StartupOutcome { key_data, status: rfq.status });
            }
            BackendMessage::BackendKeyData(new_key_data) => {
                verbose!("backend pid {}", new_key_data.process_id);
                key_data = Some(new_key_data);
            }
            f => return Err(f.unexpected("starting up").into()),
        }
    }
}

fn require_password(config: &Config) -> Result<&str> {
    match config.password() {
        Some(password) => Ok(password),
        None => Err(PasswordRequired.into()),
    }
}

/// The MD5 challenge response:
/// `"md5" + hex(md5(hex(md5(password + user)) + salt))`.
fn md5_password(user: &str, password: &str, salt: [u8; 4]) -> String {
    let mut hasher = Md5::new();
    hasher.update(password);
    hasher.update(user);

    let mut inner = String::with_capacity(35);
    let _ = write!(inner, "{:x}", hasher.finalize_reset());

    hasher.update(&inner);
    hasher.update(salt);

    let mut output = String::with_capacity(35);
    let _ = write!(output, "md5{:x}", hasher.finalize());
    output
}

/// The server requested an authentication method this library does not
/// speak.
#[derive(Debug)]
pub struct UnsupportedAuth {
    method: &'static str,
}

impl std::error::Error for UnsupportedAuth { }

impl std::fmt::Display for UnsupportedAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} authentication is not supported", self.method)
    }
}

/// The server challenged for a password but none was configured.
#[derive(Debug)]
pub struct PasswordRequired;

impl std::error::Error for PasswordRequired { }

impl std::fmt::Display for PasswordRequired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("the server requires a password, none was configured")
    }
}

#[cfg(test)]
mod test {
    use super::md5_password;

    #[test]
    fn md5_password_shape() {
        let hashed = md5_password("bob", "secret", *b"salt");

        assert_eq!(hashed.len(), 35);
        assert!(hashed.starts_with("md5"));
        assert!(hashed[3..].bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn md5_password_depends_on_salt() {
        let a = md5_password("bob", "secret", *b"salt");
        let b = md5_password("bob", "secret", *b"pepr");
        assert_ne!(a, b);
    }
}
