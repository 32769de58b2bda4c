//! NNTP posting client.
//!
//! A [`NntpSession`] drives one server connection through greeting,
//! optional `AUTHINFO USER/PASS`, any number of `POST`s and `QUIT`. The
//! transport is any [`NntpIo`] so sessions can run over TCP, TLS, or an
//! in-memory duplex pipe.

mod error;
mod response;
mod session;
mod tls;

pub use error::NntpError;
pub use response::{code_matches, parse_status_line, Reply};
pub use session::{BoxedIo, NntpIo, NntpSession, SessionState};
pub use tls::{build_tls_config, open_transport, CONNECT_TIMEOUT};
