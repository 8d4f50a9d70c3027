//! IMAP inbox access for reply detection.
//!
//! This module is split into:
//! - `mod.rs` - Types, structs, and public API
//! - `client.rs` - Connection, unseen search, fetch, and flag operations

mod client;

use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_util::compat::Compat;

use crate::config::ImapConfig;

pub(crate) type ImapSession = async_imap::Session<Compat<TlsStream<TcpStream>>>;

pub struct ImapClient {
    session: Option<ImapSession>,
    config: ImapConfig,
    username: String,
    password: String,
}

impl ImapClient {
    pub fn new(config: ImapConfig, username: String, password: String) -> Self {
        Self {
            session: None,
            config,
            username,
            password,
        }
    }
}
