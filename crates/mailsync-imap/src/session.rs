//! Authenticated IMAP session

use crate::collector::StreamCollector;
use crate::window::MessageWindow;
use crate::xoauth2::{XOAuth2Authenticator, MECHANISM};
use crate::{ImapError, ImapResult, Mailbox, Message};
use async_imap::Session;
use async_native_tls::TlsStream;
use async_std::net::TcpStream;
use futures::io::{AsyncRead, AsyncWrite};
use futures::SinkExt;
use imap_proto::{MailboxDatum, RequestId, Response, Status};
use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;
use tracing::{debug, info, Instrument, Span};

// Type alias for our TLS stream
type ImapStream = TlsStream<TcpStream>;

/// FETCH items for message listings
pub const FETCH_ALL: &str = "(FLAGS INTERNALDATE RFC822.SIZE ENVELOPE)";

/// FETCH items for a single message, adding the body structure
pub const FETCH_FULL: &str = "(FLAGS INTERNALDATE RFC822.SIZE ENVELOPE BODY)";

/// Session settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bound for connecting and for each wait on the server; `None` waits indefinitely
    pub timeout: Option<Duration>,
    /// Span that session events are recorded under
    pub span: Span,
    /// Items buffered between the IMAP stream and the collected result
    pub buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            span: Span::current(),
            buffer: crate::collector::DEFAULT_CAPACITY,
        }
    }
}

impl SessionConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// One authenticated connection to a mailbox server
///
/// Operations take `&mut self`: a session serves one logical operation at a
/// time and remembers only the most recent selection.
pub struct MailSession<T = ImapStream>
where
    T: AsyncRead + AsyncWrite + Unpin + fmt::Debug + Send,
{
    server: String,
    identity: String,
    session: Option<Session<T>>,
    config: SessionConfig,
    collector: StreamCollector,
}

impl MailSession<ImapStream> {
    /// Dial `server` ("host:port") over TLS and authenticate with XOAUTH2
    pub async fn connect(
        server: &str,
        identity: &str,
        access_token: &str,
        config: SessionConfig,
    ) -> ImapResult<Self> {
        let span = config.span.clone();
        let timeout = config.timeout;

        let dial = async {
            info!("Connecting to {}", server);
            let host = host_of(server);

            let tcp_stream = TcpStream::connect(server)
                .await
                .map_err(|e| ImapError::ConnectionFailed {
                    server: server.to_string(),
                    reason: e.to_string(),
                })?;

            let tls_connector = async_native_tls::TlsConnector::new();
            let tls_stream = tls_connector
                .connect(host, tcp_stream)
                .await
                .map_err(|e| ImapError::TlsError {
                    server: server.to_string(),
                    reason: e.to_string(),
                })?;

            debug!("TLS connection established");
            Ok(tls_stream)
        };

        let stream = bounded(timeout, "connect", dial).instrument(span).await?;
        Self::establish(stream, server, identity, access_token, config).await
    }
}

impl<T> MailSession<T>
where
    T: AsyncRead + AsyncWrite + Unpin + fmt::Debug + Send,
{
    /// Authenticate over an already connected stream
    pub async fn establish(
        stream: T,
        server: &str,
        identity: &str,
        access_token: &str,
        config: SessionConfig,
    ) -> ImapResult<Self> {
        let span = config.span.clone();
        let timeout = config.timeout;

        let handshake = async {
            let mut client = async_imap::Client::new(stream);

            // authenticate() expects the "+" continuation, so the greeting goes first
            client
                .read_response()
                .await
                .ok_or_else(|| ImapError::ConnectionFailed {
                    server: server.to_string(),
                    reason: "connection closed before greeting".to_string(),
                })?
                .map_err(|e| ImapError::ConnectionFailed {
                    server: server.to_string(),
                    reason: format!("failed to read greeting: {}", e),
                })?;

            info!("Authenticating with XOAUTH2 for {}", identity);

            let auth = XOAuth2Authenticator::new(identity, access_token);
            let session = client
                .authenticate(MECHANISM, auth)
                .await
                .map_err(|(e, _)| ImapError::AuthenticationFailed {
                    identity: identity.to_string(),
                    reason: e.to_string(),
                })?;

            info!("XOAUTH2 authentication successful");
            Ok(session)
        };

        let session = bounded(timeout, "authenticate", handshake)
            .instrument(span)
            .await?;

        Ok(Self {
            server: server.to_string(),
            identity: identity.to_string(),
            session: Some(session),
            collector: StreamCollector::new(config.buffer),
            config,
        })
    }

    /// Server address this session was opened against
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Account the session is authenticated as
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Check if the session still holds a connection
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Get the session, returning an error if not connected
    fn session_mut(&mut self) -> ImapResult<&mut Session<T>> {
        self.session.as_mut().ok_or(ImapError::NotConnected)
    }

    /// List every mailbox (`LIST "" "*"`)
    pub async fn mailboxes(&mut self) -> ImapResult<Vec<Mailbox>> {
        let span = self.config.span.clone();
        let timeout = self.config.timeout;
        let collector = self.collector;
        let session = self.session_mut()?;

        let list = collector.collect(|mut tx| async move {
            let tag = session
                .run_command("LIST \"\" \"*\"")
                .await
                .map_err(|e| ImapError::ListFailed(e.to_string()))?;

            loop {
                let next = within(timeout, "list mailboxes", session.read_response()).await?;
                let response = received(next).map_err(ImapError::ListFailed)?;
                match response.parsed() {
                    Response::MailboxData(MailboxDatum::List {
                        name_attributes,
                        delimiter,
                        name,
                    }) => {
                        tx.send(Mailbox::from_list(name, delimiter.as_deref(), name_attributes))
                            .await
                            .map_err(|e| ImapError::StreamClosed(e.to_string()))?;
                    }
                    parsed => {
                        if let Some(status) = completion(parsed, &tag) {
                            return status.map_err(ImapError::ListFailed);
                        }
                    }
                }
            }
        });

        let mailboxes = list.instrument(span).await?;
        debug!("Found {} mailboxes", mailboxes.len());
        Ok(mailboxes)
    }

    /// Fetch a window of messages counted back from the newest one
    ///
    /// An offset past the oldest message yields an empty list.
    pub async fn messages(
        &mut self,
        mailbox: &str,
        offset: u32,
        limit: u32,
    ) -> ImapResult<Vec<Message>> {
        let total = self.examine(mailbox).await?;

        let Some(range) = MessageWindow::new(offset, limit).resolve(total) else {
            debug!(
                "Offset {} is past the {} messages in {}",
                offset, total, mailbox
            );
            return Ok(Vec::new());
        };

        debug!("Fetching {} from {}", range, mailbox);
        self.fetch(&range.to_string(), FETCH_ALL, mailbox).await
    }

    /// Fetch one message by its Message-ID header
    pub async fn get_message(&mut self, mailbox: &str, id: &str) -> ImapResult<Message> {
        self.examine(mailbox).await?;
        let seqs = self.search_message_id(id).await?;

        let first = seqs[0].to_string();
        self.fetch(&first, FETCH_FULL, id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ImapError::MessageNotFound(id.to_string()))
    }

    /// Add `label` to the flags of the message with the given Message-ID
    ///
    /// The result is not read back.
    pub async fn label_message(&mut self, mailbox: &str, id: &str, label: &str) -> ImapResult<()> {
        self.select(mailbox).await?;
        let seqs = self.search_message_id(id).await?;

        let span = self.config.span.clone();
        let timeout = self.config.timeout;
        let session = self.session_mut()?;
        let sequence_set = join_seqs(&seqs);

        let store = async {
            session
                .run_command_and_check_ok(format!(
                    "STORE {} +FLAGS.SILENT ({})",
                    sequence_set, label
                ))
                .await
                .map_err(|e| ImapError::StoreFailed {
                    id: id.to_string(),
                    reason: e.to_string(),
                })
        };

        bounded(timeout, "store flags", store).instrument(span).await?;
        info!("Labeled message {} with {}", id, label);
        Ok(())
    }

    /// Log out and drop the connection
    ///
    /// The handle is released on the first call; later calls do nothing.
    pub async fn close(&mut self) -> ImapResult<()> {
        let span = self.config.span.clone();
        if let Some(mut session) = self.session.take() {
            async {
                info!("Logging out of {}", self.server);
                session
                    .logout()
                    .await
                    .map_err(|e| ImapError::ServerError(e.to_string()))
            }
            .instrument(span)
            .await?;
        }
        Ok(())
    }

    /// Select read-only and return the message count
    async fn examine(&mut self, mailbox: &str) -> ImapResult<u32> {
        let span = self.config.span.clone();
        let timeout = self.config.timeout;
        let session = self.session_mut()?;

        let examine = async {
            session
                .examine(mailbox)
                .await
                .map_err(|e| ImapError::SelectFailed {
                    mailbox: mailbox.to_string(),
                    reason: e.to_string(),
                })
        };

        let status = bounded(timeout, "examine", examine).instrument(span).await?;
        debug!("Mailbox {} has {} messages", mailbox, status.exists);
        Ok(status.exists)
    }

    /// Select read-write and return the message count
    async fn select(&mut self, mailbox: &str) -> ImapResult<u32> {
        let span = self.config.span.clone();
        let timeout = self.config.timeout;
        let session = self.session_mut()?;

        let select = async {
            session
                .select(mailbox)
                .await
                .map_err(|e| ImapError::SelectFailed {
                    mailbox: mailbox.to_string(),
                    reason: e.to_string(),
                })
        };

        let status = bounded(timeout, "select", select).instrument(span).await?;
        Ok(status.exists)
    }

    /// Sequence numbers of unseen messages whose Message-ID equals `id`, ascending
    async fn search_message_id(&mut self, id: &str) -> ImapResult<Vec<u32>> {
        let span = self.config.span.clone();
        let timeout = self.config.timeout;
        let session = self.session_mut()?;

        let search_failed = |reason: String| ImapError::SearchFailed {
            id: id.to_string(),
            reason,
        };

        let search = async {
            let tag = session
                .run_command(format!("SEARCH UNSEEN HEADER Message-ID {}", quote(id)))
                .await
                .map_err(|e| search_failed(e.to_string()))?;

            let mut seqs = Vec::new();
            loop {
                let next = within(timeout, "search", session.read_response()).await?;
                let response = received(next).map_err(search_failed)?;
                match response.parsed() {
                    Response::MailboxData(MailboxDatum::Search(found)) => {
                        seqs.extend_from_slice(found)
                    }
                    parsed => {
                        if let Some(status) = completion(parsed, &tag) {
                            status.map_err(search_failed)?;
                            return Ok::<_, ImapError>(seqs);
                        }
                    }
                }
            }
        };

        let mut seqs: Vec<u32> = search.instrument(span).await?;
        seqs.sort_unstable();
        seqs.dedup();

        if seqs.is_empty() {
            return Err(ImapError::MessageNotFound(id.to_string()));
        }
        debug!("Message {} matched sequence numbers {:?}", id, seqs);
        Ok(seqs)
    }

    async fn fetch(&mut self, sequence_set: &str, items: &str, target: &str) -> ImapResult<Vec<Message>> {
        let span = self.config.span.clone();
        let timeout = self.config.timeout;
        let collector = self.collector;
        let session = self.session_mut()?;

        let fetch_failed = |reason: String| ImapError::FetchFailed {
            target: target.to_string(),
            reason,
        };

        let fetch = collector.collect(|mut tx| async move {
            let tag = session
                .run_command(format!("FETCH {} {}", sequence_set, items))
                .await
                .map_err(|e| fetch_failed(e.to_string()))?;

            loop {
                let next = within(timeout, "fetch", session.read_response()).await?;
                let response = received(next).map_err(fetch_failed)?;
                match response.parsed() {
                    Response::Fetch(seq, attributes) => {
                        tx.send(Message::from_attributes(*seq, attributes))
                            .await
                            .map_err(|e| ImapError::StreamClosed(e.to_string()))?;
                    }
                    parsed => {
                        if let Some(status) = completion(parsed, &tag) {
                            return status.map_err(fetch_failed);
                        }
                    }
                }
            }
        });

        let messages = fetch.instrument(span).await?;
        debug!("Fetched {} messages", messages.len());
        Ok(messages)
    }
}

impl<T> fmt::Debug for MailSession<T>
where
    T: AsyncRead + AsyncWrite + Unpin + fmt::Debug + Send,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailSession")
            .field("server", &self.server)
            .field("identity", &self.identity)
            .field("connected", &self.session.is_some())
            .field("timeout", &self.config.timeout)
            .finish()
    }
}

/// Run `fut`, failing with `Timeout` once `timeout` elapses
async fn within<F: Future>(timeout: Option<Duration>, what: &str, fut: F) -> ImapResult<F::Output> {
    match timeout {
        Some(limit) => async_std::future::timeout(limit, fut)
            .await
            .map_err(|_| ImapError::Timeout(format!("{} after {:?}", what, limit))),
        None => Ok(fut.await),
    }
}

async fn bounded<F, R>(timeout: Option<Duration>, what: &str, fut: F) -> ImapResult<R>
where
    F: Future<Output = ImapResult<R>>,
{
    within(timeout, what, fut).await?
}

/// Unwrap the next response of a command in flight
fn received<R>(next: Option<io::Result<R>>) -> Result<R, String> {
    match next {
        Some(Ok(response)) => Ok(response),
        Some(Err(e)) => Err(e.to_string()),
        None => Err("connection closed before the command completed".to_string()),
    }
}

/// Outcome of the command tagged `tag`, once `response` completes it
fn completion(response: &Response<'_>, tag: &RequestId) -> Option<Result<(), String>> {
    match response {
        Response::Done {
            tag: done,
            status,
            information,
            ..
        } if done == tag => {
            let information = information.as_deref().unwrap_or("");
            Some(match status {
                Status::Ok => Ok(()),
                Status::No => Err(format!("NO {}", information)),
                Status::Bad => Err(format!("BAD {}", information)),
                other => Err(format!("{:?} {}", other, information)),
            })
        }
        _ => None,
    }
}

/// Host part of a "host:port" address
fn host_of(server: &str) -> &str {
    match server.rsplit_once(':') {
        Some((host, port)) if port.parse::<u16>().is_ok() => host,
        _ => server,
    }
}

/// IMAP quoted string
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn join_seqs(seqs: &[u32]) -> String {
    seqs.iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
