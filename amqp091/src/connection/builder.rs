use std::{convert::TryInto, sync::Arc, time::Duration};

use amqp091_types::{constants::FRAME_MIN_SIZE, FieldTable, FieldValue};
use percent_encoding::percent_decode_str;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    sync::mpsc,
};
use url::Url;

use crate::auth::{Plain, SaslMechanism};

use super::{
    engine::{ConnectionEngine, LocalConfig},
    ConnectionHandle, OpenError, Tuning, DEFAULT_CHANNEL_MAX, DEFAULT_FRAME_MAX,
    DEFAULT_HEARTBEAT, DEFAULT_PORT,
};

/// Default size of the buffer between handles and the event loop
pub const DEFAULT_CONTROL_CHAN_BUF: usize = 128;

/// Default virtual host
pub const DEFAULT_VHOST: &str = "/";

/// Default locale
pub const DEFAULT_LOCALE: &str = "en_US";

/// Default time allowed for the whole handshake
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time allowed for the peer to answer `connection.close`
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection builder
#[derive(Debug)]
pub struct Builder {
    /// Virtual host to open
    pub vhost: String,

    /// SASL mechanisms in order of preference. PLAIN with guest/guest is used
    /// if none is given
    pub mechanisms: Vec<Box<dyn SaslMechanism>>,

    /// Proposed channel-max, 0 for no preference
    pub channel_max: u16,

    /// Proposed frame-max, 0 for no preference
    pub frame_max: u32,

    /// Proposed heartbeat interval in seconds, 0 disables heartbeats
    pub heartbeat: u16,

    /// Locale announced in `connection.start-ok`
    pub locale: String,

    /// Properties announced in `connection.start-ok`
    pub client_properties: FieldTable,

    /// Time allowed for the handshake
    pub handshake_timeout: Duration,

    /// Time allowed for the peer to confirm a close
    pub close_timeout: Duration,

    /// Size of the buffer between handles and the event loop
    pub buffer_size: usize,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// Creates a new builder with the default configuration
    pub fn new() -> Self {
        Self {
            vhost: DEFAULT_VHOST.to_string(),
            mechanisms: Vec::new(),
            channel_max: DEFAULT_CHANNEL_MAX,
            frame_max: DEFAULT_FRAME_MAX,
            heartbeat: DEFAULT_HEARTBEAT,
            locale: DEFAULT_LOCALE.to_string(),
            client_properties: default_client_properties(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            buffer_size: DEFAULT_CONTROL_CHAN_BUF,
        }
    }

    /// Sets the virtual host
    pub fn vhost(mut self, vhost: impl Into<String>) -> Self {
        self.vhost = vhost.into();
        self
    }

    /// Adds a SASL mechanism after the ones already configured
    pub fn sasl_mechanism(mut self, mechanism: impl SaslMechanism + 'static) -> Self {
        self.mechanisms.push(Box::new(mechanism));
        self
    }

    /// Replaces the SASL mechanisms
    pub fn sasl_mechanisms(mut self, mechanisms: Vec<Box<dyn SaslMechanism>>) -> Self {
        self.mechanisms = mechanisms;
        self
    }

    /// Proposes a channel-max
    pub fn channel_max(mut self, channel_max: u16) -> Self {
        self.channel_max = channel_max;
        self
    }

    /// Proposes a frame-max. Values below the protocol minimum of 4096 are
    /// raised to it, 0 leaves the choice to the broker
    pub fn frame_max(mut self, frame_max: u32) -> Self {
        self.frame_max = match frame_max {
            0 => 0,
            n => n.max(FRAME_MIN_SIZE),
        };
        self
    }

    /// Proposes a heartbeat interval in seconds
    pub fn heartbeat(mut self, heartbeat: u16) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Sets the locale
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Adds or replaces a client property
    pub fn client_property(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.client_properties.insert(key.into(), value);
        self
    }

    /// Sets the handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets the close timeout
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Sets the control buffer size
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Opens a connection over an established stream
    pub async fn open_with_stream<Io>(mut self, stream: Io) -> Result<ConnectionHandle, OpenError>
    where
        Io: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        if self.mechanisms.is_empty() {
            self.mechanisms.push(Box::new(Plain::new("guest", "guest")));
        }

        let (control_tx, control_rx) = mpsc::channel(self.buffer_size.max(1));
        let config = LocalConfig {
            vhost: self.vhost,
            mechanisms: self.mechanisms,
            tuning: Tuning {
                channel_max: self.channel_max,
                frame_max: self.frame_max,
                heartbeat: self.heartbeat,
            },
            locale: self.locale,
            client_properties: self.client_properties,
            close_timeout: self.close_timeout,
        };

        let engine = tokio::time::timeout(
            self.handshake_timeout,
            ConnectionEngine::open(stream, config, control_rx),
        )
        .await
        .map_err(|_| OpenError::Timeout)??;

        let tuning = engine.tuning();
        let server_properties = Arc::new(engine.server_properties().clone());
        let (state, blocked) = engine.subscribe();

        #[cfg(feature = "tracing")]
        tracing::debug!(?tuning, "Connection opened");
        #[cfg(feature = "log")]
        log::debug!("Connection opened {:?}", tuning);

        let handle = engine.spawn();
        Ok(ConnectionHandle {
            control: control_tx,
            handle,
            outcome: None,
            server_properties,
            tuning,
            state,
            blocked,
        })
    }

    /// Connects over TCP and opens a connection
    ///
    /// Credentials in the url are tried first, with the PLAIN mechanism. The
    /// path selects the virtual host, `%2f` standing for `/`.
    pub async fn open(
        mut self,
        url: impl TryInto<Url, Error = url::ParseError>,
    ) -> Result<ConnectionHandle, OpenError> {
        let url: Url = url.try_into()?;
        if url.scheme() != "amqp" {
            return Err(OpenError::InvalidScheme(url.scheme().to_string()));
        }

        if !url.username().is_empty() {
            let username = decode(url.username());
            let password = url.password().map(decode).unwrap_or_default();
            self.mechanisms
                .insert(0, Box::new(Plain::new(username, password)));
        }
        if let Some(vhost) = vhost_from_path(url.path()) {
            self.vhost = vhost;
        }

        let addrs = url.socket_addrs(|| Some(DEFAULT_PORT))?;
        let stream = TcpStream::connect(&*addrs).await?; // std::io::Error
        stream.set_nodelay(true)?;
        self.open_with_stream(stream).await
    }
}

fn default_client_properties() -> FieldTable {
    let mut capabilities = FieldTable::new();
    capabilities.insert("publisher_confirms", true);
    capabilities.insert("consumer_cancel_notify", true);
    capabilities.insert("basic.nack", true);
    capabilities.insert("connection.blocked", true);
    capabilities.insert("authentication_failure_close", true);

    let mut properties = FieldTable::new();
    properties.insert("product", env!("CARGO_PKG_NAME"));
    properties.insert("version", env!("CARGO_PKG_VERSION"));
    properties.insert("platform", "Rust");
    properties.insert("capabilities", capabilities);
    properties
}

fn decode(component: &str) -> String {
    percent_decode_str(component).decode_utf8_lossy().into_owned()
}

/// `None` keeps the configured vhost
fn vhost_from_path(path: &str) -> Option<String> {
    match path {
        "" | "/" => None,
        path => Some(decode(path.strip_prefix('/').unwrap_or(path))),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use amqp091_types::FieldValue;

    use super::{vhost_from_path, Builder};

    #[test]
    fn vhost_comes_from_the_path() {
        assert_eq!(vhost_from_path(""), None);
        assert_eq!(vhost_from_path("/"), None);
        assert_eq!(vhost_from_path("/%2f"), Some("/".to_string()));
        assert_eq!(vhost_from_path("/staging"), Some("staging".to_string()));
        assert_eq!(vhost_from_path("/a%2Fb"), Some("a/b".to_string()));
    }

    #[test]
    fn frame_max_respects_the_protocol_minimum() {
        assert_eq!(Builder::new().frame_max(512).frame_max, 4096);
        assert_eq!(Builder::new().frame_max(0).frame_max, 0);
        assert_eq!(Builder::new().frame_max(65_536).frame_max, 65_536);
    }

    #[test]
    fn defaults() {
        let builder = Builder::new();
        assert_eq!(builder.vhost, "/");
        assert_eq!(builder.heartbeat, 10);
        assert_eq!(builder.frame_max, 131_072);
        assert_eq!(builder.channel_max, 0);
        assert_eq!(builder.locale, "en_US");
        assert_eq!(builder.handshake_timeout, Duration::from_secs(30));
        assert_eq!(builder.close_timeout, Duration::from_secs(10));
        assert!(builder.mechanisms.is_empty());

        let capabilities = match builder.client_properties.get("capabilities") {
            Some(FieldValue::Table(table)) => table.clone(),
            other => panic!("capabilities missing: {:?}", other),
        };
        assert_eq!(
            capabilities.get("connection.blocked"),
            Some(&FieldValue::Bool(true))
        );
        assert_eq!(
            builder.client_properties.get("product"),
            Some(&FieldValue::from("amqp091"))
        );
    }

    #[test]
    fn setters_chain() {
        let builder = Builder::new()
            .vhost("staging")
            .heartbeat(0)
            .channel_max(16)
            .client_property("connection_name", "worker-1");
        assert_eq!(builder.vhost, "staging");
        assert_eq!(builder.heartbeat, 0);
        assert_eq!(builder.channel_max, 16);
        assert!(builder.client_properties.contains_key("connection_name"));
    }
}
