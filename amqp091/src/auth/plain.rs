use amqp091_types::{FieldTable, LongString};
use bytes::{BufMut, BytesMut};

use super::{Error, SaslMechanism};

/// Name of the PLAIN mechanism
pub const PLAIN: &str = "PLAIN";
/// Name of the AMQPLAIN mechanism
pub const AMQPLAIN: &str = "AMQPLAIN";

/// The PLAIN mechanism, `\0username\0password`
#[derive(Clone)]
pub struct Plain {
    username: String,
    password: String,
}

impl Plain {
    /// Creates a PLAIN mechanism
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Get the username
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl std::fmt::Debug for Plain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plain")
            .field("username", &self.username)
            .field("password", &"******")
            .finish()
    }
}

impl SaslMechanism for Plain {
    fn name(&self) -> &'static str {
        PLAIN
    }

    fn initial_response(&self) -> Result<LongString, Error> {
        let username = self.username.as_bytes();
        let password = self.password.as_bytes();
        let mut buf = Vec::with_capacity(username.len() + password.len() + 2);
        buf.put_u8(0);
        buf.put_slice(username);
        buf.put_u8(0);
        buf.put_slice(password);
        Ok(LongString::from(buf))
    }
}

/// RabbitMQ's AMQPLAIN mechanism. The response is a field table with `LOGIN`
/// and `PASSWORD` entries, written without the table's length prefix
#[derive(Clone)]
pub struct AMQPlain {
    username: String,
    password: String,
}

impl AMQPlain {
    /// Creates an AMQPLAIN mechanism
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for AMQPlain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AMQPlain")
            .field("username", &self.username)
            .field("password", &"******")
            .finish()
    }
}

impl SaslMechanism for AMQPlain {
    fn name(&self) -> &'static str {
        AMQPLAIN
    }

    fn initial_response(&self) -> Result<LongString, Error> {
        let mut table = FieldTable::new();
        table.insert("LOGIN", self.username.as_str());
        table.insert("PASSWORD", self.password.as_str());

        let mut buf = BytesMut::new();
        table.encode_entries(&mut buf)?;
        Ok(LongString::from(buf.freeze()))
    }
}

#[cfg(test)]
mod tests {
    use amqp091_types::{FieldTable, FieldValue};

    use super::{AMQPlain, Plain};
    use crate::auth::SaslMechanism;

    #[test]
    fn plain_initial_response() {
        let profile = Plain::new("user", "example");
        let response = profile.initial_response().unwrap();
        assert_eq!(response.as_bytes(), b"\0user\0example");
    }

    #[test]
    fn amqplain_response_is_an_unprefixed_table() {
        let profile = AMQPlain::new("guest", "secret");
        let response = profile.initial_response().unwrap();

        // first entry starts right away with the key length
        assert_eq!(&response.as_bytes()[..6], b"\x05LOGIN");
        let table = FieldTable::decode_entries(response.into_bytes()).unwrap();
        assert_eq!(table.get("LOGIN"), Some(&FieldValue::from("guest")));
        assert_eq!(table.get("PASSWORD"), Some(&FieldValue::from("secret")));
    }

    #[test]
    fn debug_hides_the_password() {
        let debug = format!("{:?}", Plain::new("guest", "hunter2"));
        assert!(!debug.contains("hunter2"));
    }
}
