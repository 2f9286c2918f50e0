//! SASL mechanisms used while opening a connection
//!
//! The broker announces the mechanisms it supports in `connection.start`. The
//! client picks the first of its own mechanisms, in the order they were
//! configured, that the broker also supports.

use std::fmt::Debug;

use amqp091_types::LongString;

mod plain;
pub use plain::*;

/// Name of the ANONYMOUS mechanism
pub const ANONYMOUS: &str = "ANONYMOUS";
/// Name of the EXTERNAL mechanism
pub const EXTERNAL: &str = "EXTERNAL";

/// Errors of a SASL exchange
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The mechanism does not expect a challenge
    #[error("{mechanism} does not expect a challenge")]
    UnexpectedChallenge {
        /// Name of the mechanism
        mechanism: &'static str,
    },

    /// The response could not be encoded
    #[error(transparent)]
    Encode(#[from] amqp091_types::Error),
}

/// A SASL mechanism
pub trait SaslMechanism: Debug + Send + Sync {
    /// Name of the mechanism as announced by the broker, eg. `"PLAIN"`
    fn name(&self) -> &'static str;

    /// Response sent along with `connection.start-ok`
    fn initial_response(&self) -> Result<LongString, Error>;

    /// Answers a `connection.secure` challenge
    fn respond(&mut self, challenge: &LongString) -> Result<LongString, Error> {
        let _ = challenge;
        Err(Error::UnexpectedChallenge {
            mechanism: self.name(),
        })
    }
}

/// The ANONYMOUS mechanism, no credentials at all
#[derive(Debug, Clone, Default)]
pub struct Anonymous;

impl SaslMechanism for Anonymous {
    fn name(&self) -> &'static str {
        ANONYMOUS
    }

    fn initial_response(&self) -> Result<LongString, Error> {
        Ok(LongString::default())
    }
}

/// The EXTERNAL mechanism, credentials come from outside the connection
/// (eg. a TLS client certificate)
#[derive(Debug, Clone, Default)]
pub struct External;

impl SaslMechanism for External {
    fn name(&self) -> &'static str {
        EXTERNAL
    }

    fn initial_response(&self) -> Result<LongString, Error> {
        Ok(LongString::default())
    }
}

/// Picks the first of `candidates` that is listed in the broker's space
/// separated `server_mechanisms`
pub fn select_mechanism(
    candidates: &[Box<dyn SaslMechanism>],
    server_mechanisms: &str,
) -> Option<usize> {
    candidates.iter().position(|candidate| {
        server_mechanisms
            .split_ascii_whitespace()
            .any(|offered| offered == candidate.name())
    })
}

#[cfg(test)]
mod tests {
    use super::{select_mechanism, Anonymous, External, Plain, SaslMechanism};

    fn candidates() -> Vec<Box<dyn SaslMechanism>> {
        vec![
            Box::new(External),
            Box::new(Plain::new("guest", "guest")),
            Box::new(Anonymous),
        ]
    }

    #[test]
    fn client_order_wins() {
        let candidates = candidates();
        let index = select_mechanism(&candidates, "AMQPLAIN PLAIN ANONYMOUS").unwrap();
        assert_eq!(candidates[index].name(), "PLAIN");
    }

    #[test]
    fn no_common_mechanism() {
        let candidates = candidates();
        assert_eq!(select_mechanism(&candidates, "AMQPLAIN SCRAM-SHA-256"), None);
        assert_eq!(select_mechanism(&candidates, ""), None);
    }

    #[test]
    fn names_must_match_exactly() {
        let candidates: Vec<Box<dyn SaslMechanism>> = vec![Box::new(Plain::new("a", "b"))];
        assert_eq!(select_mechanism(&candidates, "AMQPLAIN"), None);
    }

    #[test]
    fn anonymous_has_no_challenge_rounds() {
        let mut anonymous = Anonymous;
        assert!(anonymous.initial_response().unwrap().is_empty());
        assert!(anonymous.respond(&"challenge".into()).is_err());
    }
}
