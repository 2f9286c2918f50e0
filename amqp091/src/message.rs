//! Messages handed to callers and deliveries

use amqp091_types::{BasicProperties, Method};
use bytes::Bytes;

/// Properties and body of a message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Content {
    /// Properties from the content header
    pub properties: BasicProperties,

    /// Body reassembled from all body frames
    pub body: Bytes,
}

impl Content {
    /// Creates a new [`Content`]
    pub fn new(properties: BasicProperties, body: impl Into<Bytes>) -> Self {
        Self {
            properties,
            body: body.into(),
        }
    }
}

/// A method, together with its content if the method carries any
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// The method
    pub method: Method,

    /// Content that followed the method
    pub content: Option<Content>,
}

impl Message {
    /// Get the method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Get the content
    pub fn content(&self) -> Option<&Content> {
        self.content.as_ref()
    }

    /// Get the body, empty if there is no content
    pub fn body(&self) -> &[u8] {
        self.content.as_ref().map(|c| &c.body[..]).unwrap_or_default()
    }
}

impl From<Method> for Message {
    fn from(method: Method) -> Self {
        Self {
            method,
            content: None,
        }
    }
}
