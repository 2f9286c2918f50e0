#![deny(missing_debug_implementations)]
#![warn(missing_docs)]

//! Wire data types of the AMQP 0-9-1 protocol
//!
//! This crate carries no I/O. It defines the argument encoding shared by
//! every method (big-endian integers, length-prefixed strings, packed bits
//! and field tables), the closed set of protocol [`Method`]s and the
//! content-header [`BasicProperties`].

pub mod codec;
pub mod constants;
pub mod error;
pub mod methods;
pub mod primitives;
pub mod properties;
pub mod table;

pub use error::Error;
pub use methods::{Method, MethodId};
pub use primitives::{Decimal, LongString, ShortString, Timestamp};
pub use properties::{BasicProperties, ContentHeader};
pub use table::{FieldTable, FieldValue};
