//! Methods of the queue class (class id 50)

use crate::{FieldTable, ShortString};

method! {
    /// Declares a queue
    Declare(50, 10) {
        reserved_1: u16,
        queue: ShortString,
        passive: bool,
        durable: bool,
        exclusive: bool,
        auto_delete: bool,
        no_wait: bool,
        arguments: FieldTable,
    }
}

method! {
    /// Confirms a queue declaration
    DeclareOk(50, 11) {
        queue: ShortString,
        message_count: u32,
        consumer_count: u32,
    }
}

method! {
    /// Binds a queue to an exchange
    Bind(50, 20) {
        reserved_1: u16,
        queue: ShortString,
        exchange: ShortString,
        routing_key: ShortString,
        no_wait: bool,
        arguments: FieldTable,
    }
}

method! {
    /// Confirms a queue binding
    BindOk(50, 21) {}
}

method! {
    /// Purges a queue
    Purge(50, 30) {
        reserved_1: u16,
        queue: ShortString,
        no_wait: bool,
    }
}

method! {
    /// Confirms a queue purge
    PurgeOk(50, 31) {
        message_count: u32,
    }
}

method! {
    /// Deletes a queue
    Delete(50, 40) {
        reserved_1: u16,
        queue: ShortString,
        if_unused: bool,
        if_empty: bool,
        no_wait: bool,
    }
}

method! {
    /// Confirms a queue deletion
    DeleteOk(50, 41) {
        message_count: u32,
    }
}

method! {
    /// Unbinds a queue from an exchange
    Unbind(50, 50) {
        reserved_1: u16,
        queue: ShortString,
        exchange: ShortString,
        routing_key: ShortString,
        arguments: FieldTable,
    }
}

method! {
    /// Confirms a queue unbinding
    UnbindOk(50, 51) {}
}
