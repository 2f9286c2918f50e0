//! Methods of the exchange class (class id 40)

use crate::{FieldTable, ShortString};

method! {
    /// Declares an exchange
    Declare(40, 10) {
        reserved_1: u16,
        exchange: ShortString,
        /// Exchange type, eg. `direct` or `topic`
        kind: ShortString,
        passive: bool,
        durable: bool,
        auto_delete: bool,
        internal: bool,
        no_wait: bool,
        arguments: FieldTable,
    }
}

method! {
    /// Confirms an exchange declaration
    DeclareOk(40, 11) {}
}

method! {
    /// Deletes an exchange
    Delete(40, 20) {
        reserved_1: u16,
        exchange: ShortString,
        if_unused: bool,
        no_wait: bool,
    }
}

method! {
    /// Confirms an exchange deletion
    DeleteOk(40, 21) {}
}

method! {
    /// Binds an exchange to another exchange
    Bind(40, 30) {
        reserved_1: u16,
        destination: ShortString,
        source: ShortString,
        routing_key: ShortString,
        no_wait: bool,
        arguments: FieldTable,
    }
}

method! {
    /// Confirms an exchange binding
    BindOk(40, 31) {}
}

method! {
    /// Removes an exchange to exchange binding
    Unbind(40, 40) {
        reserved_1: u16,
        destination: ShortString,
        source: ShortString,
        routing_key: ShortString,
        no_wait: bool,
        arguments: FieldTable,
    }
}

method! {
    /// Confirms an exchange unbinding
    UnbindOk(40, 51) {}
}
