//! Methods of the connection class (class id 10)

use crate::{FieldTable, LongString, ShortString};

method! {
    /// Starts connection negotiation, sent by the server
    Start(10, 10) {
        version_major: u8,
        version_minor: u8,
        server_properties: FieldTable,
        /// Space separated list of SASL mechanisms
        mechanisms: LongString,
        /// Space separated list of message locales
        locales: LongString,
    }
}

method! {
    /// Selects a SASL mechanism and locale
    StartOk(10, 11) {
        client_properties: FieldTable,
        mechanism: ShortString,
        response: LongString,
        locale: ShortString,
    }
}

method! {
    /// SASL challenge
    Secure(10, 20) {
        challenge: LongString,
    }
}

method! {
    /// SASL challenge response
    SecureOk(10, 21) {
        response: LongString,
    }
}

method! {
    /// Proposes connection tuning parameters
    Tune(10, 30) {
        channel_max: u16,
        frame_max: u32,
        /// Heartbeat interval in seconds
        heartbeat: u16,
    }
}

method! {
    /// Negotiated connection tuning parameters
    TuneOk(10, 31) {
        channel_max: u16,
        frame_max: u32,
        heartbeat: u16,
    }
}

method! {
    /// Opens a connection to a virtual host
    Open(10, 40) {
        virtual_host: ShortString,
        /// Deprecated capabilities, must be empty
        reserved_1: ShortString,
        /// Deprecated insist flag
        reserved_2: bool,
    }
}

method! {
    /// Signals that the connection is ready
    OpenOk(10, 41) {
        /// Deprecated known hosts
        reserved_1: ShortString,
    }
}

method! {
    /// Requests a connection close
    Close(10, 50) {
        reply_code: u16,
        reply_text: ShortString,
        /// Class of the method that caused the close, if any
        class_id: u16,
        /// Method that caused the close, if any
        method_id: u16,
    }
}

method! {
    /// Confirms a connection close
    CloseOk(10, 51) {}
}

method! {
    /// The broker stopped accepting publishes on this connection
    Blocked(10, 60) {
        reason: ShortString,
    }
}

method! {
    /// The broker accepts publishes again
    Unblocked(10, 61) {}
}

method! {
    /// Replaces the secret of the authenticated user
    UpdateSecret(10, 70) {
        new_secret: LongString,
        reason: ShortString,
    }
}

method! {
    /// Confirms a secret update
    UpdateSecretOk(10, 71) {}
}
