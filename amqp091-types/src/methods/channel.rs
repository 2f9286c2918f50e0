//! Methods of the channel class (class id 20)

use crate::{LongString, ShortString};

method! {
    /// Opens a channel
    Open(20, 10) {
        /// Deprecated out-of-band setting
        reserved_1: ShortString,
    }
}

method! {
    /// Signals that the channel is ready
    OpenOk(20, 11) {
        /// Deprecated channel id
        reserved_1: LongString,
    }
}

method! {
    /// Enables or disables the flow of content
    Flow(20, 20) {
        active: bool,
    }
}

method! {
    /// Confirms a flow change
    FlowOk(20, 21) {
        active: bool,
    }
}

method! {
    /// Requests a channel close
    Close(20, 40) {
        reply_code: u16,
        reply_text: ShortString,
        class_id: u16,
        method_id: u16,
    }
}

method! {
    /// Confirms a channel close
    CloseOk(20, 41) {}
}
