//! Methods of the basic class (class id 60)

use crate::{FieldTable, ShortString};

method! {
    /// Specifies quality of service
    Qos(60, 10) {
        prefetch_size: u32,
        prefetch_count: u16,
        global: bool,
    }
}

method! {
    /// Confirms the requested quality of service
    QosOk(60, 11) {}
}

method! {
    /// Starts a queue consumer
    Consume(60, 20) {
        reserved_1: u16,
        queue: ShortString,
        consumer_tag: ShortString,
        no_local: bool,
        no_ack: bool,
        exclusive: bool,
        no_wait: bool,
        arguments: FieldTable,
    }
}

method! {
    /// Confirms a new consumer
    ConsumeOk(60, 21) {
        consumer_tag: ShortString,
    }
}

method! {
    /// Ends a queue consumer. Also sent by the broker when a queue is deleted
    Cancel(60, 30) {
        consumer_tag: ShortString,
        no_wait: bool,
    }
}

method! {
    /// Confirms a cancelled consumer
    CancelOk(60, 31) {
        consumer_tag: ShortString,
    }
}

method! {
    /// Publishes a message, followed by content
    Publish(60, 40) {
        reserved_1: u16,
        exchange: ShortString,
        routing_key: ShortString,
        mandatory: bool,
        immediate: bool,
    }
}

method! {
    /// Returns an unroutable message, followed by content
    Return(60, 50) {
        reply_code: u16,
        reply_text: ShortString,
        exchange: ShortString,
        routing_key: ShortString,
    }
}

method! {
    /// Delivers a message to a consumer, followed by content
    Deliver(60, 60) {
        consumer_tag: ShortString,
        delivery_tag: u64,
        redelivered: bool,
        exchange: ShortString,
        routing_key: ShortString,
    }
}

method! {
    /// Directly fetches a message from a queue
    Get(60, 70) {
        reserved_1: u16,
        queue: ShortString,
        no_ack: bool,
    }
}

method! {
    /// Provides a fetched message, followed by content
    GetOk(60, 71) {
        delivery_tag: u64,
        redelivered: bool,
        exchange: ShortString,
        routing_key: ShortString,
        message_count: u32,
    }
}

method! {
    /// The queue had no message to fetch
    GetEmpty(60, 72) {
        /// Deprecated cluster id
        reserved_1: ShortString,
    }
}

method! {
    /// Acknowledges one or more messages
    Ack(60, 80) {
        delivery_tag: u64,
        multiple: bool,
    }
}

method! {
    /// Rejects a message
    Reject(60, 90) {
        delivery_tag: u64,
        requeue: bool,
    }
}

method! {
    /// Redelivers unacknowledged messages without a reply
    RecoverAsync(60, 100) {
        requeue: bool,
    }
}

method! {
    /// Redelivers unacknowledged messages
    Recover(60, 110) {
        requeue: bool,
    }
}

method! {
    /// Confirms a recover
    RecoverOk(60, 111) {}
}

method! {
    /// Negatively acknowledges one or more messages
    Nack(60, 120) {
        delivery_tag: u64,
        multiple: bool,
        requeue: bool,
    }
}
