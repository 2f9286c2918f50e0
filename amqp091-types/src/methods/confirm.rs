//! Methods of the confirm class (class id 85)

method! {
    /// Puts the channel into publisher confirm mode
    Select(85, 10) {
        no_wait: bool,
    }
}

method! {
    /// Confirms confirm mode
    SelectOk(85, 11) {}
}
