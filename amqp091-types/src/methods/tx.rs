//! Methods of the tx class (class id 90)

method! {
    /// Puts the channel into transaction mode
    Select(90, 10) {}
}

method! {
    /// Confirms transaction mode
    SelectOk(90, 11) {}
}

method! {
    /// Commits the current transaction
    Commit(90, 20) {}
}

method! {
    /// Confirms a commit
    CommitOk(90, 21) {}
}

method! {
    /// Abandons the current transaction
    Rollback(90, 30) {}
}

method! {
    /// Confirms a rollback
    RollbackOk(90, 31) {}
}
