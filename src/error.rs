/// The `Blame` enum collects the ways a deferred dispatch can go wrong.
///
/// Most of the time nothing goes wrong, because the primitive does very little.  It waits, then it
/// hands a message to a channel.  The channel can be gone by the time we get there, a predicate
/// can refuse to answer, and the configuration file can be malformed.  That is about the extent of
/// it.
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum Blame {
    /// The receiving half of the dispatch channel has been dropped.
    #[display("Dispatch channel closed.")]
    Closed,
    /// Settings could not be read or deserialized.
    #[display("Configuration error: {_0}")]
    #[from]
    Config(config::ConfigError),
    /// A spawned dispatch task panicked or was aborted.
    #[display("Task failed: {_0}")]
    #[from]
    Join(tokio::task::JoinError),
    /// A continuation predicate failed to produce an answer.
    #[display("Predicate failed: {_0}")]
    Predicate(#[error(not(source))] String),
}

/// Alias for results that can [`Blame`] someone.
pub type Arrive<T> = Result<T, Blame>;
