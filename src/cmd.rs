use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// A boxed message producer, as carried by [`Cmd::Perform`].
pub type Task<M> = Pin<Box<dyn Future<Output = M> + Send + 'static>>;

/// A boxed continuation predicate, as carried by [`Sub`].
pub type Predicate = Box<dyn FnMut() -> bool + Send + 'static>;

/// The `Cmd` enum describes side effects the update function would like performed.
///
/// # Asking for things later
///
/// The update function is supposed to be a plain function: take a message and the current model,
/// change the model, and return.  It does not get to sleep, and it does not get to call itself.
/// What it can do is hand back a `Cmd`, and let the [`crate::Runtime`] carry it out after the
/// update has returned.
///
/// The recursive way to build a timer is to answer every `Tick` with [`Cmd::delay`] for another
/// `Tick`.  It works, but the base condition ends up in the update function, next to everything
/// else the update function does.  The loop way is [`Cmd::indefinite`] or
/// [`Cmd::indefinite_until`], issued once, which keeps the timer in one place.  Both are here
/// because both get used.
///
/// Variants that produce messages never apply them directly.  Even [`Cmd::Msg`] goes through the
/// dispatch channel, so it lands after whatever is already queued.
pub enum Cmd<M> {
    /// Do nothing.
    None,
    /// Dispatch a message right away.
    Msg(M),
    /// Carry out several commands, in order.
    Batch(Vec<Cmd<M>>),
    /// Dispatch `msg` once after `delay`.
    Delay { delay: Duration, msg: M },
    /// Wait `delay`, run `task`, dispatch what it yields.
    Perform { delay: Duration, task: Task<M> },
    /// Start a repeating loop.
    Sub(Sub<M>),
    /// Cancel the keyed loop started earlier under this name.
    Cancel(String),
}

impl<M> Cmd<M> {
    pub fn none() -> Self {
        Self::None
    }

    pub fn msg(msg: M) -> Self {
        Self::Msg(msg)
    }

    pub fn batch(cmds: impl IntoIterator<Item = Cmd<M>>) -> Self {
        Self::Batch(cmds.into_iter().collect())
    }

    pub fn delay(delay: Duration, msg: M) -> Self {
        Self::Delay { delay, msg }
    }

    pub fn perform<F>(delay: Duration, task: F) -> Self
    where
        F: Future<Output = M> + Send + 'static,
    {
        Self::Perform {
            delay,
            task: Box::pin(task),
        }
    }

    /// Like [`Cmd::perform`] for a task that can fail.  Errors become messages through
    /// `on_error`.
    pub fn attempt<F, E, G>(delay: Duration, task: F, on_error: G) -> Self
    where
        F: Future<Output = Result<M, E>> + Send + 'static,
        G: FnOnce(E) -> M + Send + 'static,
        E: fmt::Display + Send + 'static,
        M: 'static,
    {
        Self::perform(delay, async move {
            match task.await {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("Task failed: {e}");
                    on_error(e)
                }
            }
        })
    }

    /// Dispatch `msg` every `delay`, forever or until cancelled.
    pub fn indefinite(delay: Duration, msg: M) -> Self {
        Self::Sub(Sub::new(None, delay, msg, None))
    }

    /// Dispatch `msg` every `delay` for as long as `predicate` holds.
    pub fn indefinite_until<P>(delay: Duration, msg: M, predicate: P) -> Self
    where
        P: FnMut() -> bool + Send + 'static,
    {
        Self::Sub(Sub::new(None, delay, msg, Some(Box::new(predicate))))
    }

    pub fn cancel(key: impl Into<String>) -> Self {
        Self::Cancel(key.into())
    }

    /// Attaches a subscription key to a loop.  The runtime keeps at most one loop per key, so
    /// issuing the same keyed loop twice replaces the first rather than doubling up.  Has no
    /// effect on commands that are not loops.
    pub fn keyed(self, key: impl Into<String>) -> Self {
        match self {
            Self::Sub(sub) => Self::Sub(sub.with_key(Some(key.into()))),
            other => {
                tracing::warn!("Only loops take a key.");
                other
            }
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Converts the message type, for embedding a child program's commands in a parent.
    pub fn map<N, F>(self, f: F) -> Cmd<N>
    where
        F: Fn(M) -> N + Clone + Send + Sync + 'static,
        M: 'static,
        N: 'static,
    {
        match self {
            Self::None => Cmd::None,
            Self::Msg(msg) => Cmd::Msg(f(msg)),
            Self::Batch(cmds) => Cmd::Batch(cmds.into_iter().map(|c| c.map(f.clone())).collect()),
            Self::Delay { delay, msg } => Cmd::Delay { delay, msg: f(msg) },
            Self::Perform { delay, task } => Cmd::Perform {
                delay,
                task: Box::pin(async move { f(task.await) }),
            },
            Self::Sub(sub) => Cmd::Sub(sub.map(f)),
            Self::Cancel(key) => Cmd::Cancel(key),
        }
    }
}

impl<M> Default for Cmd<M> {
    fn default() -> Self {
        Self::None
    }
}

impl<M: fmt::Debug> fmt::Debug for Cmd<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Msg(msg) => f.debug_tuple("Msg").field(msg).finish(),
            Self::Batch(cmds) => f.debug_tuple("Batch").field(cmds).finish(),
            Self::Delay { delay, msg } => f
                .debug_struct("Delay")
                .field("delay", delay)
                .field("msg", msg)
                .finish(),
            Self::Perform { delay, .. } => f
                .debug_struct("Perform")
                .field("delay", delay)
                .finish_non_exhaustive(),
            Self::Sub(sub) => f.debug_tuple("Sub").field(sub).finish(),
            Self::Cancel(key) => f.debug_tuple("Cancel").field(key).finish(),
        }
    }
}

/// The `Sub` struct holds the makings of a repeating loop until the runtime starts it.
///
/// * key - Subscription key, if the loop should be tracked by name.
/// * delay - Time between dispatches.
/// * msg - Message to dispatch, cloned for each cycle.
/// * predicate - Base condition.  `None` repeats until cancelled.
#[derive(
    derive_new::new, derive_getters::Getters, derive_getters::Dissolve, derive_setters::Setters,
)]
#[setters(prefix = "with_")]
pub struct Sub<M> {
    key: Option<String>,
    delay: Duration,
    msg: M,
    #[getter(skip)]
    #[setters(skip)]
    predicate: Option<Predicate>,
}

impl<M> Sub<M> {
    pub fn has_predicate(&self) -> bool {
        self.predicate.is_some()
    }

    fn map<N, F>(self, f: F) -> Sub<N>
    where
        F: Fn(M) -> N,
    {
        let (key, delay, msg, predicate) = self.dissolve();
        Sub::new(key, delay, f(msg), predicate)
    }
}

impl<M: fmt::Debug> fmt::Debug for Sub<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sub")
            .field("key", &self.key)
            .field("delay", &self.delay)
            .field("msg", &self.msg)
            .field("predicate", &self.has_predicate())
            .finish()
    }
}
