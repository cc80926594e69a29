use crate::{Arrive, Blame, Dispatch, Handle, Phase, Ticket};
use convert_case::Casing;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::Instrument;

/// The `Schedule` struct names a deferred dispatch before it starts.
///
/// The only thing a schedule carries is a name, which ends up in the tracing span of the spawned
/// task.  When you have more than one timer going it helps a great deal to know which one is
/// talking.  If you do not care to name it, [`Schedule::default`] borrows a random name from the
/// [`names`] crate, title cased.
///
/// Every method spawns onto the current [`tokio`] runtime and returns immediately.  None of them
/// touch the update function.  The message goes through the [`Dispatch`] channel and nowhere
/// else.
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new, derive_getters::Getters)]
pub struct Schedule {
    name: String,
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new(Self::moniker())
    }
}

impl Schedule {
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name.into())
    }

    fn moniker() -> String {
        names::Generator::default()
            .next()
            .map(|name| name.to_case(convert_case::Case::Title))
            .unwrap_or_else(|| "Nameless".to_string())
    }

    /// The `once` method submits `msg` to `channel` after `delay` elapses, exactly once.
    ///
    /// There is no cancellation for a single shot.  The returned [`JoinHandle`] resolves to
    /// [`Blame::Closed`] if nobody was listening by the time the delay ran out.  Dropping the join
    /// handle is fine, the task runs to completion regardless and holds nothing afterwards.
    #[tracing::instrument(skip_all, fields(name = %self.name))]
    pub fn once<D, M>(&self, channel: D, delay: Duration, msg: M) -> JoinHandle<Arrive<()>>
    where
        D: Dispatch<M>,
        M: Send + 'static,
    {
        self.once_with(channel, delay, async move { msg })
    }

    /// The `once_with` method waits `delay`, then runs `producer` to completion and submits the
    /// message it yields.
    ///
    /// If the producer panics, the panic is not caught here.  It surfaces as a
    /// [`tokio::task::JoinError`] on the returned handle, where the enclosing runtime can decide
    /// what to make of it.
    #[tracing::instrument(skip_all, fields(name = %self.name))]
    pub fn once_with<D, M, F>(
        &self,
        channel: D,
        delay: Duration,
        producer: F,
    ) -> JoinHandle<Arrive<()>>
    where
        D: Dispatch<M>,
        M: Send + 'static,
        F: Future<Output = M> + Send + 'static,
    {
        let span = tracing::info_span!("once", name = %self.name);
        let deadline = time::Instant::now() + delay;
        tracing::trace!("Single dispatch in {delay:?}.");
        tokio::spawn(
            async move {
                time::sleep_until(deadline).await;
                let msg = producer.await;
                channel.submit(msg)?;
                tracing::trace!("Message dispatched.");
                Ok(())
            }
            .instrument(span),
        )
    }

    /// The `once_either` method is [`Schedule::once_with`] for producers that can fail.  An `Err`
    /// is turned into a message by `on_error` and submitted in place of the success message, so
    /// the failure reaches the update function like everything else does.
    #[tracing::instrument(skip_all, fields(name = %self.name))]
    pub fn once_either<D, M, E, F, G>(
        &self,
        channel: D,
        delay: Duration,
        producer: F,
        on_error: G,
    ) -> JoinHandle<Arrive<()>>
    where
        D: Dispatch<M>,
        M: Send + 'static,
        F: Future<Output = Result<M, E>> + Send + 'static,
        G: FnOnce(E) -> M + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let producer = async move {
            match producer.await {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("Producer failed: {e}");
                    on_error(e)
                }
            }
        };
        self.once_with(channel, delay, producer)
    }

    /// The `repeating` method submits a copy of `msg` every `delay`, starting one `delay` from
    /// now, until cancelled through the returned [`Handle`].
    ///
    /// Deadlines are computed from the start instant, not from when the previous submission
    /// finished, so a slow wake-up does not push every later tick back.
    #[tracing::instrument(skip_all, fields(name = %self.name))]
    pub fn repeating<D, M>(&self, channel: D, delay: Duration, msg: M) -> Handle
    where
        D: Dispatch<M>,
        M: Clone + Send + 'static,
    {
        self.spawn_loop(channel, delay, msg, || Ok(true))
    }

    /// The `until` method is [`Schedule::repeating`] with a base condition.
    ///
    /// Each cycle waits `delay`, asks `predicate` whether to continue, and submits only on `true`.
    /// The first `false` ends the loop on the spot.  Asking after the wait rather than before means
    /// the predicate sees state that has had a full delay to absorb the previous message.  The
    /// price is that the predicate is never asked before the first wait: a predicate that is
    /// `false` from the start still holds the loop in [`Phase::Waiting`] for one `delay`, then
    /// ends it in [`Phase::Halted`] without submitting.
    ///
    /// A predicate that panics ends the loop in [`Phase::Failed`].
    ///
    /// Call this once per timer.  A predicate that reads live state, scheduled again from every
    /// update, gives you one more loop per update, all of them ticking.  Cancel the old handle
    /// before starting a new one.
    #[tracing::instrument(skip_all, fields(name = %self.name))]
    pub fn until<D, M, P>(&self, channel: D, delay: Duration, msg: M, mut predicate: P) -> Handle
    where
        D: Dispatch<M>,
        M: Clone + Send + 'static,
        P: FnMut() -> bool + Send + 'static,
    {
        self.spawn_loop(channel, delay, msg, move || Ok(predicate()))
    }

    /// The `try_until` method accepts a predicate that can fail.  A failure ends this loop with
    /// [`Phase::Failed`] and is logged.  Nothing else is affected.
    #[tracing::instrument(skip_all, fields(name = %self.name))]
    pub fn try_until<D, M, P, E>(
        &self,
        channel: D,
        delay: Duration,
        msg: M,
        mut predicate: P,
    ) -> Handle
    where
        D: Dispatch<M>,
        M: Clone + Send + 'static,
        P: FnMut() -> Result<bool, E> + Send + 'static,
        E: fmt::Display + 'static,
    {
        self.spawn_loop(channel, delay, msg, move || {
            predicate().map_err(|e| Blame::Predicate(e.to_string()))
        })
    }

    fn spawn_loop<D, M, P>(&self, channel: D, delay: Duration, msg: M, proceed: P) -> Handle
    where
        D: Dispatch<M>,
        M: Clone + Send + 'static,
        P: FnMut() -> Arrive<bool> + Send + 'static,
    {
        let (handle, ticket) = Handle::pair(&self.name);
        let span = tracing::info_span!("loop", name = %self.name);
        tracing::trace!("Loop starting with delay {delay:?}.");
        tokio::spawn(cycle(channel, delay, msg, proceed, ticket).instrument(span));
        handle
    }
}

/// Runs one scheduled loop to its terminal [`Phase`].
async fn cycle<D, M, P>(channel: D, delay: Duration, msg: M, mut proceed: P, mut ticket: Ticket)
where
    D: Dispatch<M>,
    M: Clone + Send + 'static,
    P: FnMut() -> Arrive<bool> + Send + 'static,
{
    let mut deadline = time::Instant::now();
    let phase = loop {
        deadline += delay;
        ticket.set(Phase::Waiting);
        if !ticket.wait(deadline).await {
            break Phase::Cancelled;
        }
        match proceed() {
            Ok(true) => {}
            Ok(false) => break Phase::Halted,
            Err(e) => {
                tracing::warn!("{} stopped: {e}", ticket.name());
                break Phase::Failed;
            }
        }
        ticket.set(Phase::Submitting);
        if channel.submit(msg.clone()).is_err() {
            tracing::warn!("{} has nobody to talk to.", ticket.name());
            break Phase::Closed;
        }
        if delay.is_zero() {
            // Deadlines never move, give the receiver a turn.
            tokio::task::yield_now().await;
        }
    };
    ticket.set(phase);
}

/// Submits `msg` once after `delay`, under a generated name.  See [`Schedule::once`].
pub fn schedule_once<D, M>(channel: D, delay: Duration, msg: M) -> JoinHandle<Arrive<()>>
where
    D: Dispatch<M>,
    M: Send + 'static,
{
    Schedule::default().once(channel, delay, msg)
}

/// See [`Schedule::once_with`].
pub fn schedule_once_with<D, M, F>(
    channel: D,
    delay: Duration,
    producer: F,
) -> JoinHandle<Arrive<()>>
where
    D: Dispatch<M>,
    M: Send + 'static,
    F: Future<Output = M> + Send + 'static,
{
    Schedule::default().once_with(channel, delay, producer)
}

/// See [`Schedule::once_either`].
pub fn schedule_once_either<D, M, E, F, G>(
    channel: D,
    delay: Duration,
    producer: F,
    on_error: G,
) -> JoinHandle<Arrive<()>>
where
    D: Dispatch<M>,
    M: Send + 'static,
    F: Future<Output = Result<M, E>> + Send + 'static,
    G: FnOnce(E) -> M + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    Schedule::default().once_either(channel, delay, producer, on_error)
}

/// See [`Schedule::repeating`].
pub fn schedule_repeating<D, M>(channel: D, delay: Duration, msg: M) -> Handle
where
    D: Dispatch<M>,
    M: Clone + Send + 'static,
{
    Schedule::default().repeating(channel, delay, msg)
}

/// See [`Schedule::until`].
pub fn schedule_until<D, M, P>(channel: D, delay: Duration, msg: M, predicate: P) -> Handle
where
    D: Dispatch<M>,
    M: Clone + Send + 'static,
    P: FnMut() -> bool + Send + 'static,
{
    Schedule::default().until(channel, delay, msg, predicate)
}

/// See [`Schedule::try_until`].
pub fn try_schedule_until<D, M, P, E>(channel: D, delay: Duration, msg: M, predicate: P) -> Handle
where
    D: Dispatch<M>,
    M: Clone + Send + 'static,
    P: FnMut() -> Result<bool, E> + Send + 'static,
    E: fmt::Display + 'static,
{
    Schedule::default().try_until(channel, delay, msg, predicate)
}
