use std::sync::Arc;
use tokio::sync::watch;
use tokio::time;

/// The `Phase` enum tracks where a scheduled loop is in its life.
///
/// A loop starts `Idle`, spends nearly all of its time `Waiting`, and passes briefly through
/// `Submitting` each time the delay runs out.  It ends in exactly one terminal phase and never
/// comes back.
///
/// * `Cancelled` - Someone called [`Handle::cancel`].
/// * `Halted` - The continuation predicate returned `false`.
/// * `Failed` - The continuation predicate returned an error.
/// * `Closed` - The dispatch channel was gone when the loop tried to submit.
#[derive(
    Debug,
    Default,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::AsRefStr,
    strum_macros::EnumIs,
)]
pub enum Phase {
    #[default]
    Idle,
    Waiting,
    Submitting,
    Cancelled,
    Halted,
    Failed,
    Closed,
}

impl Phase {
    /// True for the phases a loop never leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Halted | Self::Failed | Self::Closed
        )
    }
}

/// The `Handle` is what the caller keeps after scheduling a loop.
///
/// Cloning a handle is cheap and every clone controls the same loop.  Dropping every handle does
/// *not* stop the loop: a timer started once at startup and never cancelled is a perfectly
/// reasonable thing to want, and forcing the caller to hold onto a handle they will never use
/// would be a nuisance.
#[derive(Debug, Clone, derive_getters::Getters)]
pub struct Handle {
    /// Name of the loop, used in logs.
    name: String,
    #[getter(skip)]
    cancel: Arc<watch::Sender<bool>>,
    #[getter(skip)]
    phase: watch::Receiver<Phase>,
}

impl Handle {
    /// Creates a handle together with the [`Ticket`] the loop task keeps.
    pub(crate) fn pair(name: &str) -> (Self, Ticket) {
        let (cancel, cancelled) = watch::channel(false);
        let cancel = Arc::new(cancel);
        let (phase_tx, phase) = watch::channel(Phase::Idle);
        let handle = Self {
            name: name.to_owned(),
            cancel: Arc::clone(&cancel),
            phase,
        };
        let ticket = Ticket {
            name: name.to_owned(),
            _cancel: cancel,
            cancelled,
            phase: phase_tx,
        };
        (handle, ticket)
    }

    /// Asks the loop to stop.  A loop waiting on its delay wakes up and quits without submitting.
    /// A loop that has already handed its message to the channel cannot take it back.
    #[tracing::instrument(skip(self), fields(name = %self.name))]
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
        tracing::trace!("Cancellation requested.");
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// The current [`Phase`] of the loop.
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.phase().is_terminal()
    }

    /// Waits for the loop to reach a terminal [`Phase`] and returns it.
    ///
    /// A loop task that dies without reporting (its predicate panicked, or the runtime shut down
    /// under it) ends in [`Phase::Failed`].
    pub async fn finished(&self) -> Phase {
        let mut phase = self.phase.clone();
        let terminal = phase.wait_for(Phase::is_terminal).await.map(|p| *p);
        match terminal {
            Ok(value) => value,
            Err(_) => *phase.borrow(),
        }
    }
}

/// The loop task's half of a [`Handle`].
///
/// The ticket holds a reference to the cancellation sender so that the cancellation channel stays
/// open for as long as the loop runs, whether or not any handles are still around.  Dropping a
/// ticket that never reported a terminal phase reports [`Phase::Failed`], so a loop that unwinds
/// still looks finished from the outside.
#[derive(Debug)]
pub(crate) struct Ticket {
    name: String,
    _cancel: Arc<watch::Sender<bool>>,
    cancelled: watch::Receiver<bool>,
    phase: watch::Sender<Phase>,
}

impl Ticket {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    pub(crate) fn set(&self, phase: Phase) {
        self.phase.send_replace(phase);
        tracing::trace!("{} is {phase}.", self.name);
    }

    /// Sleeps until `deadline`.  Returns `false` if cancellation arrived first, or arrived while
    /// we slept, in which case the caller must not submit.
    pub(crate) async fn wait(&mut self, deadline: time::Instant) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let cancelled = &mut self.cancelled;
        let slept = tokio::select! {
            _ = cancelled.wait_for(|flag| *flag) => false,
            _ = time::sleep_until(deadline) => true,
        };
        slept && !self.is_cancelled()
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        let failed = self.phase.send_if_modified(|phase| {
            if phase.is_terminal() {
                false
            } else {
                *phase = Phase::Failed;
                true
            }
        });
        if failed {
            tracing::warn!("{} ended without reporting.", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn terminal_phases() {
        let terminal = [Phase::Cancelled, Phase::Halted, Phase::Failed, Phase::Closed];
        for phase in terminal {
            assert!(phase.is_terminal(), "{phase} should be terminal");
        }
        for phase in [Phase::Idle, Phase::Waiting, Phase::Submitting] {
            assert!(!phase.is_terminal(), "{phase} should not be terminal");
        }
        assert_eq!(Phase::default(), Phase::Idle);
        assert_eq!(Phase::Halted.as_ref(), "Halted");
    }

    #[test]
    fn handle_reports_ticket_phase() {
        let (handle, ticket) = Handle::pair("Test Loop");
        assert_eq!(handle.name(), "Test Loop");
        assert!(handle.phase().is_idle());
        ticket.set(Phase::Waiting);
        assert!(handle.phase().is_waiting());
        assert!(!handle.is_finished());
        ticket.set(Phase::Halted);
        assert!(handle.is_finished());
    }

    #[test]
    fn cancel_is_shared_across_clones() {
        let (handle, ticket) = Handle::pair("Shared");
        let other = handle.clone();
        other.cancel();
        assert!(handle.is_cancelled());
        assert!(ticket.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_interrupts_wait() {
        let (handle, mut ticket) = Handle::pair("Sleepy");
        let start = time::Instant::now();
        let waiter = tokio::spawn(async move {
            let slept = ticket.wait(start + Duration::from_secs(60)).await;
            (slept, ticket)
        });
        time::sleep(Duration::from_secs(1)).await;
        handle.cancel();
        let (slept, _ticket) = waiter.await.unwrap();
        assert!(!slept);
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_sleeps_until_deadline() {
        let (_handle, mut ticket) = Handle::pair("Patient");
        let start = time::Instant::now();
        assert!(ticket.wait(start + Duration::from_millis(250)).await);
        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn vanished_loop_counts_as_failed() {
        let (handle, ticket) = Handle::pair("Ghost");
        ticket.set(Phase::Waiting);
        drop(ticket);
        assert!(handle.is_finished());
        assert_eq!(handle.finished().await, Phase::Failed);
    }

    #[test]
    fn dropping_a_finished_ticket_keeps_its_phase() {
        let (handle, ticket) = Handle::pair("Tidy");
        ticket.set(Phase::Cancelled);
        drop(ticket);
        assert_eq!(handle.phase(), Phase::Cancelled);
    }
}
