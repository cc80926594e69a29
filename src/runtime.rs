use crate::{channel, Arrive, Cmd, Dispatch, Dispatcher, Handle, Inbox, Schedule};
use std::collections::HashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The `Program` trait is the Model-Update-View triangle with the view left off.
///
/// * [`Program::init`] builds the first model and any commands to run at startup.
/// * [`Program::update`] takes one message at a time and may ask for more work through a [`Cmd`].
/// * [`Program::subscribe`] runs once, right after `init`, and is the place to start timers.  It
///   receives a [`Snapshot`] of the model so that base conditions can look at state without
///   holding onto it.
/// * [`Program::quit`] tells the [`Runtime`] when to stop.
///
/// The runtime never calls `update` from two places at once, so neither does anything that only
/// reaches the model through `update`.
pub trait Program {
    type Model: Clone + Send + Sync + 'static;
    /// Loops hand out a copy of their message every cycle, hence `Clone`.
    type Msg: Clone + Send + 'static;

    fn init(&self) -> (Self::Model, Cmd<Self::Msg>);

    fn update(&self, model: &mut Self::Model, msg: Self::Msg) -> Cmd<Self::Msg>;

    fn subscribe(&self, _snapshot: Snapshot<Self::Model>) -> Cmd<Self::Msg> {
        Cmd::none()
    }

    fn quit(&self, _model: &Self::Model) -> bool {
        false
    }
}

/// The `Snapshot` struct gives read-only access to the latest model.
///
/// The runtime publishes a copy of the model after every update.  A snapshot reads the most
/// recent copy.  It cannot see a model halfway through an update, and it cannot change one.
#[derive(Debug, Clone, derive_new::new)]
pub struct Snapshot<T> {
    rx: watch::Receiver<T>,
}

impl<T> Snapshot<T> {
    /// Calls `f` with the latest published model.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.rx.borrow())
    }
}

impl<T: Clone> Snapshot<T> {
    pub fn get(&self) -> T {
        self.rx.borrow().clone()
    }
}

/// The `Runtime` struct drives a [`Program`].
///
/// Messages arrive through the [`Inbox`] and are handed to [`Program::update`] one at a time on
/// the task that called [`Runtime::run`].  Commands returned by the update are carried out with
/// [`Schedule`], which only ever talks back through the [`Dispatcher`].
///
/// The runtime keeps track of the loops it starts:
///
/// * keyed loops live in `subs`, one per key.  Starting a loop under a key that is already in use
///   cancels the old loop first.
/// * unkeyed loops live in `loose` and are cancelled when the runtime stops.
/// * single dispatches live in `jobs` until they finish, at which point their results are logged.
#[derive(derive_getters::Getters)]
pub struct Runtime<P: Program> {
    program: P,
    dispatcher: Dispatcher<P::Msg>,
    #[getter(skip)]
    inbox: Inbox<P::Msg>,
    #[getter(skip)]
    subs: HashMap<String, Handle>,
    #[getter(skip)]
    loose: Vec<Handle>,
    #[getter(skip)]
    jobs: Vec<JoinHandle<Arrive<()>>>,
}

impl<P: Program> Runtime<P> {
    pub fn new(program: P) -> Self {
        let (dispatcher, inbox) = channel();
        Self {
            program,
            dispatcher,
            inbox,
            subs: HashMap::new(),
            loose: Vec::new(),
            jobs: Vec::new(),
        }
    }

    /// Runs the program until [`Program::quit`] says to stop, then cancels every loop and returns
    /// the final model.
    ///
    /// The runtime holds a [`Dispatcher`] of its own, so the inbox stays open for as long as this
    /// runs.  A program whose loops have all ended keeps waiting for messages from outside (see
    /// [`Runtime::dispatcher`]) until `quit` holds.
    ///
    /// Will [`crate::Blame::Closed`] if a command cannot be dispatched, which cannot happen while
    /// the runtime holds its own [`Dispatcher`] but is propagated anyway.
    #[tracing::instrument(skip_all)]
    pub async fn run(mut self) -> Arrive<P::Model> {
        let (mut model, cmd) = self.program.init();
        let (snapshot, rx) = watch::channel(model.clone());
        self.execute(cmd)?;
        let cmd = self.program.subscribe(Snapshot::new(rx));
        self.execute(cmd)?;
        tracing::trace!("Program started.");
        while !self.program.quit(&model) {
            if self.active() == 0 && self.jobs.is_empty() && self.inbox.is_empty() {
                tracing::debug!("Nothing scheduled, waiting on outside messages.");
            }
            // Never `None`, the runtime keeps a sender.
            let Some(msg) = self.inbox.recv().await else {
                break;
            };
            let cmd = self.program.update(&mut model, msg);
            snapshot.send_replace(model.clone());
            self.execute(cmd)?;
            self.reap().await;
        }
        self.halt();
        tracing::trace!("Program finished.");
        Ok(model)
    }

    /// Carries out a single [`Cmd`].
    #[tracing::instrument(skip_all)]
    pub fn execute(&mut self, cmd: Cmd<P::Msg>) -> Arrive<()> {
        match cmd {
            Cmd::None => {}
            Cmd::Msg(msg) => self.dispatcher.submit(msg)?,
            Cmd::Batch(cmds) => {
                for cmd in cmds {
                    self.execute(cmd)?;
                }
            }
            Cmd::Delay { delay, msg } => {
                let job = Schedule::default().once(self.dispatcher.clone(), delay, msg);
                self.jobs.push(job);
            }
            Cmd::Perform { delay, task } => {
                let job = Schedule::default().once_with(self.dispatcher.clone(), delay, task);
                self.jobs.push(job);
            }
            Cmd::Sub(sub) => {
                let (key, delay, msg, predicate) = sub.dissolve();
                if let Some(key) = &key {
                    self.cancel(key);
                }
                let schedule = key.clone().map(Schedule::named).unwrap_or_default();
                let channel = self.dispatcher.clone();
                let handle = match predicate {
                    Some(predicate) => schedule.until(channel, delay, msg, predicate),
                    None => schedule.repeating(channel, delay, msg),
                };
                match key {
                    Some(key) => {
                        self.subs.insert(key, handle);
                    }
                    None => self.loose.push(handle),
                }
            }
            Cmd::Cancel(key) => {
                if !self.cancel(&key) {
                    tracing::warn!("No loop named {key} to cancel.");
                }
            }
        }
        Ok(())
    }

    /// Cancels the keyed loop, returning whether there was one.
    fn cancel(&mut self, key: &str) -> bool {
        match self.subs.remove(key) {
            Some(handle) => {
                tracing::trace!("Cancelling {key}.");
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of loops still running.
    pub fn active(&self) -> usize {
        self.subs
            .values()
            .chain(self.loose.iter())
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Drops bookkeeping for loops and single dispatches that have finished, logging any
    /// single dispatch that failed.
    async fn reap(&mut self) {
        self.subs.retain(|_, handle| !handle.is_finished());
        self.loose.retain(|handle| !handle.is_finished());
        let (done, pending): (Vec<_>, Vec<_>) =
            self.jobs.drain(..).partition(|job| job.is_finished());
        self.jobs = pending;
        for job in done {
            // Already finished, so this does not wait.
            match job.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("Dispatch failed: {e}"),
                Err(e) => tracing::warn!("Dispatch task failed: {e}"),
            }
        }
    }

    fn halt(&mut self) {
        for handle in self.subs.values().chain(self.loose.iter()) {
            handle.cancel();
        }
        self.subs.clear();
        self.loose.clear();
    }
}
