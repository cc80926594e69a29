//! The `belated` crate is an asynchronous library for sending yourself a message later.
//!
//! In a Model-Update-View application, the update function takes a message and the current state,
//! produces the next state, and returns.  It cannot wait.  When it wants something to happen in a
//! second, or every second, or every second until the counter runs out, it has to ask someone
//! else to send it a message when the time comes.  This crate is that someone else.
//!
//! The usual way to write a timer in this style is recursive: handle `Tick` by scheduling another
//! `Tick`.  It works.  It also spreads the base condition across the update function and
//! re-derives the timer every time a tick comes through.  The alternative is to write the loop as
//! a loop: start it once, let it wait and dispatch on its own, and give it one place to check
//! whether it should keep going.  Both are available here, and the [`countdown`] demo runs either
//! one depending on [`Settings`].
//!
//! Here is the map:
//!
//! 1. Getting messages back into the loop - [`Dispatch`]
//!     * [`channel`] creates a [`Dispatcher`] and an [`Inbox`].
//! 2. Sending messages later - [`Schedule`]
//!     * [`schedule_once`], [`schedule_once_with`] and [`schedule_once_either`] for a single shot.
//!     * [`schedule_repeating`] for a timer that runs until cancelled.
//!     * [`schedule_until`] and [`try_schedule_until`] for a timer with a base condition.
//! 3. Stopping loops - [`Handle`] and [`Phase`]
//! 4. Asking for things from the update function - [`Cmd`]
//!     * [`Cmd::indefinite`] and [`Cmd::indefinite_until`] wrap the loops above.
//! 5. Running a program - [`Runtime`] and [`Program`]
//!     * [`Snapshot`] lets a base condition read the model without touching it.
//! 6. Configuration - [`Settings`], read from `Belated.toml`.
//!
//! A word of warning that applies to everything with a base condition: start the loop once.  If
//! the predicate reads state and the loop is started again on every update, every update adds
//! another timer, and they all tick.  Start loops from [`Program::subscribe`] or from a single
//! start message, or give them a key with [`Cmd::keyed`] so the [`Runtime`] replaces the old one.
//!
//! We use [`tokio`] for the runtime and the clock, and [`tracing`] for logs.  Call [`trace_init`]
//! once at startup to see them.
mod cmd;
pub mod countdown;
mod dispatch;
mod error;
mod handle;
mod runtime;
mod schedule;
mod settings;
mod utils;

/// Since this is a small library, we lift all user-facing data types and functions to the parent
/// namespace for ease of access.
pub use cmd::{Cmd, Predicate, Sub, Task};
pub use countdown::{Clock, Countdown, Tick};
pub use dispatch::{channel, Dispatch, Dispatcher, Inbox};
pub use error::{Arrive, Blame};
pub use handle::{Handle, Phase};
pub use runtime::{Program, Runtime, Snapshot};
pub use schedule::{
    schedule_once, schedule_once_either, schedule_once_with, schedule_repeating, schedule_until,
    try_schedule_until, Schedule,
};
pub use settings::{Mode, Settings, SettingsBuilder, SettingsBuilderError, COUNT, NAME, TICK_MS};
pub use utils::trace_init;

pub(crate) use handle::Ticket;
