use crate::{Cmd, Mode, Program, Settings, Snapshot};
use std::time::Duration;

/// The countdown demo in its smallest form: a number that goes down once a tick until it hits
/// zero.
#[derive(Debug, Clone, PartialEq, derive_getters::Getters, derive_new::new)]
pub struct Countdown {
    name: String,
    tick: Duration,
    start: u32,
    mode: Mode,
}

impl From<&Settings> for Countdown {
    fn from(settings: &Settings) -> Self {
        Self::new(
            settings.name().clone(),
            settings.tick(),
            *settings.count(),
            *settings.mode(),
        )
    }
}

/// Model for [`Countdown`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, derive_getters::Getters)]
pub struct Clock {
    /// Ticks left to go.
    count: u32,
    /// Ticks received so far.
    ticks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Tick {
    Tick,
}

impl Program for Countdown {
    type Model = Clock;
    type Msg = Tick;

    fn init(&self) -> (Clock, Cmd<Tick>) {
        let clock = Clock {
            count: self.start,
            ticks: 0,
        };
        let cmd = match self.mode {
            Mode::Recursive if self.start > 0 => Cmd::delay(self.tick, Tick::Tick),
            _ => Cmd::none(),
        };
        tracing::info!("{} starting at {}.", self.name, self.start);
        (clock, cmd)
    }

    fn update(&self, clock: &mut Clock, msg: Tick) -> Cmd<Tick> {
        match msg {
            Tick::Tick => {
                clock.count = clock.count.saturating_sub(1);
                clock.ticks += 1;
                tracing::info!("{}: {} left.", self.name, clock.count);
            }
        }
        match self.mode {
            Mode::Recursive if clock.count > 0 => Cmd::delay(self.tick, Tick::Tick),
            _ => Cmd::none(),
        }
    }

    fn subscribe(&self, snapshot: Snapshot<Clock>) -> Cmd<Tick> {
        match self.mode {
            Mode::Loop => Cmd::indefinite_until(self.tick, Tick::Tick, move || {
                snapshot.read(|clock| clock.count > 0)
            })
            .keyed(self.name.clone()),
            Mode::Recursive => Cmd::none(),
        }
    }

    fn quit(&self, clock: &Clock) -> bool {
        clock.count == 0
    }
}
