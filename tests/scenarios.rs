use belated::{
    channel, schedule_repeating, schedule_until, trace_init, Cmd, Countdown, Mode, Phase, Program,
    Runtime, Settings, SettingsBuilder, Snapshot,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};

const SECOND: Duration = Duration::from_secs(1);

fn countdown(mode: Mode) -> Countdown {
    let settings: Settings = SettingsBuilder::default()
        .tick_ms(1000)
        .count(3)
        .mode(mode)
        .build()
        .unwrap();
    Countdown::from(&settings)
}

/// The counter starts at 3 and the "update function" here is the test body, which decrements it
/// for every tick it receives.
#[tokio::test(start_paused = true)]
async fn countdown_ticks_three_times_then_stops() {
    trace_init();
    let (tx, mut rx) = channel();
    let count = Arc::new(AtomicU32::new(3));
    let seen = Arc::clone(&count);
    let start = Instant::now();
    let handle = schedule_until(tx, SECOND, "tick", move || seen.load(Ordering::SeqCst) > 0);

    for k in 1..=3 {
        assert_eq!(rx.recv().await, Some("tick"));
        assert_eq!(start.elapsed(), SECOND * k);
        count.fetch_sub(1, Ordering::SeqCst);
    }
    // No fourth tick: the loop ends at t=4000ms without submitting.
    assert_eq!(rx.recv().await, None);
    assert_eq!(start.elapsed(), SECOND * 4);
    assert_eq!(handle.phase(), Phase::Halted);
}

#[tokio::test(start_paused = true)]
async fn two_loops_share_one_channel() {
    let (tx, mut rx) = channel();
    let start = Instant::now();
    let fast = schedule_repeating(tx.clone(), Duration::from_millis(300), 'a');
    let slow = schedule_repeating(tx, Duration::from_millis(500), 'b');

    let collector = tokio::spawn(async move {
        let mut log = Vec::new();
        while let Some(msg) = rx.recv().await {
            log.push((msg, start.elapsed()));
        }
        log
    });

    time::sleep(Duration::from_millis(1600)).await;
    fast.cancel();
    slow.cancel();
    let log = collector.await.unwrap();

    let times = |tag: char| {
        log.iter()
            .filter(|(msg, _)| *msg == tag)
            .map(|(_, at)| at.as_millis())
            .collect::<Vec<_>>()
    };
    assert_eq!(log.len(), 8);
    assert_eq!(times('a'), vec![300, 600, 900, 1200, 1500]);
    assert_eq!(times('b'), vec![500, 1000, 1500]);
}

#[tokio::test(start_paused = true)]
async fn runtime_runs_loop_countdown() {
    let start = Instant::now();
    let clock = Runtime::new(countdown(Mode::Loop)).run().await.unwrap();
    assert_eq!(*clock.ticks(), 3);
    assert_eq!(*clock.count(), 0);
    assert_eq!(start.elapsed(), SECOND * 3);
}

#[tokio::test(start_paused = true)]
async fn runtime_runs_recursive_countdown() {
    let start = Instant::now();
    let clock = Runtime::new(countdown(Mode::Recursive)).run().await.unwrap();
    assert_eq!(*clock.ticks(), 3);
    assert_eq!(start.elapsed(), SECOND * 3);
}

#[tokio::test(start_paused = true)]
async fn runtime_with_nothing_to_count_quits_immediately() {
    let settings = Settings::default().with_count(0u32);
    let clock = Runtime::new(Countdown::from(&settings)).run().await.unwrap();
    assert_eq!(*clock.ticks(), 0);
}

/// Counts pulses until it has enough.  Optionally starts its pulse loop twice under the same key
/// and optionally cancels the loop partway through.
struct Pulse {
    doubled: bool,
    stop_after: Option<u32>,
    enough: u32,
}

#[derive(Debug, Clone, Default)]
struct Pulses {
    count: u32,
    done: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Beat {
    Pulse,
    Done,
}

const BEAT: Duration = Duration::from_millis(100);

impl Program for Pulse {
    type Model = Pulses;
    type Msg = Beat;

    fn init(&self) -> (Pulses, Cmd<Beat>) {
        (Pulses::default(), Cmd::none())
    }

    fn update(&self, model: &mut Pulses, msg: Beat) -> Cmd<Beat> {
        match msg {
            Beat::Pulse => {
                model.count += 1;
                if Some(model.count) == self.stop_after {
                    return Cmd::batch([Cmd::cancel("pulse"), Cmd::delay(SECOND, Beat::Done)]);
                }
            }
            Beat::Done => model.done = true,
        }
        Cmd::none()
    }

    fn subscribe(&self, _snapshot: Snapshot<Pulses>) -> Cmd<Beat> {
        let pulse = || Cmd::indefinite(BEAT, Beat::Pulse).keyed("pulse");
        if self.doubled {
            Cmd::batch([pulse(), pulse()])
        } else {
            pulse()
        }
    }

    fn quit(&self, model: &Pulses) -> bool {
        model.done || model.count >= self.enough
    }
}

#[tokio::test(start_paused = true)]
async fn keyed_loop_is_replaced_not_doubled() {
    let start = Instant::now();
    let program = Pulse {
        doubled: true,
        stop_after: None,
        enough: 10,
    };
    let model = Runtime::new(program).run().await.unwrap();
    assert_eq!(model.count, 10);
    // Two loops would have reached ten pulses at 500ms.
    assert_eq!(start.elapsed(), SECOND);
}

#[tokio::test(start_paused = true)]
async fn cancel_by_key_stops_the_loop() {
    let start = Instant::now();
    let program = Pulse {
        doubled: false,
        stop_after: Some(3),
        enough: u32::MAX,
    };
    let model = Runtime::new(program).run().await.unwrap();
    assert!(model.done);
    assert_eq!(model.count, 3);
    assert_eq!(start.elapsed(), Duration::from_millis(1300));
}

#[tokio::test(start_paused = true)]
async fn runtime_accepts_outside_messages() {
    let runtime = Runtime::new(Pulse {
        doubled: false,
        stop_after: None,
        enough: u32::MAX,
    });
    let outside = runtime.dispatcher().clone();
    let job = belated::schedule_once(outside, Duration::from_millis(50), Beat::Done);
    let start = Instant::now();
    let model = runtime.run().await.unwrap();
    assert!(model.done);
    assert!(job.await.unwrap().is_ok());
    assert_eq!(start.elapsed(), Duration::from_millis(50));
}

/// Pulses twice through a loop that then halts, and only quits when told to from outside.
struct Fading;

impl Program for Fading {
    type Model = Pulses;
    type Msg = Beat;

    fn init(&self) -> (Pulses, Cmd<Beat>) {
        (Pulses::default(), Cmd::none())
    }

    fn update(&self, model: &mut Pulses, msg: Beat) -> Cmd<Beat> {
        match msg {
            Beat::Pulse => model.count += 1,
            Beat::Done => model.done = true,
        }
        Cmd::none()
    }

    fn subscribe(&self, snapshot: Snapshot<Pulses>) -> Cmd<Beat> {
        Cmd::indefinite_until(BEAT, Beat::Pulse, move || snapshot.read(|m| m.count < 2))
            .keyed("fading")
    }

    fn quit(&self, model: &Pulses) -> bool {
        model.done
    }
}

#[tokio::test(start_paused = true)]
async fn runtime_outlives_its_loops_until_quit() {
    let runtime = Runtime::new(Fading);
    let outside = runtime.dispatcher().clone();
    let job = belated::schedule_once(outside, Duration::from_secs(5), Beat::Done);
    let start = Instant::now();
    let model = runtime.run().await.unwrap();
    assert_eq!(model.count, 2);
    assert!(model.done);
    assert_eq!(start.elapsed(), Duration::from_secs(5));
    assert!(job.await.unwrap().is_ok());
}
