use crate::Arrive;
use std::time::Duration;

/// Default interval between ticks, in milliseconds.
pub const TICK_MS: u64 = 1000;
/// Default number of ticks in a countdown.
pub const COUNT: u32 = 3;
/// Default name for the countdown loop.
pub const NAME: &str = "countdown";

/// The `Mode` enum picks how the countdown keeps itself going.
///
/// * `Loop` - Start one loop at startup with [`crate::Cmd::indefinite_until`].
/// * `Recursive` - Answer each tick by scheduling the next with [`crate::Cmd::delay`].
#[derive(
    Debug,
    Default,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    #[default]
    Loop,
    Recursive,
}

/// The `Settings` struct holds the knobs for the countdown demo.
///
/// Settings come from `Belated.toml` in the working directory, with environment variables
/// prefixed `BELATED_` layered on top (so `BELATED_TICK_MS=250` speeds things up).  Any key that
/// is missing from both takes its default.
///
/// ```toml
/// tick_ms = 1000
/// count = 3
/// name = "countdown"
/// mode = "loop"
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    derive_builder::Builder,
    derive_getters::Getters,
    derive_setters::Setters,
)]
#[builder(default)]
#[setters(prefix = "with_", into)]
pub struct Settings {
    tick_ms: u64,
    count: u32,
    name: String,
    mode: Mode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_ms: TICK_MS,
            count: COUNT,
            name: NAME.to_string(),
            mode: Mode::default(),
        }
    }
}

impl Settings {
    /// The tick interval as a [`Duration`].
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Reads settings from the file `name` and the environment.  The extension is optional, as
    /// with [`config::File::with_name`].  Will [`crate::Blame::Config`] if the file is missing or
    /// malformed.
    #[tracing::instrument]
    pub fn from_file(name: &str) -> Arrive<Self> {
        let config = Self::defaults()?
            .add_source(config::File::with_name(name))
            .add_source(config::Environment::with_prefix("BELATED"))
            .build()?;
        let settings = config.try_deserialize()?;
        tracing::trace!("Settings read from {name}.");
        Ok(settings)
    }

    /// Reads settings from the environment alone.
    #[tracing::instrument]
    pub fn from_env() -> Arrive<Self> {
        let config = Self::defaults()?
            .add_source(config::Environment::with_prefix("BELATED"))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Reads `Belated.toml` if it can, and falls back on the environment and defaults if it can't.
    /// Never fails.  A bad file or a bad variable is logged and replaced with defaults.
    #[tracing::instrument]
    pub fn load() -> Self {
        let settings = match Self::from_file("Belated") {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Could not read settings from file: {e}");
                Self::from_env().unwrap_or_else(|e| {
                    tracing::warn!("Could not read settings from environment: {e}");
                    Self::default()
                })
            }
        };
        tracing::trace!("{:#?}", settings);
        settings
    }

    fn defaults() -> Arrive<config::ConfigBuilder<config::builder::DefaultState>> {
        let builder = config::Config::builder()
            .set_default("tick_ms", TICK_MS as i64)?
            .set_default("count", i64::from(COUNT))?
            .set_default("name", NAME)?
            .set_default("mode", Mode::default().to_string())?;
        Ok(builder)
    }
}
