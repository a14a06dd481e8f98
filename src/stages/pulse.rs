use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::pipeline::{ConfigError, DEFAULT_OUTPUT, Item, Outputs, Stage, TypeMatcher};

/// Sequence number of one Pulse firing, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tick(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub frequency_ms: u64,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self { frequency_ms: 1000 }
    }
}

impl PulseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frequency_ms == 0 {
            return Err(ConfigError::NotPositive {
                field: "frequency_ms",
                value: self.frequency_ms,
            });
        }
        Ok(())
    }
}

/// Timer-driven source of [`Tick`]s. Takes no input.
#[derive(Debug)]
pub struct Pulse {
    interval: Duration,
    sequence: u64,
}

impl Pulse {
    pub fn new(config: &PulseConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            interval: Duration::from_millis(config.frequency_ms),
            sequence: 0,
        })
    }
}

impl Stage for Pulse {
    fn accepts(&self) -> Vec<TypeMatcher> {
        Vec::new()
    }

    fn process(&mut self, item: Item, _outputs: &Outputs) -> Option<Item> {
        Some(item)
    }

    fn tick_interval(&self) -> Option<Duration> {
        Some(self.interval)
    }

    fn on_timer(&mut self, outputs: &Outputs) {
        self.sequence += 1;
        trace!(sequence = self.sequence, "pulse");
        outputs.emit(DEFAULT_OUTPUT, Item::new(Tick(self.sequence)));
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use crossbeam_channel::unbounded;

    use super::{Pulse, PulseConfig, Tick};
    use crate::pipeline::{ConfigError, DEFAULT_OUTPUT, StageHandle};

    #[test]
    fn config_defaults_and_validation() {
        let config: PulseConfig = serde_json::from_str("{}").expect("empty config parses");
        assert_eq!(config.frequency_ms, 1000);
        assert!(serde_json::from_str::<PulseConfig>(r#"{"frequency_ms": -5}"#).is_err());
        assert_eq!(
            Pulse::new(&PulseConfig { frequency_ms: 0 }).map(|_| ()),
            Err(ConfigError::NotPositive {
                field: "frequency_ms",
                value: 0
            })
        );
    }

    #[test]
    fn ticks_increase_and_close_is_prompt() {
        let pulse = Pulse::new(&PulseConfig { frequency_ms: 10 }).expect("config is valid");
        let stage = StageHandle::new("pulse", pulse);
        let (tx, rx) = unbounded();
        stage
            .connect_sender(DEFAULT_OUTPUT, "tap", tx)
            .expect("default output exists");
        stage.start().expect("pulse should start");

        let ticks: Vec<Tick> = (0..3)
            .map(|_| {
                let item = rx
                    .recv_timeout(Duration::from_secs(2))
                    .expect("tick should arrive");
                *item.downcast_ref::<Tick>().expect("item should be a tick")
            })
            .collect();
        assert_eq!(ticks, vec![Tick(1), Tick(2), Tick(3)]);

        let slow = Pulse::new(&PulseConfig::default()).expect("config is valid");
        let slow = StageHandle::new("slow pulse", slow);
        slow.start().expect("slow pulse should start");
        let started = Instant::now();
        slow.close();
        stage.close();
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
