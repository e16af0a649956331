//! Vibration alert sequence.
//!
//! A capped run of pulses driven by one-shot app timers. Every step is a
//! timer callback; nothing here blocks.
//!
//! ```text
//! final:        Pulsing(0) -> .. -> Pulsing(N-1) -> Waiting -> FinalPulse (close app) -> Stopped
//! dismissible:  Pulsing(0) -> .. -> Pulsing(N-1) -> Stopped
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::platform::{AppTimer, TimerHandle, Vibrator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertMode {
    /// The tea is ready. Ends by asking the host to close the app.
    Final,
    /// Interim reminder. Ends silently.
    Dismissible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPhase {
    /// Next tick issues pulse number `n + 1`.
    Pulsing(u8),
    Waiting,
    /// Last pulse issued and close requested. Held until `cancel`.
    FinalPulse,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertConfig {
    pub pulse_cap: u8,
    pub pulse_interval: Duration,
    pub final_wait: Duration,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            pulse_cap: 3,
            pulse_interval: Duration::from_secs(10),
            final_wait: Duration::from_secs(120),
        }
    }
}

/// Per-run state, rebuilt by every `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertState {
    pub mode: AlertMode,
    pub phase: AlertPhase,
    pub pulse_count: u8,
    pub timer: Option<TimerHandle>,
}

/// What a timer callback did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSignal {
    /// Pulsed and armed the next step.
    Pulsed { count: u8 },
    /// Pulse cap reached and the post-cap wait is armed.
    Waiting { pulses: u8 },
    /// Dismissible run complete; the last pulse was issued by this tick.
    Finished { pulses: u8 },
    /// Final pulse issued; the host should close.
    CloseApp,
    /// Handle did not belong to the live run.
    Ignored,
}

pub struct AlertSequencer<T, V> {
    timers: T,
    vibrator: V,
    config: AlertConfig,
    state: Option<AlertState>,
}

impl<T: AppTimer, V: Vibrator> AlertSequencer<T, V> {
    pub fn new(timers: T, vibrator: V, config: AlertConfig) -> Self {
        Self {
            timers,
            vibrator,
            config,
            state: None,
        }
    }

    /// Start a fresh run, replacing any run in progress. The first pulse
    /// happens on the next timer callback.
    pub fn start(&mut self, mode: AlertMode) {
        self.cancel();
        let handle = self.timers.register(Duration::ZERO);
        self.state = Some(AlertState {
            mode,
            phase: AlertPhase::Pulsing(0),
            pulse_count: 0,
            timer: Some(handle),
        });
        tracing::debug!(?mode, "alert started");
    }

    /// Stop immediately. Safe in any state.
    pub fn cancel(&mut self) {
        if let Some(state) = self.state.take() {
            if let Some(handle) = state.timer {
                self.timers.cancel(handle);
            }
        }
    }

    /// Timer callback.
    pub fn on_timer(&mut self, handle: TimerHandle) -> AlertSignal {
        let Some(state) = self.state.as_mut() else {
            return AlertSignal::Ignored;
        };
        if state.timer != Some(handle) {
            return AlertSignal::Ignored;
        }
        state.timer = None;

        match state.phase {
            AlertPhase::Pulsing(_) => {
                self.vibrator.pulse();
                state.pulse_count += 1;
                let count = state.pulse_count;
                if count < self.config.pulse_cap {
                    state.phase = AlertPhase::Pulsing(count);
                    state.timer = Some(self.timers.register(self.config.pulse_interval));
                    tracing::debug!(count, "alert pulse");
                    AlertSignal::Pulsed { count }
                } else {
                    match state.mode {
                        AlertMode::Final => {
                            state.phase = AlertPhase::Waiting;
                            state.timer = Some(self.timers.register(self.config.final_wait));
                            AlertSignal::Waiting { pulses: count }
                        }
                        AlertMode::Dismissible => {
                            self.state = None;
                            tracing::debug!(pulses = count, "reminder finished");
                            AlertSignal::Finished { pulses: count }
                        }
                    }
                }
            }
            AlertPhase::Waiting => {
                state.phase = AlertPhase::FinalPulse;
                self.vibrator.pulse();
                tracing::debug!("final pulse, close requested");
                AlertSignal::CloseApp
            }
            // Neither phase keeps a timer armed.
            AlertPhase::FinalPulse | AlertPhase::Stopped => AlertSignal::Ignored,
        }
    }

    pub fn phase(&self) -> AlertPhase {
        self.state
            .map(|s| s.phase)
            .unwrap_or(AlertPhase::Stopped)
    }

    pub fn state(&self) -> Option<&AlertState> {
        self.state.as_ref()
    }

    /// A timer is armed: the run will pulse again.
    pub fn is_active(&self) -> bool {
        self.state.is_some_and(|s| s.timer.is_some())
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut T {
        &mut self.timers
    }

    pub fn vibrator(&self) -> &V {
        &self.vibrator
    }
}
