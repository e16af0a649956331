//! Session state machine.
//!
//! Owns the one steeping session and drives the scheduler, the store and the
//! alert sequencer. Every entry point is a discrete callback from the host:
//! user intents, deferred wakeups, app-timer ticks. Time is always passed in.
//!
//! ## State Transitions
//!
//! ```text
//! NoSession -> Steeping -> (Cooling ->) Ready -> NoSession
//!                  \___________\___________\____ cancel -> NoSession
//! ```

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use super::reason::WakeReason;
use super::record::{self, Loaded, Phase, Session};
use crate::alert::{AlertConfig, AlertMode, AlertSequencer, AlertSignal};
use crate::catalog::{Catalog, TeaProfile};
use crate::cooling::{CoolingModel, Readiness};
use crate::error::{Result, SchedulingError, ValidationError};
use crate::events::{Event, SessionFault};
use crate::platform::{
    AppTimer, KeyValueStore, TimerHandle, Vibrator, WakeupId, WakeupScheduler, WakeupStatus,
};
use crate::progress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NoSession,
    Steeping,
    Cooling,
    Ready,
}

impl From<Phase> for SessionState {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Steeping => SessionState::Steeping,
            Phase::Cooling => SessionState::Cooling,
            Phase::Ready => SessionState::Ready,
        }
    }
}

/// User preferences and tunables the machine reads on every transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    /// When off, steeping goes straight to Ready with no cooling phase.
    pub reminder_enabled: bool,
    pub readiness: Readiness,
    pub cooling: CoolingModel,
    pub alert: AlertConfig,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            reminder_enabled: true,
            readiness: Readiness::default(),
            cooling: CoolingModel::default(),
            alert: AlertConfig::default(),
        }
    }
}

pub struct SessionMachine<S, K, C, T, V> {
    scheduler: S,
    store: K,
    catalog: C,
    settings: SessionSettings,
    session: Option<Session>,
    alert: AlertSequencer<T, V>,
}

impl<S, K, C, T, V> SessionMachine<S, K, C, T, V>
where
    S: WakeupScheduler,
    K: KeyValueStore,
    C: Catalog,
    T: AppTimer,
    V: Vibrator,
{
    /// Create a machine with no session loaded. Call [`Self::recover`]
    /// before serving the host, or use [`Self::restore`].
    pub fn new(
        scheduler: S,
        store: K,
        catalog: C,
        timers: T,
        vibrator: V,
        settings: SessionSettings,
    ) -> Self {
        Self {
            scheduler,
            store,
            catalog,
            alert: AlertSequencer::new(timers, vibrator, settings.alert),
            settings,
            session: None,
        }
    }

    /// Create a machine and reconstruct its state from storage.
    pub fn restore(
        scheduler: S,
        store: K,
        catalog: C,
        timers: T,
        vibrator: V,
        settings: SessionSettings,
        now: DateTime<Utc>,
    ) -> Result<(Self, Vec<Event>)> {
        let mut machine = Self::new(scheduler, store, catalog, timers, vibrator, settings);
        let events = machine.recover(now)?;
        Ok((machine, events))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(|s| s.phase.into())
            .unwrap_or(SessionState::NoSession)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn phase(&self) -> Option<Phase> {
        self.session.as_ref().map(|s| s.phase)
    }

    pub fn profile(&self) -> Option<&TeaProfile> {
        self.session
            .as_ref()
            .and_then(|s| self.catalog.profile_for(s.tea_index))
    }

    /// Percentage for the live countdown. `None` outside Steeping/Cooling.
    pub fn current_progress(&self, now: DateTime<Utc>) -> Option<u8> {
        let session = self.waiting_session()?;
        Some(progress::percentage(
            now,
            session.scheduled_at,
            session.duration_secs,
            session.phase,
        ))
    }

    /// Time left in the current waiting phase, never negative.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<ChronoDuration> {
        let session = self.waiting_session()?;
        Some((session.scheduled_at - now).max(ChronoDuration::zero()))
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn store(&self) -> &K {
        &self.store
    }

    pub fn alert(&self) -> &AlertSequencer<T, V> {
        &self.alert
    }

    pub fn timers_mut(&mut self) -> &mut T {
        self.alert.timers_mut()
    }

    /// Tear down, keeping the durable collaborators. In-process alert
    /// timers die with the machine.
    pub fn into_parts(mut self) -> (S, K) {
        self.alert.cancel();
        (self.scheduler, self.store)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Rebuild state from storage after a (re)launch.
    ///
    /// A wakeup that fired while the process was down is replayed exactly
    /// as a live delivery would have been handled.
    pub fn recover(&mut self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        self.alert.cancel();
        self.session = None;

        let session = match record::load(&self.store)? {
            Loaded::Absent => return Ok(Vec::new()),
            Loaded::Inconsistent => {
                let stray = record::stray_wakeup(&self.store);
                return Ok(vec![self.purge(SessionFault::InconsistentPersistence, stray, now)?]);
            }
            Loaded::Present(session) => session,
        };

        let Some(id) = session.wakeup_id else {
            tracing::info!(tea_index = session.tea_index, "resumed ready session");
            let event = Event::SessionResumed {
                phase: session.phase,
                tea_index: session.tea_index,
                at: now,
            };
            self.session = Some(session);
            return Ok(vec![event]);
        };

        match self.scheduler.query(id)? {
            WakeupStatus::Pending { at, reason } if reason == expected_reason(&session) => {
                tracing::info!(phase = ?session.phase, wakeup = id.0, "resumed pending session");
                let event = Event::SessionResumed {
                    phase: session.phase,
                    tea_index: session.tea_index,
                    at: now,
                };
                self.session = Some(Session {
                    scheduled_at: at,
                    ..session
                });
                Ok(vec![event])
            }
            WakeupStatus::Fired { reason } if reason == expected_reason(&session) => {
                tracing::info!(?reason, wakeup = id.0, "replaying wakeup missed while closed");
                self.session = Some(session);
                let mut events = vec![Event::MissedWakeupReplayed { reason, at: now }];
                events.extend(self.on_deferred_event_fired(reason, now)?);
                Ok(events)
            }
            status => {
                tracing::warn!(?status, phase = ?session.phase, "wakeup does not match session");
                Ok(vec![self.purge(SessionFault::StaleSession, Some(id), now)?])
            }
        }
    }

    /// Begin steeping `tea_index` for `duration_secs`, replacing any
    /// existing session.
    pub fn start_session(
        &mut self,
        tea_index: usize,
        duration_secs: u16,
        now: DateTime<Utc>,
    ) -> Result<Event> {
        let tea_name = self.lookup(tea_index)?.name.clone();
        if duration_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "duration_secs".into(),
                message: "must be greater than zero".into(),
            }
            .into());
        }

        if self.session.is_some() {
            self.release_wakeup();
            self.alert.cancel();
            self.session = None;
            record::clear(&mut self.store)?;
        }

        let ends_at = now + ChronoDuration::seconds(i64::from(duration_secs));
        let id = self
            .scheduler
            .schedule(ends_at, WakeReason::SteepFinished { tea_index });
        if !id.is_valid() {
            tracing::warn!(tea_index, code = id.0, "scheduler refused steep wakeup");
            return Err(SchedulingError::Refused {
                at: ends_at,
                code: id.0,
            }
            .into());
        }

        let session = Session {
            wakeup_id: Some(id),
            scheduled_at: ends_at,
            duration_secs,
            phase: Phase::Steeping,
            tea_index,
        };
        if let Err(e) = record::save(&mut self.store, &session) {
            self.scheduler.cancel(id);
            if let Err(clear_err) = record::clear(&mut self.store) {
                tracing::warn!(%clear_err, "could not roll back partial session");
            }
            return Err(e.into());
        }

        tracing::info!(tea_index, duration_secs, wakeup = id.0, "steeping started");
        self.session = Some(session);
        Ok(Event::SessionStarted {
            tea_index,
            tea_name,
            duration_secs,
            ends_at,
            at: now,
        })
    }

    /// Start steeping with the catalog's duration for this tea.
    pub fn start_default(&mut self, tea_index: usize, now: DateTime<Utc>) -> Result<Event> {
        let duration_secs = self.lookup(tea_index)?.default_duration_secs;
        self.start_session(tea_index, duration_secs, now)
    }

    /// Deferred wakeup callback. Called once per scheduled event, either
    /// live or from [`Self::recover`].
    pub fn on_deferred_event_fired(
        &mut self,
        reason: WakeReason,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        match reason {
            WakeReason::CoolingFinished => {
                let Some(tea_index) = self.session.as_ref().map(|s| s.tea_index) else {
                    tracing::warn!("cooling wakeup arrived with no session");
                    return Ok(Vec::new());
                };
                self.release_wakeup();
                Ok(self.enter_ready(tea_index, now))
            }
            WakeReason::SteepFinished { tea_index } => {
                let steeping = self
                    .session
                    .as_ref()
                    .is_some_and(|s| s.phase == Phase::Steeping && s.tea_index == tea_index);
                if !steeping {
                    tracing::warn!(tea_index, state = ?self.state(), "ignoring stray steep wakeup");
                    return Ok(Vec::new());
                }
                self.finish_steeping(tea_index, now)
            }
        }
    }

    /// App-timer callback for the alert sequence.
    pub fn on_alert_timer(
        &mut self,
        handle: TimerHandle,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let events = match self.alert.on_timer(handle) {
            AlertSignal::Ignored => Vec::new(),
            AlertSignal::Pulsed { count } => vec![Event::AlertPulsed { count, at: now }],
            AlertSignal::Waiting { pulses } => {
                vec![Event::AlertPulsed { count: pulses, at: now }]
            }
            AlertSignal::Finished { pulses } => vec![
                Event::AlertPulsed { count: pulses, at: now },
                Event::AlertFinished { pulses, at: now },
            ],
            AlertSignal::CloseApp => {
                self.alert.cancel();
                let mut events = vec![Event::CloseRequested { at: now }];
                // Timing out the final alert counts as dismissing it.
                if self.state() == SessionState::Ready {
                    self.session = None;
                    record::clear(&mut self.store)?;
                    tracing::info!("ready alert timed out, session closed");
                    events.push(Event::SessionDismissed { at: now });
                }
                events
            }
        };
        Ok(events)
    }

    /// Abandon the session in any phase. No-op without a session.
    pub fn cancel_session(&mut self, now: DateTime<Utc>) -> Result<Option<Event>> {
        self.alert.cancel();
        let Some(phase) = self.session.as_ref().map(|s| s.phase) else {
            record::clear(&mut self.store)?;
            return Ok(None);
        };
        self.release_wakeup();
        self.session = None;
        record::clear(&mut self.store)?;
        tracing::info!(?phase, "session cancelled");
        Ok(Some(Event::SessionCancelled { phase, at: now }))
    }

    /// Acknowledge a ready cup.
    pub fn dismiss_ready(&mut self, now: DateTime<Utc>) -> Result<Event> {
        let state = self.state();
        if state != SessionState::Ready {
            return Err(ValidationError::InvalidState {
                operation: "dismiss",
                state: format!("{state:?}"),
            }
            .into());
        }
        self.alert.cancel();
        self.session = None;
        record::clear(&mut self.store)?;
        tracing::info!("ready session dismissed");
        Ok(Event::SessionDismissed { at: now })
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Steeping is over for the live session. Cools or goes straight to
    /// Ready.
    fn finish_steeping(&mut self, tea_index: usize, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let Some(temperature) = self
            .catalog
            .profile_for(tea_index)
            .map(|p| p.temperature_celsius)
        else {
            tracing::warn!(tea_index, "steep wakeup for unknown tea");
            return Ok(vec![self.purge(SessionFault::StaleSession, None, now)?]);
        };
        let prior_secs = self.session.as_ref().map(|s| s.duration_secs).unwrap_or(0);
        self.release_wakeup();

        let mut events = vec![Event::SteepingFinished { tea_index, at: now }];
        if !self.settings.reminder_enabled {
            events.extend(self.enter_ready(tea_index, now));
            return Ok(events);
        }

        let cooling = self.settings.cooling;
        let delay = cooling.delay(temperature, prior_secs, self.settings.readiness);
        if !cooling.needs_cooling(delay) {
            tracing::debug!(delay, "cooling delay under threshold");
            events.extend(self.enter_ready(tea_index, now));
            return Ok(events);
        }

        let duration_secs = u16::try_from(delay).unwrap_or(u16::MAX);
        let ends_at = now + ChronoDuration::seconds(i64::from(duration_secs));
        let id = self.scheduler.schedule(ends_at, WakeReason::CoolingFinished);
        if !id.is_valid() {
            tracing::warn!(code = id.0, "scheduler refused cooling wakeup, skipping cooling");
            events.extend(self.enter_ready(tea_index, now));
            return Ok(events);
        }

        let session = Session {
            wakeup_id: Some(id),
            scheduled_at: ends_at,
            duration_secs,
            phase: Phase::Cooling,
            tea_index,
        };
        if let Err(e) = record::save(&mut self.store, &session) {
            tracing::warn!(%e, "could not persist cooling, skipping cooling");
            self.scheduler.cancel(id);
            events.extend(self.enter_ready(tea_index, now));
            return Ok(events);
        }

        self.session = Some(session);
        self.alert.start(AlertMode::Dismissible);
        tracing::info!(tea_index, duration_secs, wakeup = id.0, "cooling started");
        events.push(Event::CoolingStarted {
            tea_index,
            duration_secs,
            ends_at,
            at: now,
        });
        events.push(Event::AlertStarted {
            mode: AlertMode::Dismissible,
            at: now,
        });
        Ok(events)
    }

    /// Ready always reaches the user: a failed write only costs the
    /// restored Ready state on the next launch.
    fn enter_ready(&mut self, tea_index: usize, now: DateTime<Utc>) -> Vec<Event> {
        let duration_secs = self.session.as_ref().map(|s| s.duration_secs).unwrap_or(0);
        let session = Session {
            wakeup_id: None,
            scheduled_at: now,
            duration_secs,
            phase: Phase::Ready,
            tea_index,
        };
        if let Err(e) = record::save(&mut self.store, &session) {
            tracing::error!(%e, "could not persist ready session");
            if let Err(clear_err) = record::clear(&mut self.store) {
                tracing::warn!(%clear_err, "could not clear partial session");
            }
        }
        self.session = Some(session);
        self.alert.start(AlertMode::Final);
        tracing::info!(tea_index, "tea ready");
        let tea_name = self
            .catalog
            .profile_for(tea_index)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        vec![
            Event::TeaReady {
                tea_index,
                tea_name,
                at: now,
            },
            Event::AlertStarted {
                mode: AlertMode::Final,
                at: now,
            },
        ]
    }

    /// Cancel the session's wakeup if the scheduler still holds it.
    fn release_wakeup(&mut self) {
        if let Some(id) = self.session.as_ref().and_then(|s| s.wakeup_id) {
            self.release(id);
        }
    }

    fn release(&mut self, id: WakeupId) {
        match self.scheduler.query(id) {
            Ok(WakeupStatus::Pending { .. }) => self.scheduler.cancel(id),
            Ok(WakeupStatus::Fired { .. } | WakeupStatus::Unknown) => {}
            Err(e) => {
                tracing::warn!(%e, wakeup = id.0, "wakeup query failed, cancelling anyway");
                self.scheduler.cancel(id);
            }
        }
    }

    /// Drop the session along with the live wakeup and any `stray` one
    /// named by persisted state that never loaded.
    fn purge(
        &mut self,
        fault: SessionFault,
        stray: Option<WakeupId>,
        now: DateTime<Utc>,
    ) -> Result<Event> {
        tracing::warn!(?fault, "discarding persisted session");
        if let Some(id) = stray {
            self.release(id);
        }
        self.release_wakeup();
        self.alert.cancel();
        self.session = None;
        record::clear(&mut self.store)?;
        Ok(Event::SessionPurged { fault, at: now })
    }

    fn lookup(&self, tea_index: usize) -> Result<&TeaProfile, ValidationError> {
        self.catalog
            .profile_for(tea_index)
            .ok_or_else(|| ValidationError::OutOfBounds {
                collection: "catalog".into(),
                index: tea_index,
                len: self.catalog.len(),
            })
    }

    fn waiting_session(&self) -> Option<&Session> {
        self.session
            .as_ref()
            .filter(|s| matches!(s.phase, Phase::Steeping | Phase::Cooling) && s.duration_secs > 0)
    }
}

fn expected_reason(session: &Session) -> WakeReason {
    match session.phase {
        Phase::Steeping => WakeReason::SteepFinished {
            tea_index: session.tea_index,
        },
        Phase::Cooling | Phase::Ready => WakeReason::CoolingFinished,
    }
}
