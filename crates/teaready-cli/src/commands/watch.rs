//! Foreground host loop.
//!
//! Stands in for the watch's event service: every tick delivers due
//! wakeups from the queue, fires expired alert timers and redraws the
//! progress line. Exits when the final alert asks to close, or when there
//! is nothing left to wait for.

use std::io::Write;
use std::time::{Duration, Instant};

use chrono::Utc;
use teaready_core::progress::redraw_interval;
use teaready_core::{Event, SessionState};

use crate::host::{deliver_due, open_machine, print_event, CliMachine};

const MAX_TICK: Duration = Duration::from_secs(1);

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    rt.block_on(watch())
}

async fn watch() -> Result<(), Box<dyn std::error::Error>> {
    let (mut machine, recovered) = open_machine()?;
    for event in &recovered {
        print_event(event)?;
    }

    loop {
        let mut events = deliver_due(&mut machine, Utc::now())?;
        for handle in machine.timers_mut().take_expired(Instant::now()) {
            events.extend(machine.on_alert_timer(handle, Utc::now())?);
        }

        let mut close = false;
        for event in &events {
            close |= matches!(event, Event::CloseRequested { .. });
            print_event(event)?;
        }
        if close || finished(&machine) {
            clear_progress();
            return Ok(());
        }

        draw_progress(&machine);
        tokio::time::sleep(tick(&machine)).await;
    }
}

/// Nothing scheduled and nothing ringing.
fn finished(machine: &CliMachine) -> bool {
    matches!(machine.state(), SessionState::NoSession | SessionState::Ready)
        && !machine.alert().is_active()
}

fn tick(machine: &CliMachine) -> Duration {
    machine
        .session()
        .map(|s| redraw_interval(s.duration_secs))
        .unwrap_or(MAX_TICK)
        .min(MAX_TICK)
}

fn draw_progress(machine: &CliMachine) {
    let now = Utc::now();
    let (Some(pct), Some(left)) = (machine.current_progress(now), machine.remaining(now)) else {
        return;
    };
    let name = machine.profile().map(|p| p.name.as_str()).unwrap_or("?");
    let label = match machine.state() {
        SessionState::Cooling => "cooling",
        _ => "steeping",
    };
    let mut err = std::io::stderr();
    let _ = write!(
        err,
        "\r{name} {label} {pct:>3}%  {:02}:{:02} ",
        left.num_minutes(),
        left.num_seconds() % 60
    );
    let _ = err.flush();
}

fn clear_progress() {
    let mut err = std::io::stderr();
    let _ = writeln!(err);
}
