use chrono::{DateTime, Utc};
use serde::Serialize;
use teaready_core::{Catalog, Event, SessionState, TeaCatalog, ValidationError};

use crate::host::{deliver_due, open_machine, print_event};

#[derive(Serialize)]
struct StatusReport {
    state: SessionState,
    tea: Option<String>,
    progress: Option<u8>,
    remaining_secs: Option<i64>,
    ends_at: Option<DateTime<Utc>>,
    /// Events produced while restoring and catching up for this call.
    recovered: Vec<Event>,
}

/// Accept either a catalog index or a tea name. Hidden teas are refused.
pub fn resolve_tea(catalog: &TeaCatalog, arg: &str) -> Result<usize, ValidationError> {
    match arg.parse::<usize>() {
        Ok(index) if catalog.is_visible(index) => Ok(index),
        Ok(index) if index < catalog.len() => Err(ValidationError::UnknownTea(arg.to_string())),
        Ok(index) => Err(ValidationError::OutOfBounds {
            collection: "catalog".into(),
            index,
            len: catalog.len(),
        }),
        Err(_) => catalog.index_of(arg),
    }
}

pub fn start(tea: &str, secs: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let (mut machine, _) = open_machine()?;
    let index = resolve_tea(machine.catalog(), tea)?;
    let now = Utc::now();
    let event = match secs {
        Some(secs) => machine.start_session(index, secs, now)?,
        None => machine.start_default(index, now)?,
    };
    print_event(&event)?;
    Ok(())
}

pub fn status() -> Result<(), Box<dyn std::error::Error>> {
    let (mut machine, mut recovered) = open_machine()?;
    let now = Utc::now();
    recovered.extend(deliver_due(&mut machine, now)?);
    let report = StatusReport {
        state: machine.state(),
        tea: machine.profile().map(|p| p.name.clone()),
        progress: machine.current_progress(now),
        remaining_secs: machine.remaining(now).map(|d| d.num_seconds()),
        ends_at: machine
            .session()
            .filter(|s| s.wakeup_id.is_some())
            .map(|s| s.scheduled_at),
        recovered,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn cancel() -> Result<(), Box<dyn std::error::Error>> {
    let (mut machine, _) = open_machine()?;
    match machine.cancel_session(Utc::now())? {
        Some(event) => print_event(&event)?,
        None => println!("{{\"type\": \"no_session\"}}"),
    }
    Ok(())
}

pub fn dismiss() -> Result<(), Box<dyn std::error::Error>> {
    let (mut machine, _) = open_machine()?;
    let event = machine.dismiss_ready(Utc::now())?;
    print_event(&event)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn resolves_index_and_name() {
        let catalog = TeaCatalog::builtin();
        assert_eq!(resolve_tea(&catalog, "1").unwrap(), 1);
        assert_eq!(resolve_tea(&catalog, "oolong").unwrap(), 5);
        assert_eq!(resolve_tea(&catalog, "Maté").unwrap(), 3);
        assert!(matches!(
            resolve_tea(&catalog, "9"),
            Err(ValidationError::OutOfBounds { index: 9, .. })
        ));
        assert!(matches!(
            resolve_tea(&catalog, "earl grey"),
            Err(ValidationError::UnknownTea(_))
        ));
    }

    #[test]
    fn hidden_tea_cannot_be_started() {
        let overrides: BTreeMap<String, u16> = [("green".to_string(), 0)].into_iter().collect();
        let catalog = TeaCatalog::builtin().with_overrides(&overrides);
        assert!(matches!(
            resolve_tea(&catalog, "1"),
            Err(ValidationError::UnknownTea(_))
        ));
        assert!(resolve_tea(&catalog, "green").is_err());
        assert_eq!(resolve_tea(&catalog, "0").unwrap(), 0);
    }
}
