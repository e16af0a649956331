use serde::{Deserialize, Serialize};

/// Raw reason code the scheduler stores for the "cooling finished" wakeup.
/// Every other code is a catalog index.
pub const READY_SENTINEL: i32 = -1;

/// Why a deferred wakeup fired.
///
/// Scheduler adapters store a plain integer; it is decoded here once and the
/// rest of the crate only ever sees the tagged form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WakeReason {
    /// The steep timer for this catalog entry ran out.
    SteepFinished { tea_index: usize },
    /// The cooling wait after steeping ran out.
    CoolingFinished,
}

impl WakeReason {
    pub fn code(self) -> i32 {
        match self {
            WakeReason::SteepFinished { tea_index } => {
                i32::try_from(tea_index).unwrap_or(i32::MAX)
            }
            WakeReason::CoolingFinished => READY_SENTINEL,
        }
    }

    /// Decode a stored reason code. Negative codes other than the sentinel
    /// are not produced by this crate and decode to `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            READY_SENTINEL => Some(WakeReason::CoolingFinished),
            c if c >= 0 => Some(WakeReason::SteepFinished {
                tea_index: c as usize,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_decodes_to_cooling_finished() {
        assert_eq!(WakeReason::from_code(-1), Some(WakeReason::CoolingFinished));
        assert_eq!(WakeReason::CoolingFinished.code(), READY_SENTINEL);
    }

    #[test]
    fn tea_index_codes() {
        assert_eq!(
            WakeReason::from_code(4),
            Some(WakeReason::SteepFinished { tea_index: 4 })
        );
        assert_eq!(WakeReason::SteepFinished { tea_index: 0 }.code(), 0);
    }

    #[test]
    fn unknown_negative_codes_are_rejected() {
        assert_eq!(WakeReason::from_code(-7), None);
        assert_eq!(WakeReason::from_code(i32::MIN), None);
    }
}
