//! Read-only beverage catalog.
//!
//! Steep times and temperatures follow common retailer guidance. Overrides
//! from the config file replace a profile's steep duration by `persist_key`;
//! an override of zero hides the tea from menus and name lookup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeaProfile {
    pub name: String,
    /// Steep time in seconds.
    pub default_duration_secs: u16,
    pub temperature_celsius: u8,
    /// Stable identifier used for overrides.
    pub persist_key: String,
    /// Left out of menus and name lookup. Index lookups still resolve, so a
    /// session for a tea hidden mid-steep keeps working.
    #[serde(default)]
    pub hidden: bool,
}

impl TeaProfile {
    pub fn new(
        name: &str,
        persist_key: &str,
        default_duration_secs: u16,
        temperature_celsius: u8,
    ) -> Self {
        Self {
            name: name.to_string(),
            default_duration_secs,
            temperature_celsius,
            persist_key: persist_key.to_string(),
            hidden: false,
        }
    }
}

/// Lookup of profiles by index.
pub trait Catalog {
    fn profile_for(&self, index: usize) -> Option<&TeaProfile>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shown when every tea is hidden (green).
const FALLBACK_INDEX: usize = 1;

/// Unit for displaying brewing temperatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempUnit {
    #[default]
    Celsius,
    Fahrenheit,
    Kelvin,
    Rankine,
}

impl TempUnit {
    /// Convert whole degrees Celsius, truncating like the menu does.
    pub fn convert(self, celsius: u8) -> i32 {
        let c = f64::from(celsius);
        let value = match self {
            TempUnit::Celsius => c,
            TempUnit::Fahrenheit => c * 1.8 + 32.0,
            TempUnit::Kelvin => c + 273.0,
            TempUnit::Rankine => (c + 273.0) * 1.8,
        };
        value as i32
    }

    pub fn symbol(self) -> &'static str {
        match self {
            TempUnit::Celsius => "°C",
            TempUnit::Fahrenheit => "°F",
            TempUnit::Kelvin => "K",
            TempUnit::Rankine => "°R",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeaCatalog {
    profiles: Vec<TeaProfile>,
}

impl TeaCatalog {
    pub fn new(profiles: Vec<TeaProfile>) -> Self {
        Self { profiles }
    }

    /// The nine built-in teas, in menu order.
    pub fn builtin() -> Self {
        Self::new(vec![
            TeaProfile::new("Black", "black", 240, 96),
            TeaProfile::new("Green", "green", 120, 80),
            TeaProfile::new("Herbal", "herbal", 240, 96),
            TeaProfile::new("Maté", "mate", 240, 85),
            TeaProfile::new("Matcha", "matcha", 30, 75),
            TeaProfile::new("Oolong", "oolong", 240, 85),
            TeaProfile::new("Pu'erh", "puerh", 240, 96),
            TeaProfile::new("Rooibos", "rooibos", 240, 96),
            TeaProfile::new("White", "white", 240, 90),
        ])
    }

    /// Apply user steep times. Zero hides the tea; unknown keys are
    /// ignored. Hiding every tea leaves green visible.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, u16>) -> Self {
        for profile in &mut self.profiles {
            match overrides.get(&profile.persist_key) {
                Some(0) => profile.hidden = true,
                Some(&secs) => profile.default_duration_secs = secs,
                None => {}
            }
        }
        if self.profiles.iter().all(|p| p.hidden) {
            if let Some(fallback) = self.profiles.get_mut(FALLBACK_INDEX) {
                fallback.hidden = false;
            }
        }
        self
    }

    /// Menu entries with their catalog index.
    pub fn visible(&self) -> impl Iterator<Item = (usize, &TeaProfile)> {
        self.profiles.iter().enumerate().filter(|(_, p)| !p.hidden)
    }

    pub fn is_visible(&self, index: usize) -> bool {
        self.profiles.get(index).is_some_and(|p| !p.hidden)
    }

    pub fn profiles(&self) -> &[TeaProfile] {
        &self.profiles
    }

    /// Find a visible tea by display name or persist key, ignoring case.
    pub fn index_of(&self, name: &str) -> Result<usize, ValidationError> {
        let wanted = name.to_lowercase();
        self.profiles
            .iter()
            .position(|p| {
                !p.hidden && (p.name.to_lowercase() == wanted || p.persist_key == wanted)
            })
            .ok_or_else(|| ValidationError::UnknownTea(name.to_string()))
    }
}

impl Default for TeaCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog for TeaCatalog {
    fn profile_for(&self, index: usize) -> Option<&TeaProfile> {
        self.profiles.get(index)
    }

    fn len(&self) -> usize {
        self.profiles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_order_and_values() {
        let c = TeaCatalog::builtin();
        assert_eq!(c.len(), 9);
        let green = c.profile_for(1).unwrap();
        assert_eq!(green.name, "Green");
        assert_eq!(green.default_duration_secs, 120);
        assert_eq!(green.temperature_celsius, 80);
        assert_eq!(c.profile_for(4).unwrap().default_duration_secs, 30);
        assert!(c.profile_for(9).is_none());
    }

    #[test]
    fn persist_keys_are_ascii() {
        let c = TeaCatalog::builtin();
        assert_eq!(c.profile_for(3).unwrap().persist_key, "mate");
        assert_eq!(c.profile_for(6).unwrap().persist_key, "puerh");
    }

    #[test]
    fn lookup_by_name_or_key() {
        let c = TeaCatalog::builtin();
        assert_eq!(c.index_of("oolong").unwrap(), 5);
        assert_eq!(c.index_of("Pu'erh").unwrap(), 6);
        assert_eq!(c.index_of("puerh").unwrap(), 6);
        assert!(matches!(
            c.index_of("earl grey"),
            Err(ValidationError::UnknownTea(_))
        ));
    }

    #[test]
    fn overrides_replace_duration() {
        let mut o = BTreeMap::new();
        o.insert("green".to_string(), 150);
        o.insert("black".to_string(), 0);
        let c = TeaCatalog::builtin().with_overrides(&o);
        assert_eq!(c.profile_for(1).unwrap().default_duration_secs, 150);
        assert_eq!(c.profile_for(0).unwrap().default_duration_secs, 240);
    }

    #[test]
    fn zero_override_hides_tea() {
        let mut o = BTreeMap::new();
        o.insert("black".to_string(), 0);
        let c = TeaCatalog::builtin().with_overrides(&o);
        assert!(c.profile_for(0).unwrap().hidden);
        assert!(!c.is_visible(0));
        assert_eq!(c.visible().count(), 8);
        assert_eq!(c.visible().next().map(|(i, _)| i), Some(1));
        assert!(matches!(c.index_of("black"), Err(ValidationError::UnknownTea(_))));
    }

    #[test]
    fn hiding_everything_keeps_green() {
        let o: BTreeMap<String, u16> = TeaCatalog::builtin()
            .profiles()
            .iter()
            .map(|p| (p.persist_key.clone(), 0))
            .collect();
        let c = TeaCatalog::builtin().with_overrides(&o);
        let visible: Vec<usize> = c.visible().map(|(i, _)| i).collect();
        assert_eq!(visible, vec![1]);
        assert_eq!(c.profile_for(1).unwrap().default_duration_secs, 120);
    }

    #[test]
    fn temperature_units() {
        assert_eq!(TempUnit::Celsius.convert(96), 96);
        assert_eq!(TempUnit::Fahrenheit.convert(80), 176);
        assert_eq!(TempUnit::Kelvin.convert(85), 358);
        assert_eq!(TempUnit::Rankine.convert(75), 626);
        assert_eq!(TempUnit::Fahrenheit.symbol(), "°F");
    }
}
