//! Registry for all city plugins and the city-name normalization used to find them.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::model::{CityId, CityMeta, Schedule};
use crate::ports::{PortError, ScheduleProvider};

/// Provider bundle for a single city.
pub struct CityPlugin {
    /// Static metadata describing the city.
    pub meta: CityMeta,
    /// Strategy that produces the schedule.
    pub provider: Arc<dyn ScheduleProvider>,
}

impl CityPlugin {
    /// Bundle a provider with its own metadata.
    #[must_use]
    pub fn new(provider: Arc<dyn ScheduleProvider>) -> Self {
        Self {
            meta: provider.city().clone(),
            provider,
        }
    }
}

/// Registry that resolves plugins by normalized city name or by id.
pub struct PluginRegistry {
    plugins: HashMap<String, CityPlugin>,
}

impl PluginRegistry {
    /// Build a registry from the provided plugin list. Later plugins replace earlier ones
    /// whose city names normalize to the same key.
    #[must_use]
    pub fn new(plugins: Vec<CityPlugin>) -> Self {
        let plugins_map = plugins
            .into_iter()
            .map(|plugin| (city_key(&plugin.meta.name), plugin))
            .collect();
        Self {
            plugins: plugins_map,
        }
    }

    /// Return metadata for all registered cities, sorted by name.
    #[must_use]
    pub fn cities(&self) -> Vec<CityMeta> {
        let mut cities: Vec<CityMeta> = self
            .plugins
            .values()
            .map(|plugin| plugin.meta.clone())
            .collect();
        cities.sort_by(|left, right| left.name.cmp(&right.name));
        cities
    }

    /// Look up a plugin by a city name as reported by a postal lookup.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::UnsupportedCity`] when no plugin is registered.
    pub fn plugin_for_name(&self, city: &str) -> Result<&CityPlugin, PortError> {
        self.plugins
            .get(&city_key(city))
            .ok_or(PortError::UnsupportedCity)
    }

    /// Look up a plugin by its id.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::UnsupportedCity`] when no plugin is registered.
    pub fn plugin(&self, city: &CityId) -> Result<&CityPlugin, PortError> {
        self.plugins
            .values()
            .find(|plugin| &plugin.meta.id == city)
            .ok_or(PortError::UnsupportedCity)
    }

    /// Route an address to the provider registered for `city`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::UnsupportedCity`] when `city` is absent or unknown, and
    /// whatever the provider reports otherwise.
    pub async fn dispatch(
        &self,
        city: Option<&str>,
        address: &str,
    ) -> Result<Option<Schedule>, PortError> {
        let Some(name) = city else {
            debug!("no city resolved, rejecting dispatch");
            return Err(PortError::UnsupportedCity);
        };
        let plugin = self.plugin_for_name(name)?;
        info!(city = %plugin.meta.id, "dispatching schedule lookup");
        plugin.provider.fetch(address).await
    }
}

/// Normalize a city name into a registry key.
///
/// Repairs UTF-8 text that was decoded as Latin-1, strips diacritics, lowercases,
/// and collapses whitespace, so `San JosÃ©`, `San José`, and `SAN JOSE` agree.
#[must_use]
pub fn city_key(name: &str) -> String {
    let repaired = repair_mojibake(name);
    let folded: String = repaired
        .nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .collect::<String>()
        .to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn repair_mojibake(name: &str) -> String {
    let looks_latin1 = name.chars().all(|ch| u32::from(ch) <= 0xFF)
        && name.chars().any(|ch| u32::from(ch) >= 0x80);
    if !looks_latin1 {
        return name.to_owned();
    }
    let bytes: Vec<u8> = name
        .chars()
        .filter_map(|ch| u8::try_from(u32::from(ch)).ok())
        .collect();
    String::from_utf8(bytes).unwrap_or_else(|_err| name.to_owned())
}
