//! High-level service facade combining region resolution, the schedule cache, and providers.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::model::{CityMeta, CollectionEvent, NewSchedule, RegionInfo, RulesReport, Schedule};
use crate::plugin::PluginRegistry;
use crate::ports::{PortError, ScheduleStore};
use crate::region::{RegionResolver, is_valid_zip};
use crate::rules::{BaselineStore, extract_rules_for_zip};

/// Shortest address the service will look up.
pub const MIN_ADDRESS_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
/// A schedule resolved for an address.
pub struct ScheduleResponse {
    /// Address as supplied.
    pub address: String,
    /// Events or a reference link.
    pub schedule: Schedule,
    /// City resolved from the ZIP code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// State resolved from the ZIP code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
/// Reply when a supported city produced no schedule for the address.
pub struct NoSchedule {
    /// Address as supplied.
    pub address: String,
    /// Always empty; kept so clients can read `schedule` uniformly.
    pub schedule: Vec<CollectionEvent>,
    /// Guidance for the user.
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
/// Outcome of a schedule lookup for a supported city.
pub enum ScheduleOutcome {
    /// A schedule was found in the cache or fetched from a provider.
    Found(ScheduleResponse),
    /// The provider returned nothing.
    NotFound(NoSchedule),
}

/// Public entry point for schedules and rule baselines.
pub struct CurbsideService {
    registry: Arc<PluginRegistry>,
    regions: RegionResolver,
    store: Arc<dyn ScheduleStore>,
    baselines: Arc<BaselineStore>,
}

impl CurbsideService {
    /// Create a new service from explicitly constructed collaborators.
    #[must_use]
    pub fn new(
        registry: Arc<PluginRegistry>,
        regions: RegionResolver,
        store: Arc<dyn ScheduleStore>,
        baselines: Arc<BaselineStore>,
    ) -> Self {
        Self {
            registry,
            regions,
            store,
            baselines,
        }
    }

    /// List all cities with a registered provider.
    #[must_use]
    pub fn cities(&self) -> Vec<CityMeta> {
        self.registry.cities()
    }

    /// Resolve the recycling rules that apply to a ZIP code.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when an existing baseline file cannot be read.
    pub fn rules_for(&self, zip_code: &str) -> Result<RulesReport, PortError> {
        extract_rules_for_zip(&self.regions, &self.baselines, zip_code)
    }

    /// Look up the collection schedule for an address.
    ///
    /// The cache is consulted first with the address and ZIP exactly as given; on a miss
    /// the provider for the ZIP's city is asked and a non-empty result is cached.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::InvalidAddress`] or [`PortError::InvalidZip`] for bad input,
    /// [`PortError::UnsupportedCity`] when no provider serves the city, and
    /// [`PortError::Storage`] when the cache write fails.
    pub async fn schedule_for(
        &self,
        address: &str,
        zip_code: Option<&str>,
    ) -> Result<ScheduleOutcome, PortError> {
        if address.trim().chars().count() < MIN_ADDRESS_LEN {
            return Err(PortError::InvalidAddress);
        }
        if let Some(zip) = zip_code
            && !is_valid_zip(zip)
        {
            return Err(PortError::InvalidZip);
        }

        let region: Option<RegionInfo> = zip_code.and_then(|zip| self.regions.resolve(zip));
        let city = region.as_ref().and_then(|info| info.city.clone());
        let state = region.as_ref().map(|info| info.state_code.clone());
        debug!(address, ?zip_code, ?city, ?state, "resolving schedule");

        let cached = match self.store.find(address, zip_code).await {
            Ok(found) => found,
            Err(err) => {
                warn!(%err, "schedule cache lookup failed, treating as miss");
                None
            }
        };

        if let Some(record) = &cached
            && !record.schedule.is_empty()
        {
            debug!(id = record.id, "schedule cache hit");
            return Ok(ScheduleOutcome::Found(ScheduleResponse {
                address: address.to_owned(),
                schedule: record.schedule.clone(),
                city: city.or_else(|| record.city.clone()),
                state: state.or_else(|| record.state.clone()),
            }));
        }

        let fetched = match self.registry.dispatch(city.as_deref(), address).await {
            Ok(schedule) => schedule,
            Err(PortError::UnsupportedCity) => return Err(PortError::UnsupportedCity),
            Err(err) => {
                warn!(%err, "schedule provider failed");
                None
            }
        };

        let Some(schedule) = fetched.filter(|schedule| !schedule.is_empty()) else {
            return Ok(ScheduleOutcome::NotFound(NoSchedule {
                address: address.to_owned(),
                schedule: Vec::new(),
                message: not_found_message(city.as_deref(), state.as_deref()),
            }));
        };

        if cached.is_none() {
            let record = self
                .store
                .insert(NewSchedule {
                    address: address.to_owned(),
                    city: city.clone(),
                    state: state.clone(),
                    zip_code: zip_code.map(str::to_owned),
                    schedule: schedule.clone(),
                })
                .await?;
            info!(id = record.id, "cached resolved schedule");
        }

        Ok(ScheduleOutcome::Found(ScheduleResponse {
            address: address.to_owned(),
            schedule,
            city,
            state,
        }))
    }
}

fn not_found_message(city: Option<&str>, state: Option<&str>) -> String {
    let place = match (city, state) {
        (Some(city), Some(state)) => format!(" and in {city}, {state}"),
        (Some(city), None) => format!(" and in {city}"),
        _ => String::new(),
    };
    format!(
        "No collection schedule found for this address. Please verify the address is correct{place}."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_the_city_when_known() {
        assert_eq!(
            not_found_message(Some("San Jose"), Some("CA")),
            "No collection schedule found for this address. Please verify the address is correct and in San Jose, CA."
        );
        assert_eq!(
            not_found_message(None, None),
            "No collection schedule found for this address. Please verify the address is correct."
        );
    }
}
