//! Providers for Recology service areas.
//!
//! Recology publishes its calendars as static pages per service area, so these
//! providers answer every address in the city with the same link.

use std::sync::Arc;

use async_trait::async_trait;

use curbside_core::{
    model::{CityId, CityMeta, Schedule},
    plugin::CityPlugin,
    ports::{PortError, ScheduleProvider},
};

const SANTA_CLARA_URL: &str =
    "https://www.recology.com/recology-south-bay/santa-clara-county-residential/collection-calendar/";
const CUPERTINO_URL: &str = "https://www.recology.com/recology-south-bay/cupertino/collection-calendar/";
const SAN_FRANCISCO_URL: &str = "https://www.recology.com/recology-san-francisco/collection-calendar/";

/// Provider that points every address at a fixed calendar page.
pub struct ReferenceLinkProvider {
    meta: CityMeta,
    url: String,
}

impl ReferenceLinkProvider {
    /// Create a provider for `meta` that always answers with `url`.
    #[must_use]
    pub fn new(meta: CityMeta, url: impl Into<String>) -> Self {
        Self {
            meta,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ScheduleProvider for ReferenceLinkProvider {
    fn city(&self) -> &CityMeta {
        &self.meta
    }

    async fn fetch(&self, _address: &str) -> Result<Option<Schedule>, PortError> {
        Ok(Some(Schedule::ReferenceLink(self.url.clone())))
    }
}

/// Santa Clara, served from the Recology South Bay county page.
#[must_use]
pub fn santa_clara() -> CityPlugin {
    link_plugin("santa-clara", "Santa Clara", SANTA_CLARA_URL)
}

/// Cupertino.
#[must_use]
pub fn cupertino() -> CityPlugin {
    link_plugin("cupertino", "Cupertino", CUPERTINO_URL)
}

/// San Francisco.
#[must_use]
pub fn san_francisco() -> CityPlugin {
    link_plugin("san-francisco", "San Francisco", SAN_FRANCISCO_URL)
}

/// Every Recology city this crate knows about.
#[must_use]
pub fn plugins() -> Vec<CityPlugin> {
    vec![santa_clara(), cupertino(), san_francisco()]
}

fn link_plugin(slug: &str, name: &str, url: &str) -> CityPlugin {
    let meta = CityMeta {
        id: CityId(slug.to_owned()),
        name: name.to_owned(),
        state: String::from("CA"),
    };
    CityPlugin::new(Arc::new(ReferenceLinkProvider::new(meta, url)))
}
