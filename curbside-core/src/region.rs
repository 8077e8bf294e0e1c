//! ZIP code to region resolution.

use std::sync::Arc;

use tracing::debug;

use crate::model::RegionInfo;
use crate::ports::PostalLookup;

/// Resolves ZIP codes to `(city, state)` through a [`PostalLookup`].
#[derive(Clone)]
pub struct RegionResolver {
    lookup: Arc<dyn PostalLookup>,
}

impl RegionResolver {
    /// Create a resolver over the given lookup.
    #[must_use]
    pub fn new(lookup: Arc<dyn PostalLookup>) -> Self {
        Self { lookup }
    }

    /// Resolve a ZIP code. Malformed or unknown codes yield `None`.
    #[must_use]
    pub fn resolve(&self, zip_code: &str) -> Option<RegionInfo> {
        let zip = zip_code.trim();
        if !is_valid_zip(zip) {
            return None;
        }

        let record = self.lookup.query(zip)?;
        if record.is_empty() {
            debug!(zip, "postal lookup returned an empty record");
            return None;
        }

        let state_code = record
            .state_code
            .map(|code| code.trim().to_uppercase())
            .filter(|code| !code.is_empty())?;
        let city = record
            .city
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty());

        Some(RegionInfo {
            zip_code: zip.to_owned(),
            state_code,
            city,
        })
    }
}

/// Whether `zip_code`, after trimming, is exactly five ASCII digits.
#[must_use]
pub fn is_valid_zip(zip_code: &str) -> bool {
    let zip = zip_code.trim();
    zip.len() == 5 && zip.bytes().all(|byte| byte.is_ascii_digit())
}
