//! Statewide recycling rule baselines and their resolution by ZIP code.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Map, Value};
use tracing::debug;

use crate::model::{MatchLevel, RegionSummary, RuleBaseline, RulesReport};
use crate::ports::PortError;
use crate::region::RegionResolver;

/// Lazily loaded, process-wide cache of `<STATE>.json` baselines.
pub struct BaselineStore {
    dir: PathBuf,
    loaded: RwLock<HashMap<String, Arc<RuleBaseline>>>,
}

impl BaselineStore {
    /// Create a store reading from `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            loaded: RwLock::new(HashMap::new()),
        }
    }

    /// Load the baseline for a two-letter state code, reading disk at most once per code.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::BaselineNotFound`] for unknown or malformed codes,
    /// [`PortError::Json`] for undecodable files, and [`PortError::Io`] otherwise.
    pub fn load_baseline(&self, state_code: &str) -> Result<Arc<RuleBaseline>, PortError> {
        let code = state_code.trim().to_uppercase();
        if code.len() != 2 || !code.bytes().all(|byte| byte.is_ascii_uppercase()) {
            return Err(PortError::BaselineNotFound(code));
        }

        if let Some(baseline) = self
            .loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&code)
        {
            return Ok(Arc::clone(baseline));
        }

        let path = self.dir.join(format!("{code}.json"));
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(PortError::BaselineNotFound(code));
            }
            Err(err) => return Err(PortError::Io(err)),
        };
        let parsed: RuleBaseline = serde_json::from_str(&contents)?;
        debug!(state = %code, path = %path.display(), "loaded rule baseline");

        let mut loaded = self
            .loaded
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let baseline = loaded.entry(code).or_insert_with(|| Arc::new(parsed));
        Ok(Arc::clone(baseline))
    }
}

/// Merge `src` into `dest`, one level deep.
///
/// When both sides hold an object under the same key, the entries of `src` are copied
/// into the object in `dest`; any other value in `src` replaces the one in `dest`.
pub fn merge_rules(dest: &mut Map<String, Value>, src: &Map<String, Value>) {
    for (key, value) in src {
        match (dest.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                for (inner_key, inner_value) in incoming {
                    existing.insert(inner_key.clone(), inner_value.clone());
                }
            }
            _ => {
                dest.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Resolve the rules that apply to a ZIP code.
///
/// # Errors
///
/// Returns a [`PortError`] when a baseline file exists but cannot be read or decoded.
/// Unknown ZIP codes and states without a baseline are reported in the summary instead.
pub fn extract_rules_for_zip(
    resolver: &RegionResolver,
    baselines: &BaselineStore,
    zip_code: &str,
) -> Result<RulesReport, PortError> {
    let Some(region) = resolver.resolve(zip_code) else {
        return Ok(RulesReport {
            zip: zip_code.to_owned(),
            match_level: None,
            match_name: None,
            region: None,
            summary: Some("Invalid or unknown ZIP.".to_owned()),
            rules: None,
        });
    };

    let mut merged = Map::new();
    let mut summary_parts = Vec::new();
    let mut match_level = None;
    let mut match_name = None;

    match baselines.load_baseline(&region.state_code) {
        Ok(baseline) => {
            if !baseline.rules.is_empty() {
                merge_rules(&mut merged, &baseline.rules);
                let label = baseline.state.as_deref().unwrap_or(&region.state_code);
                summary_parts.push(format!("Applied {label} statewide baseline."));
                match_level = Some(MatchLevel::State);
                match_name = Some(region.state_code.clone());
            }
        }
        Err(PortError::BaselineNotFound(code)) => {
            summary_parts.push(format!("No baseline rules for state {code}."));
        }
        Err(err) => return Err(err),
    }

    Ok(RulesReport {
        zip: region.zip_code,
        match_level,
        match_name,
        region: Some(RegionSummary {
            state: region.state_code,
            city: region.city,
        }),
        summary: (!summary_parts.is_empty()).then(|| summary_parts.join(" ")),
        rules: (!merged.is_empty()).then_some(merged),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::ports::{PostalLookup, PostalRecord};

    struct Table(HashMap<&'static str, (&'static str, &'static str)>);

    impl PostalLookup for Table {
        fn query(&self, zip_code: &str) -> Option<PostalRecord> {
            self.0.get(zip_code).map(|(state, city)| PostalRecord {
                state_code: Some((*state).to_owned()),
                city: Some((*city).to_owned()),
            })
        }
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn write(dir: &TempDir, name: &str, contents: &str) {
        fs::write(dir.path().join(name), contents).expect("write baseline");
    }

    #[test]
    fn merge_unions_nested_objects_one_level() {
        let mut dest = object(json!({
            "recycling": {"glass": "curbside", "film": "no"},
            "organics": "green bin",
        }));
        let src = object(json!({
            "recycling": {"film": "store drop-off", "cartons": "yes"},
            "organics": {"food": "yes"},
            "hazardous": "depot",
        }));
        merge_rules(&mut dest, &src);

        assert_eq!(
            Value::Object(dest),
            json!({
                "recycling": {"glass": "curbside", "film": "store drop-off", "cartons": "yes"},
                "organics": {"food": "yes"},
                "hazardous": "depot",
            })
        );
    }

    #[test]
    fn merge_replaces_nested_values_below_first_level() {
        let mut dest = object(json!({"a": {"b": {"c": 1, "d": 2}}}));
        let src = object(json!({"a": {"b": {"c": 3}}}));
        merge_rules(&mut dest, &src);
        assert_eq!(Value::Object(dest), json!({"a": {"b": {"c": 3}}}));
    }

    #[test]
    fn merging_twice_equals_merging_once() {
        let base = object(json!({"x": {"keep": true}, "y": [1, 2]}));
        let src = object(json!({"x": {"add": 1}, "y": "replaced", "z": {"n": null}}));

        let mut once = base.clone();
        merge_rules(&mut once, &src);
        let mut twice = base;
        merge_rules(&mut twice, &src);
        merge_rules(&mut twice, &src);

        assert_eq!(once, twice);
    }

    #[test]
    fn baselines_are_cached_after_first_load() {
        let dir = TempDir::new().expect("temp dir");
        write(&dir, "OR.json", r#"{"state": "Oregon", "rules": {"deposit": "10c"}}"#);
        let store = BaselineStore::new(dir.path());

        let first = store.load_baseline("or").expect("first load");
        fs::remove_file(dir.path().join("OR.json")).expect("remove file");
        let second = store.load_baseline("OR").expect("cached load");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.state.as_deref(), Some("Oregon"));
    }

    #[test]
    fn missing_or_malformed_codes_are_not_found() {
        let dir = TempDir::new().expect("temp dir");
        let store = BaselineStore::new(dir.path());
        assert!(matches!(store.load_baseline("WA"), Err(PortError::BaselineNotFound(code)) if code == "WA"));
        assert!(matches!(store.load_baseline("../CA"), Err(PortError::BaselineNotFound(_))));
        assert!(matches!(store.load_baseline("C1"), Err(PortError::BaselineNotFound(_))));
    }

    #[test]
    fn malformed_json_is_reported_and_not_cached() {
        let dir = TempDir::new().expect("temp dir");
        write(&dir, "NV.json", "{ not json");
        let store = BaselineStore::new(dir.path());
        assert!(matches!(store.load_baseline("NV"), Err(PortError::Json(_))));

        write(&dir, "NV.json", r#"{"rules": {"ok": 1}}"#);
        assert!(store.load_baseline("NV").is_ok());
    }

    fn fixture() -> (TempDir, RegionResolver, BaselineStore) {
        let dir = TempDir::new().expect("temp dir");
        write(
            &dir,
            "CA.json",
            r#"{"state": "California", "rules": {"organics": {"food_scraps": "green cart"}, "bottle_bill": true}}"#,
        );
        write(&dir, "TX.json", r#"{"rules": {}}"#);
        let mut rows = HashMap::new();
        rows.insert("95113", ("CA", "San Jose"));
        rows.insert("73301", ("TX", "Austin"));
        rows.insert("10001", ("NY", "New York"));
        let resolver = RegionResolver::new(Arc::new(Table(rows)));
        let store = BaselineStore::new(dir.path());
        (dir, resolver, store)
    }

    #[test]
    fn state_baseline_applies_to_known_zip() {
        let (_dir, resolver, store) = fixture();
        let report = extract_rules_for_zip(&resolver, &store, "95113").expect("report");

        assert_eq!(report.zip, "95113");
        assert_eq!(report.match_level, Some(MatchLevel::State));
        assert_eq!(report.match_name.as_deref(), Some("CA"));
        assert_eq!(
            report.summary.as_deref(),
            Some("Applied California statewide baseline.")
        );
        let rules = report.rules.expect("rules present");
        assert!(rules.contains_key("organics"));
        assert!(rules.contains_key("bottle_bill"));
        let region = report.region.expect("region");
        assert_eq!(region.city.as_deref(), Some("San Jose"));
    }

    #[test]
    fn state_without_baseline_is_summarized() {
        let (_dir, resolver, store) = fixture();
        let report = extract_rules_for_zip(&resolver, &store, "10001").expect("report");
        assert_eq!(report.match_level, None);
        assert_eq!(report.rules, None);
        assert_eq!(report.summary.as_deref(), Some("No baseline rules for state NY."));
        assert!(report.region.is_some());
    }

    #[test]
    fn empty_baseline_rules_do_not_match() {
        let (_dir, resolver, store) = fixture();
        let report = extract_rules_for_zip(&resolver, &store, "73301").expect("report");
        assert_eq!(report.match_level, None);
        assert_eq!(report.summary, None);
        assert_eq!(report.rules, None);
    }

    #[test]
    fn unknown_zip_yields_null_rules() {
        let (_dir, resolver, store) = fixture();
        for zip in ["00000", "abc"] {
            let report = extract_rules_for_zip(&resolver, &store, zip).expect("report");
            assert_eq!(report.zip, zip);
            assert_eq!(report.rules, None);
            assert_eq!(report.region, None);
            assert_eq!(report.summary.as_deref(), Some("Invalid or unknown ZIP."));
        }
    }
}
