//! Offline postal lookup backed by a `GeoNames` postal code dump.
//!
//! Each line is tab separated: country code, postal code, place name, admin name 1,
//! admin code 1 (the state code for US data), followed by columns we ignore.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::ports::{PortError, PostalLookup, PostalRecord};

/// In-memory postal table keyed by postal code.
#[derive(Debug, Default, Clone)]
pub struct GeoNamesTable {
    rows: HashMap<String, PostalRecord>,
}

impl GeoNamesTable {
    /// Load a table from a `GeoNames` text file.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Io`] when the file cannot be read.
    pub fn load(path: &Path) -> Result<Self, PortError> {
        let contents = fs::read_to_string(path)?;
        let table = Self::parse(&contents);
        info!(path = %path.display(), rows = table.len(), "loaded postal table");
        Ok(table)
    }

    /// Parse `GeoNames` text. Short lines are skipped; the first row for a code wins.
    #[must_use]
    pub fn parse(contents: &str) -> Self {
        let mut rows = HashMap::new();
        for line in contents.lines() {
            let mut columns = line.split('\t');
            let (Some(_country), Some(postal), Some(place), Some(_admin_name), Some(admin_code)) = (
                columns.next(),
                columns.next(),
                columns.next(),
                columns.next(),
                columns.next(),
            ) else {
                continue;
            };
            let postal = postal.trim();
            if postal.is_empty() {
                continue;
            }
            rows.entry(postal.to_owned()).or_insert_with(|| PostalRecord {
                state_code: non_blank(admin_code),
                city: non_blank(place),
            });
        }
        Self { rows }
    }

    /// Number of postal codes in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl PostalLookup for GeoNamesTable {
    fn query(&self, zip_code: &str) -> Option<PostalRecord> {
        self.rows.get(zip_code).cloned()
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "US\t95113\tSan Jose\tCalifornia\tCA\tSanta Clara\t085\t\t\t37.3337\t-121.8907\t4\n\
US\t95113\tDuplicate\tCalifornia\tCA\t\t\t\t\t0\t0\t1\n\
US\t10001\tNew York\tNew York\tNY\tNew York\t061\t\t\t40.7484\t-73.9967\t4\n\
garbage line\n\
US\t00601\t\tPuerto Rico\t\t\t\t\t\t0\t0\t1\n";

    #[test]
    fn parses_rows_and_keeps_first_duplicate() {
        let table = GeoNamesTable::parse(SAMPLE);
        assert_eq!(table.len(), 3);
        let record = table.query("95113").expect("san jose row");
        assert_eq!(record.city.as_deref(), Some("San Jose"));
        assert_eq!(record.state_code.as_deref(), Some("CA"));
    }

    #[test]
    fn blank_columns_become_none() {
        let table = GeoNamesTable::parse(SAMPLE);
        let record = table.query("00601").expect("row present");
        assert!(record.is_empty());
        assert!(table.query("99999").is_none());
    }

    #[test]
    fn load_reads_the_bundled_table() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../data/postal/US.txt");
        let table = GeoNamesTable::load(&path).expect("bundled table loads");
        assert!(!table.is_empty());
        assert!(table.query("95113").is_some());
    }

    #[test]
    fn bundled_table_covers_every_served_city() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../data/postal/US.txt");
        let table = GeoNamesTable::load(&path).expect("bundled table loads");
        for (zip, city) in [
            ("95110", "San Jose"),
            ("95116", "San Jose"),
            ("95126", "San Jose"),
            ("95148", "San Jose"),
            ("95054", "Santa Clara"),
            ("95015", "Cupertino"),
            ("94158", "San Francisco"),
            ("90210", "Beverly Hills"),
        ] {
            let record = table.query(zip).unwrap_or_else(|| panic!("{zip} missing"));
            assert_eq!(record.city.as_deref(), Some(city), "{zip}");
            assert_eq!(record.state_code.as_deref(), Some("CA"), "{zip}");
        }
    }
}
