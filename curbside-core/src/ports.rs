//! Traits describing the collaborators the core talks to, plus the shared error type.

use std::io::Error as IoError;

use async_trait::async_trait;
use reqwest::Error as ReqwestError;
use serde::Serialize;
use serde_json::Error as JsonError;

use crate::model::{CityMeta, NewSchedule, Schedule, ScheduleRecord};

#[derive(thiserror::Error, Debug)]
/// Errors raised by ports, adapters, and the service layer.
pub enum PortError {
    /// Network layer failed.
    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
    /// Reading local data failed.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
    /// A JSON document could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] JsonError),
    /// Address is missing or too short to search for.
    #[error("Address is required (at least 5 characters), e.g. 200 E Santa Clara St")]
    InvalidAddress,
    /// ZIP code is not five digits.
    #[error("ZIP code must be exactly 5 digits")]
    InvalidZip,
    /// Other malformed caller input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// No provider is registered for the resolved city.
    #[error("No available collection schedule found for this city")]
    UnsupportedCity,
    /// No rule baseline file exists for the state code.
    #[error("No rule baseline for state {0}")]
    BaselineNotFound(String),
    /// Schedule store failed.
    #[error("Storage error: {0}")]
    Storage(String),
    /// Remote service asked us to slow down.
    #[error("Rate limited by remote service")]
    RateLimited,
    /// Retries were exhausted.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    /// There is no schedule to act on.
    #[error("No schedule found")]
    NoSchedule,
    /// Internal adapter error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PortError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, PortError::RateLimited)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Raw record returned by a postal lookup.
pub struct PostalRecord {
    /// Two-letter state code.
    pub state_code: Option<String>,
    /// Place name.
    pub city: Option<String>,
}

impl PostalRecord {
    /// A record with no usable fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let blank = |field: &Option<String>| field.as_deref().is_none_or(|value| value.trim().is_empty());
        blank(&self.state_code) && blank(&self.city)
    }
}

/// Postal-code-to-place lookup.
pub trait PostalLookup: Send + Sync {
    /// Look up a five digit ZIP code.
    fn query(&self, zip_code: &str) -> Option<PostalRecord>;
}

#[async_trait]
/// Persistence boundary for resolved schedules keyed by `(address, zip_code)`.
pub trait ScheduleStore: Send + Sync {
    /// Exact-match lookup. `None` ZIP matches rows stored without a ZIP.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Storage`] when the backend fails.
    async fn find(
        &self,
        address: &str,
        zip_code: Option<&str>,
    ) -> Result<Option<ScheduleRecord>, PortError>;

    /// Append a new row without checking for an existing key.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Storage`] when the backend fails.
    async fn insert(&self, schedule: NewSchedule) -> Result<ScheduleRecord, PortError>;
}

#[async_trait]
/// Per-city strategy for obtaining a collection schedule.
pub trait ScheduleProvider: Send + Sync {
    /// Metadata describing the city handled by this provider.
    fn city(&self) -> &CityMeta;

    /// Fetch the schedule for an address. `Ok(None)` means nothing was found.
    ///
    /// # Errors
    ///
    /// Returns a [`PortError`] when the provider fails in a way it chooses to report.
    async fn fetch(&self, address: &str) -> Result<Option<Schedule>, PortError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Email ready for delivery.
pub struct OutgoingMail {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Confirmation returned by a mail transport.
pub struct MailReceipt {
    /// Opaque id assigned by the transport.
    pub id: Option<String>,
}

#[async_trait]
/// Transactional email delivery.
pub trait MailTransport: Send + Sync {
    /// Hand a message to the delivery service.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::RateLimited`] for retryable rejections, other variants otherwise.
    async fn send(&self, mail: &OutgoingMail) -> Result<MailReceipt, PortError>;
}
