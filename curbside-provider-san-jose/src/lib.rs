//! Provider implementation for San Jose, scraping the city's 311 collection calendar.
//!
//! The portal has no API. A WebDriver session types the address into the search box,
//! picks the first suggestion, and reads the month calendar that comes back. Every
//! failure is logged and reported as "no schedule".

/// Calendar parsing and waste stream classification.
pub mod calendar;
mod session;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use curbside_core::{
    model::{CityId, CityMeta, CollectionEvent, Schedule},
    plugin::CityPlugin,
    ports::{PortError, ScheduleProvider},
};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const MIN_ADDRESS_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Progress of one scrape.
pub enum Stage {
    /// No browser session yet.
    Idle,
    /// Browser session open, portal loading.
    SessionOpen,
    /// Address chosen and search triggered.
    AddressSubmitted,
    /// Results calendar visible.
    ResultsRendered,
    /// Events read from the calendar.
    Extracted,
    /// Browser session released.
    Closed,
}

impl fmt::Display for Stage {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::SessionOpen => "session-open",
            Stage::AddressSubmitted => "address-submitted",
            Stage::ResultsRendered => "results-rendered",
            Stage::Extracted => "extracted",
            Stage::Closed => "closed",
        };
        write!(formatter, "{name}")
    }
}

#[derive(thiserror::Error, Debug)]
/// Why a scrape produced nothing.
pub enum ScrapeError {
    /// A browser step failed.
    #[error("scrape failed at {stage}: {reason}")]
    Step {
        /// Last stage reached.
        stage: Stage,
        /// Underlying WebDriver error.
        reason: String,
    },
    /// The whole flow ran past its deadline.
    #[error("scrape timed out at {0}")]
    Timeout(Stage),
    /// A built-in CSS selector failed to parse.
    #[error("invalid selector {selector}: {reason}")]
    Selector {
        /// Offending selector.
        selector: &'static str,
        /// Parser message.
        reason: String,
    },
}

#[derive(Debug, Clone)]
/// Browser settings for the scraper.
pub struct ScraperConfig {
    /// WebDriver endpoint, e.g. a local chromedriver.
    pub webdriver_url: String,
    /// Run Chrome without a window.
    pub headless: bool,
    /// User agent presented to the portal.
    pub user_agent: String,
    /// Deadline for the whole scrape, connecting to WebDriver included.
    pub overall_timeout: Duration,
    /// Pause between typed characters.
    pub keystroke_delay: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:4444".to_owned(),
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            overall_timeout: Duration::from_secs(90),
            keystroke_delay: Duration::from_millis(80),
        }
    }
}

/// Scraper for the San Jose 311 "My Collection Schedule" page.
pub struct SanJoseScraper {
    config: ScraperConfig,
}

impl SanJoseScraper {
    /// Create a scraper with the given browser settings.
    #[must_use]
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }

    /// Scrape the current month's collection days for `address`.
    ///
    /// Returns `None` when the address is too short, the portal found nothing, or any
    /// step failed. The browser session is always closed before returning.
    pub async fn scrape_schedule(&self, address: &str) -> Option<Vec<CollectionEvent>> {
        let address = address.trim();
        if address.chars().count() < MIN_ADDRESS_LEN {
            return None;
        }

        match self.run(address).await {
            Ok(events) if events.is_empty() => {
                info!("portal returned no collection days");
                None
            }
            Ok(events) => {
                info!(count = events.len(), "scraped collection days");
                Some(events)
            }
            Err(err) => {
                warn!(%err, "san jose scrape failed");
                None
            }
        }
    }

    async fn run(&self, address: &str) -> Result<Vec<CollectionEvent>, ScrapeError> {
        let deadline = Instant::now() + self.config.overall_timeout;
        let client = timeout_at(deadline, session::open(&self.config))
            .await
            .map_err(|_elapsed| ScrapeError::Timeout(Stage::Idle))??;
        let mut stage = Stage::SessionOpen;
        debug!(%stage, "webdriver session opened");

        let rendered = timeout_at(
            deadline,
            session::submit_and_render(&client, address, &self.config, &mut stage),
        )
        .await
        .map_err(|_elapsed| ScrapeError::Timeout(stage));
        let extracted = extract_rendered(rendered, Local::now().date_naive());

        if let Err(err) = client.close().await {
            debug!(%err, "closing webdriver session failed");
        }
        debug!(stage = %Stage::Closed, "webdriver session released");
        extracted
    }
}

/// Read events out of the page the session rendered, or pass its failure through.
fn extract_rendered(
    rendered: Result<Result<String, ScrapeError>, ScrapeError>,
    today: NaiveDate,
) -> Result<Vec<CollectionEvent>, ScrapeError> {
    let html = rendered??;
    let events = calendar::extract_calendar(&html, today)?;
    debug!(stage = %Stage::Extracted, count = events.len(), "calendar extracted");
    Ok(events)
}

/// [`ScheduleProvider`] for San Jose backed by [`SanJoseScraper`].
pub struct SanJoseProvider {
    meta: CityMeta,
    scraper: SanJoseScraper,
}

impl SanJoseProvider {
    /// Create a provider with the given browser settings.
    #[must_use]
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            meta: city_meta(),
            scraper: SanJoseScraper::new(config),
        }
    }
}

#[async_trait]
impl ScheduleProvider for SanJoseProvider {
    fn city(&self) -> &CityMeta {
        &self.meta
    }

    async fn fetch(&self, address: &str) -> Result<Option<Schedule>, PortError> {
        Ok(self
            .scraper
            .scrape_schedule(address)
            .await
            .map(Schedule::Events))
    }
}

/// Build the plugin bundle for the San Jose provider.
#[must_use]
pub fn plugin(config: ScraperConfig) -> CityPlugin {
    CityPlugin::new(Arc::new(SanJoseProvider::new(config)))
}

fn city_meta() -> CityMeta {
    CityMeta {
        id: CityId(String::from("san-jose")),
        name: String::from("San Jose"),
        state: String::from("CA"),
    }
}
