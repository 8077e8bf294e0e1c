//! WebDriver session that drives the San Jose 311 collection-schedule portal.

use std::fmt::Display;
use std::time::Duration;

use fantoccini::key::Key;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Map, Value, json};
use tokio::time::sleep;
use tracing::debug;

use crate::{ScrapeError, ScraperConfig, Stage};

const PORTAL_URL: &str = "https://311.sanjoseca.gov/?osvcProductName=My%20Collection%20Schedule&page=shell&shell=home&home=home-collectionschedule_opa";
const ADDRESS_INPUT: &str = r#"input[role="combobox"]"#;
const SEARCH_CONTROL: &str =
    "(//*[self::button or self::a or @role='button'][contains(normalize-space(.), 'Search')])[1]";
const RESULTS_ROW: &str = "table tbody tr";

const INPUT_WAIT: Duration = Duration::from_secs(30);
const RESULTS_WAIT: Duration = Duration::from_secs(15);
const INPUT_SETTLE: Duration = Duration::from_millis(1500);
const CLICK_SETTLE: Duration = Duration::from_millis(300);
const SUGGESTIONS_SETTLE: Duration = Duration::from_millis(1500);
const SELECTION_SETTLE: Duration = Duration::from_millis(800);
const RESULTS_SETTLE: Duration = Duration::from_secs(2);

/// Open a fresh browser session with desktop-like identity headers.
pub(crate) async fn open(config: &ScraperConfig) -> Result<Client, ScrapeError> {
    let mut args = vec![
        format!("--user-agent={}", config.user_agent),
        "--window-size=1920,1080".to_owned(),
        "--disable-blink-features=AutomationControlled".to_owned(),
        "--disable-features=IsolateOrigins,site-per-process".to_owned(),
    ];
    if config.headless {
        args.push("--headless=new".to_owned());
    }

    let mut capabilities = Map::new();
    capabilities.insert(
        "goog:chromeOptions".to_owned(),
        json!({
            "args": args,
            "excludeSwitches": ["enable-automation"],
        }),
    );
    capabilities.insert("pageLoadStrategy".to_owned(), Value::from("normal"));

    let mut builder = ClientBuilder::native();
    builder.capabilities(capabilities);
    builder
        .connect(&config.webdriver_url)
        .await
        .map_err(failed_at(Stage::Idle))
}

/// Submit `address` through the portal's search box and return the rendered results page.
///
/// `stage` is advanced as the flow progresses so a caller that times out can tell how
/// far it got.
pub(crate) async fn submit_and_render(
    client: &Client,
    address: &str,
    config: &ScraperConfig,
    stage: &mut Stage,
) -> Result<String, ScrapeError> {
    *stage = Stage::SessionOpen;
    client
        .goto(PORTAL_URL)
        .await
        .map_err(failed_at(Stage::SessionOpen))?;

    let input = client
        .wait()
        .at_most(INPUT_WAIT)
        .for_element(Locator::Css(ADDRESS_INPUT))
        .await
        .map_err(failed_at(Stage::SessionOpen))?;
    sleep(INPUT_SETTLE).await;
    input.click().await.map_err(failed_at(Stage::SessionOpen))?;
    sleep(CLICK_SETTLE).await;

    for ch in address.chars() {
        input
            .send_keys(&ch.to_string())
            .await
            .map_err(failed_at(Stage::SessionOpen))?;
        sleep(config.keystroke_delay).await;
    }
    sleep(SUGGESTIONS_SETTLE).await;

    // First suggestion wins; the portal offers no way to disambiguate.
    let arrow_down: char = Key::Down.into();
    input
        .send_keys(&arrow_down.to_string())
        .await
        .map_err(failed_at(Stage::SessionOpen))?;
    sleep(CLICK_SETTLE).await;
    let enter: char = Key::Enter.into();
    input
        .send_keys(&enter.to_string())
        .await
        .map_err(failed_at(Stage::SessionOpen))?;
    sleep(SELECTION_SETTLE).await;

    client
        .find(Locator::XPath(SEARCH_CONTROL))
        .await
        .map_err(failed_at(Stage::SessionOpen))?
        .click()
        .await
        .map_err(failed_at(Stage::SessionOpen))?;
    *stage = Stage::AddressSubmitted;
    debug!(stage = %stage, "address submitted");

    client
        .wait()
        .at_most(RESULTS_WAIT)
        .for_element(Locator::Css(RESULTS_ROW))
        .await
        .map_err(failed_at(Stage::AddressSubmitted))?;
    sleep(RESULTS_SETTLE).await;
    *stage = Stage::ResultsRendered;
    debug!(stage = %stage, "results calendar rendered");

    client
        .source()
        .await
        .map_err(failed_at(Stage::ResultsRendered))
}

fn failed_at<E: Display>(stage: Stage) -> impl FnOnce(E) -> ScrapeError {
    move |err| ScrapeError::Step {
        stage,
        reason: err.to_string(),
    }
}
