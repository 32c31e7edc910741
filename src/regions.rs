//! Built-in region catalog (US states, Geofabrik naming).

use std::time::Duration;

use crate::models::{Region, RetryPolicy};

/// Every US state, in alphabetical order.
pub const ALL_STATES: &[&str] = &[
    "alabama",
    "alaska",
    "arizona",
    "arkansas",
    "california",
    "colorado",
    "connecticut",
    "delaware",
    "florida",
    "georgia",
    "hawaii",
    "idaho",
    "illinois",
    "indiana",
    "iowa",
    "kansas",
    "kentucky",
    "louisiana",
    "maine",
    "maryland",
    "massachusetts",
    "michigan",
    "minnesota",
    "mississippi",
    "missouri",
    "montana",
    "nebraska",
    "nevada",
    "new-hampshire",
    "new-jersey",
    "new-mexico",
    "new-york",
    "north-carolina",
    "north-dakota",
    "ohio",
    "oklahoma",
    "oregon",
    "pennsylvania",
    "rhode-island",
    "south-carolina",
    "south-dakota",
    "tennessee",
    "texas",
    "utah",
    "vermont",
    "virginia",
    "washington",
    "west-virginia",
    "wisconsin",
    "wyoming",
];

/// States whose downloads tend to need several attempts.
pub const SELECTED_STATES: &[&str] = &[
    "delaware",
    "colorado",
    "california",
    "arkansas",
    "alaska",
    "georgia",
    "indiana",
    "louisiana",
    "massachusetts",
    "minnesota",
    "montana",
    "wyoming",
    "washington",
    "vermont",
    "texas",
];

/// Named group of regions processed together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum RegionSet {
    /// All US states
    #[default]
    All,
    /// States that are large or failed to download before
    Selected,
}

impl RegionSet {
    pub fn codes(self) -> &'static [&'static str] {
        match self {
            RegionSet::All => ALL_STATES,
            RegionSet::Selected => SELECTED_STATES,
        }
    }

    pub fn regions(self) -> Vec<Region> {
        self.codes().iter().map(|code| Region::new(*code, *code)).collect()
    }

    /// Retry policy used for this set unless configured otherwise.
    pub fn retry_policy(self) -> RetryPolicy {
        match self {
            RegionSet::All => RetryPolicy::standard(),
            RegionSet::Selected => RetryPolicy::patient(),
        }
    }

    /// Pause between processed regions unless configured otherwise.
    pub fn pacing(self) -> Duration {
        match self {
            RegionSet::All => Duration::from_secs(1),
            RegionSet::Selected => Duration::from_secs(2),
        }
    }
}

/// Look up a built-in region by code.
pub fn find(code: &str) -> Option<Region> {
    ALL_STATES
        .iter()
        .find(|c| c.eq_ignore_ascii_case(code))
        .map(|c| Region::new(*c, *c))
}

/// Turn region codes from the command line into work items.
///
/// Unknown codes are accepted as-is so other Geofabrik extracts can be used
/// with a matching base URL.
pub fn resolve(codes: &[String]) -> Vec<Region> {
    codes
        .iter()
        .map(|code| {
            find(code).unwrap_or_else(|| {
                tracing::debug!("'{}' is not a built-in region, using it verbatim", code);
                Region::new(code.as_str(), code.as_str())
            })
        })
        .collect()
}
