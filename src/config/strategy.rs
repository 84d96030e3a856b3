//! Listing strategies ("combos")
//!
//! A strategy is a listing type plus, for `top` and `controversial`, a time window.
//! It is written as `name` or `name:window`, e.g. `new` or `top:month`.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Listing type offered by the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    New,
    Hot,
    Rising,
    Best,
    Top,
    Controversial,
}

/// Time window for windowed listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Hour,
    Day,
    Week,
    Month,
    Year,
    All,
}

impl ListingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Hot => "hot",
            Self::Rising => "rising",
            Self::Best => "best",
            Self::Top => "top",
            Self::Controversial => "controversial",
        }
    }

    /// Returns true if this listing accepts a time window
    pub fn is_windowed(&self) -> bool {
        matches!(self, Self::Top | Self::Controversial)
    }
}

impl FromStr for ListingKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "hot" => Ok(Self::Hot),
            "rising" => Ok(Self::Rising),
            "best" => Ok(Self::Best),
            "top" => Ok(Self::Top),
            "controversial" => Ok(Self::Controversial),
            _ => Err(ConfigError::InvalidCombo(s.to_string())),
        }
    }
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 6] = [
        Self::Hour,
        Self::Day,
        Self::Week,
        Self::Month,
        Self::Year,
        Self::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        }
    }
}

impl FromStr for TimeWindow {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "all" => Ok(Self::All),
            _ => Err(ConfigError::InvalidCombo(s.to_string())),
        }
    }
}

/// A listing strategy: listing type plus optional time window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Strategy {
    pub listing: ListingKind,
    pub window: Option<TimeWindow>,
}

impl Strategy {
    pub fn new(listing: ListingKind) -> Self {
        let window = listing.is_windowed().then_some(TimeWindow::All);
        Self { listing, window }
    }

    pub fn windowed(listing: ListingKind, window: TimeWindow) -> Self {
        Self {
            listing,
            window: Some(window),
        }
    }

    /// The full default sequence: unwindowed listings first, then every window
    /// for `top` and for `controversial`
    pub fn default_sequence() -> Vec<Strategy> {
        let mut combos = vec![
            Self::new(ListingKind::New),
            Self::new(ListingKind::Hot),
            Self::new(ListingKind::Rising),
            Self::new(ListingKind::Best),
        ];
        for listing in [ListingKind::Top, ListingKind::Controversial] {
            combos.extend(TimeWindow::ALL.iter().map(|w| Self::windowed(listing, *w)));
        }
        combos
    }

    /// Filesystem-safe label, e.g. `top_week`
    pub fn slug(&self) -> String {
        match self.window {
            Some(w) => format!("{}_{}", self.listing.as_str(), w.as_str()),
            None => self.listing.as_str().to_string(),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.window {
            Some(w) => write!(f, "{}:{}", self.listing.as_str(), w.as_str()),
            None => write!(f, "{}", self.listing.as_str()),
        }
    }
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        let invalid = || ConfigError::InvalidCombo(token.to_string());

        let (name, window) = match token.split_once(':') {
            Some((name, window)) => (name.trim(), Some(window.trim())),
            None => (token, None),
        };

        let listing = ListingKind::from_str(name).map_err(|_| invalid())?;
        match window {
            None => Ok(Self::new(listing)),
            Some(w) if listing.is_windowed() => {
                let window = TimeWindow::from_str(w).map_err(|_| invalid())?;
                Ok(Self::windowed(listing, window))
            }
            Some(_) => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Strategy {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Strategy> for String {
    fn from(value: Strategy) -> Self {
        value.to_string()
    }
}
