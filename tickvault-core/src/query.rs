//! Time-series query built once per invocation.

use crate::error::ConfigError;
use crate::universe::Universe;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bar granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timespan {
    Minute,
    Hour,
    #[default]
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Timespan {
    pub fn as_str(self) -> &'static str {
        match self {
            Timespan::Minute => "minute",
            Timespan::Hour => "hour",
            Timespan::Day => "day",
            Timespan::Week => "week",
            Timespan::Month => "month",
            Timespan::Quarter => "quarter",
            Timespan::Year => "year",
        }
    }
}

impl fmt::Display for Timespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timespan {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minute" => Ok(Timespan::Minute),
            "hour" => Ok(Timespan::Hour),
            "day" => Ok(Timespan::Day),
            "week" => Ok(Timespan::Week),
            "month" => Ok(Timespan::Month),
            "quarter" => Ok(Timespan::Quarter),
            "year" => Ok(Timespan::Year),
            other => Err(ConfigError::InvalidValue(format!("unknown timespan '{other}'"))),
        }
    }
}

/// Requested ordering of the vendor response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(ConfigError::InvalidValue(format!("unknown sort order '{other}'"))),
        }
    }
}

/// Historical data request for every symbol of a universe.
///
/// Multi-symbol queries are limited to a single exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesQuery {
    pub universe: Universe,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub exchange: String,
    pub timespan: Timespan,
    pub multiplier: u32,
    pub split_adjusted: bool,
    pub sort: SortOrder,
}

impl TimeSeriesQuery {
    pub fn new(universe: Universe, start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigError> {
        if start > end {
            return Err(ConfigError::InvalidValue(format!(
                "query start {start} is after end {end}"
            )));
        }
        Ok(Self {
            universe,
            start,
            end,
            exchange: String::new(),
            timespan: Timespan::Day,
            multiplier: 1,
            split_adjusted: false,
            sort: SortOrder::Asc,
        })
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    pub fn with_timespan(mut self, timespan: Timespan, multiplier: u32) -> Self {
        self.timespan = timespan;
        self.multiplier = multiplier.max(1);
        self
    }

    pub fn with_split_adjusted(mut self, adjusted: bool) -> Self {
        self.split_adjusted = adjusted;
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn symbols(&self) -> &[String] {
        &self.universe.symbols
    }

    pub(crate) fn start_str(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub(crate) fn end_str(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}
