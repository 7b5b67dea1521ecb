use crate::errors::StatsError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a `YYYY-MM-DD` calendar date, ignoring surrounding whitespace.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

/// A persisted data point. The id is assigned by the persistence service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub date: String,
    pub visits: u64,
}

/// Document body stored in the `trafficStats` collection, and the body of a
/// create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatDoc {
    pub date: String,
    pub visits: u64,
}

impl StatDoc {
    pub fn parsed_date(&self) -> Result<NaiveDate, StatsError> {
        parse_date(&self.date).ok_or_else(|| {
            StatsError::ValidationFailed(format!("'{}' is not a valid YYYY-MM-DD date", self.date))
        })
    }

    /// Returns the document with its date rewritten in canonical form.
    pub fn normalized(&self) -> Result<StatDoc, StatsError> {
        let date = self.parsed_date()?;
        Ok(StatDoc {
            date: date.format(DATE_FORMAT).to_string(),
            visits: self.visits,
        })
    }

    pub fn into_record(self, id: String) -> Record {
        Record {
            id,
            date: self.date,
            visits: self.visits,
        }
    }
}

/// Merge body for an update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visits: Option<u64>,
}

impl StatPatch {
    pub fn normalized(&self) -> Result<StatPatch, StatsError> {
        let date = match &self.date {
            Some(date) => Some(
                parse_date(date)
                    .ok_or_else(|| {
                        StatsError::ValidationFailed(format!("'{date}' is not a valid YYYY-MM-DD date"))
                    })?
                    .format(DATE_FORMAT)
                    .to_string(),
            ),
            None => None,
        };
        Ok(StatPatch {
            date,
            visits: self.visits,
        })
    }

    pub fn apply(&self, doc: &mut StatDoc) {
        if let Some(date) = &self.date {
            doc.date = date.clone();
        }
        if let Some(visits) = self.visits {
            doc.visits = visits;
        }
    }
}

/// Operator input for a new data point, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewStat {
    pub date: String,
    pub visits: i64,
}

impl NewStat {
    pub fn new(date: impl Into<String>, visits: i64) -> Self {
        Self {
            date: date.into(),
            visits,
        }
    }

    pub fn validate(&self) -> Result<StatDoc, StatsError> {
        let visits = validate_visits(self.visits)?;
        StatDoc {
            date: self.date.clone(),
            visits,
        }
        .normalized()
    }
}

/// Operator input for an edit, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatChanges {
    pub date: Option<String>,
    pub visits: Option<i64>,
}

impl StatChanges {
    pub fn validate(&self) -> Result<StatPatch, StatsError> {
        if self.date.is_none() && self.visits.is_none() {
            return Err(StatsError::ValidationFailed("nothing to change".to_string()));
        }
        let visits = self.visits.map(validate_visits).transpose()?;
        StatPatch {
            date: self.date.clone(),
            visits,
        }
        .normalized()
    }
}

fn validate_visits(visits: i64) -> Result<u64, StatsError> {
    u64::try_from(visits).map_err(|_| {
        StatsError::ValidationFailed(format!("visits must be a non-negative number, got {visits}"))
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppData {
    pub stats: BTreeMap<String, StatDoc>,
}

impl AppData {
    pub fn records(&self) -> Vec<Record> {
        self.stats
            .iter()
            .map(|(id, doc)| doc.clone().into_record(id.clone()))
            .collect()
    }

    /// Whether a document other than `except_id` already holds `date`.
    pub fn has_date(&self, date: NaiveDate, except_id: Option<&str>) -> bool {
        self.stats.iter().any(|(id, doc)| {
            Some(id.as_str()) != except_id && parse_date(&doc.date) == Some(date)
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub stats: Vec<Record>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateManyRequest {
    pub docs: Vec<StatDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateManyResponse {
    #[serde(rename = "allStats")]
    pub all_stats: Vec<Record>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteManyRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteManyResponse {
    pub deleted: usize,
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Granularity::Daily, Granularity::Weekly, Granularity::Monthly];

    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Granularity::Daily),
            "weekly" => Ok(Granularity::Weekly),
            "monthly" => Ok(Granularity::Monthly),
            other => Err(format!(
                "unknown granularity '{other}', expected daily, weekly or monthly"
            )),
        }
    }
}

/// One aggregated display period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub label: String,
    pub visits: u64,
    pub period_start: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChartResponse {
    pub granularity: Granularity,
    pub buckets: Vec<Bucket>,
}
