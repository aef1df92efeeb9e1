use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source of the property listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Source {
    #[serde(rename = "squareyard")]
    SquareYards,
    #[serde(rename = "nobroker")]
    NoBroker,
    #[serde(rename = "housing")]
    Housing,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::SquareYards, Source::NoBroker, Source::Housing];

    /// Identifier used in routes, JSON payloads and output file names
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::SquareYards => "squareyard",
            Source::NoBroker => "nobroker",
            Source::Housing => "housing",
        }
    }

    /// Origin that relative listing links are resolved against
    pub fn origin(&self) -> &'static str {
        match self {
            Source::SquareYards => "https://www.squareyards.com",
            Source::NoBroker => "https://www.nobroker.in",
            Source::Housing => "https://housing.com",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Source::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| format!("unknown source '{}'", s))
    }
}

/// Uniform property record emitted by every scraper.
///
/// Everything except `source` is best-effort: the sites omit fields freely,
/// and a missing value serializes as `null` instead of failing the card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub name: Option<String>,
    pub link: Option<String>,

    pub city: Option<String>,
    pub locality: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    pub price: Option<String>,
    pub per_sqft_price: Option<String>,
    pub emi: Option<String>,

    pub built_up: Option<String>,
    pub facing: Option<String>,
    pub apartment_type: Option<String>,
    pub bathrooms: Option<String>,
    pub parking: Option<String>,

    pub image: Vec<String>,

    pub possession_status: Option<String>,
    pub possession_date: Option<String>,

    pub agent_name: Option<String>,
    pub description: Option<String>,
    pub source: Source,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PropertyRecord {
    /// Empty record for `source`; extractors fill in whatever the card offers
    pub fn new(source: Source) -> Self {
        Self {
            name: None,
            link: None,
            city: None,
            locality: None,
            address: None,
            latitude: None,
            longitude: None,
            price: None,
            per_sqft_price: None,
            emi: None,
            built_up: None,
            facing: None,
            apartment_type: None,
            bathrooms: None,
            parking: None,
            image: Vec::new(),
            possession_status: None,
            possession_date: None,
            agent_name: None,
            description: None,
            source,
            created_at: None,
            updated_at: None,
        }
    }

    /// A record may only be emitted once both identity fields are present
    pub fn has_identity(&self) -> bool {
        let present = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.is_empty());
        present(&self.name) && present(&self.link)
    }
}
