use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use navigator_common::api::{RecommendedEntryView, ScoredEntryView};

/// Closed set of catalog categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Sector {
    Transportation,
    Water,
    Energy,
    Buildings,
    Environmental,
    Internal,
}

impl Sector {
    pub const ALL: [Sector; 6] = [
        Sector::Transportation,
        Sector::Water,
        Sector::Energy,
        Sector::Buildings,
        Sector::Environmental,
        Sector::Internal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Transportation => "Transportation",
            Sector::Water => "Water",
            Sector::Energy => "Energy",
            Sector::Buildings => "Buildings",
            Sector::Environmental => "Environmental",
            Sector::Internal => "Internal",
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Sector::ALL
            .into_iter()
            .find(|sector| sector.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown sector: '{s}'"))
    }
}

/// Delivery model of an entry. Only present in legacy catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Feasibility {
    #[serde(rename = "solo-90-day")]
    Solo90Day,
    #[serde(rename = "configure")]
    Configure,
}

impl Feasibility {
    /// Whether one person can deliver the entry without outside help.
    pub fn is_independently_achievable(&self) -> bool {
        matches!(self, Feasibility::Solo90Day)
    }
}

impl FromStr for Feasibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solo-90-day" => Ok(Feasibility::Solo90Day),
            "configure" => Ok(Feasibility::Configure),
            other => Err(format!("unknown feasibility: '{other}'")),
        }
    }
}

/// The single 0-10 ranking signal an entry carries.
///
/// Legacy catalogs rate implementation risk (lower is better); current catalogs rate
/// overall pick quality (higher is better). Exactly one convention is active per dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum RankingScore {
    Risk(f32),
    Quality(f32),
}

impl RankingScore {
    /// Quality-scale value (higher is better).
    pub fn quality_equivalent(&self) -> f32 {
        match *self {
            RankingScore::Risk(risk) => 10.0 - risk,
            RankingScore::Quality(quality) => quality,
        }
    }

    /// Risk-scale value (lower is better).
    pub fn risk_equivalent(&self) -> f32 {
        10.0 - self.quality_equivalent()
    }
}

/// Which on-disk catalog shape a dataset uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVersion {
    Legacy,
    Current,
}

impl FromStr for SchemaVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" | "v1" => Ok(SchemaVersion::Legacy),
            "current" | "v2" => Ok(SchemaVersion::Current),
            other => Err(format!("unknown catalog schema: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Link {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum BuildDecision {
    Build,
    Buy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BuildVsBuy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<BuildDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One recommendable catalog item. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    pub title: String,
    pub one_liner: String,
    pub sector: Sector,
    pub tags: Vec<String>,
    pub problem: String,
    pub approach: String,
    pub ranking: RankingScore,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feasibility: Option<Feasibility>,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub competitors: Vec<Link>,
    pub pain_points: Vec<Link>,
    pub kpis: Vec<String>,
    pub risks: Vec<String>,
    pub sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_vs_buy: Option<BuildVsBuy>,
    /// Legacy records only: suggested tech stack and the one-week / ninety-day plans.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stack: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_week: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ninety_day: Option<String>,
}

impl CatalogEntry {
    pub fn quality_score(&self) -> f32 {
        self.ranking.quality_equivalent()
    }

    /// Text submitted to the embedding model for this entry.
    pub fn searchable_text(&self) -> String {
        [
            self.title.as_str(),
            self.one_liner.as_str(),
            &self.tags.join(" "),
            self.problem.as_str(),
            self.approach.as_str(),
            &format!("Sector: {}", self.sector),
        ]
        .join(" ")
    }

    pub fn competitor_summary(&self) -> String {
        if self.competitors.is_empty() {
            return "None".to_string();
        }
        self.competitors
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Precomputed embedding for one catalog entry, as stored in the embeddings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryEmbedding {
    pub id: String,
    #[serde(default)]
    pub searchable_text: String,
    pub embedding: Vec<f32>,
}

/// A catalog entry ranked against one query. Created per request, never persisted.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub entry: Arc<CatalogEntry>,
    pub score: f32,
    pub reasons: Vec<String>,
}

impl ScoredEntry {
    pub fn view(&self) -> ScoredEntryView {
        ScoredEntryView {
            id: self.entry.id.clone(),
            score: self.score,
            reasons: self.reasons.clone(),
        }
    }

    pub fn recommended_view(&self) -> RecommendedEntryView {
        RecommendedEntryView {
            id: self.entry.id.clone(),
            title: self.entry.title.clone(),
            score: self.score,
            reasons: self.reasons.clone(),
        }
    }

    pub fn match_percent(&self) -> u32 {
        (self.score * 100.0).round().max(0.0) as u32
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_parsing_is_case_insensitive() {
        assert_eq!("water".parse::<Sector>().unwrap(), Sector::Water);
        assert_eq!(" Energy ".parse::<Sector>().unwrap(), Sector::Energy);
        assert!("Space".parse::<Sector>().is_err());
    }

    #[test]
    fn ranking_scales_convert() {
        assert_eq!(RankingScore::Risk(3.0).quality_equivalent(), 7.0);
        assert_eq!(RankingScore::Quality(8.0).risk_equivalent(), 2.0);
    }

    #[test]
    fn searchable_text_includes_sector_suffix() {
        let entry = fixtures::entry("a", Sector::Water, &["leak", "meters"], RankingScore::Quality(5.0));
        let text = entry.searchable_text();
        assert!(text.starts_with("Pilot a One-liner for a leak meters"));
        assert!(text.ends_with("Sector: Water"));
    }

    #[test]
    fn entry_serialization_omits_embedding() {
        let mut entry = fixtures::entry("a", Sector::Water, &[], RankingScore::Risk(2.0));
        entry.embedding = Some(vec![0.1, 0.2]);
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("embedding").is_none());
        assert_eq!(json["oneLiner"], "One-liner for a");
        assert_eq!(json["ranking"]["kind"], "risk");
    }

    #[test]
    fn match_percent_rounds() {
        let scored = ScoredEntry {
            entry: Arc::new(fixtures::entry("a", Sector::Water, &[], RankingScore::Risk(2.0))),
            score: 0.856,
            reasons: vec![],
        };
        assert_eq!(scored.match_percent(), 86);
    }
}
