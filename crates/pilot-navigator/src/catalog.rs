/// Catalog store.
///
/// Loads the fixed set of catalog entries once at startup, validates them and exposes
/// read-only lookups. Two on-disk shapes are supported (see `SchemaVersion`); both are
/// adapted into the canonical `CatalogEntry`. Any invalid record fails the whole load.
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use navigator_common::api::ListPilotsParams;

use crate::error::AppError;
use crate::model::{
    BuildDecision, BuildVsBuy, CatalogEntry, Feasibility, Link, RankingScore, SchemaVersion,
    Sector,
};

const TOP_PICK_COUNT: usize = 3;

#[derive(Debug)]
pub struct Catalog {
    schema: SchemaVersion,
    entries: Vec<Arc<CatalogEntry>>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Load and validate the catalog file.
    ///
    /// `configured_schema` is only consulted when the file is a bare array; a versioned
    /// envelope always uses its own tag.
    pub fn load(path: &Path, configured_schema: Option<SchemaVersion>) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::Data(format!("failed to read {}: {e}", path.display())))?;
        let catalog = Self::from_json_str(&raw, configured_schema)?;
        info!(
            path = %path.display(),
            entries = catalog.len(),
            schema = ?catalog.schema,
            "catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_json_str(
        raw: &str,
        configured_schema: Option<SchemaVersion>,
    ) -> Result<Self, AppError> {
        let file: CatalogFile = serde_json::from_str(raw)
            .map_err(|e| AppError::Data(format!("catalog is not valid JSON: {e}")))?;

        let (schema, records) = match file {
            CatalogFile::Versioned {
                schema_version,
                entries,
            } => (schema_version, entries),
            CatalogFile::Bare(entries) => {
                let schema = configured_schema.ok_or_else(|| {
                    AppError::Data(
                        "catalog has no schemaVersion tag and CATALOG_SCHEMA is not set"
                            .to_string(),
                    )
                })?;
                (schema, entries)
            }
        };

        let entries = records
            .into_iter()
            .enumerate()
            .map(|(idx, value)| parse_record(schema, idx, value))
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_entries(schema, entries)
    }

    /// Build a catalog from already-adapted entries, enforcing the cross-entry invariants.
    pub fn from_entries(
        schema: SchemaVersion,
        entries: Vec<CatalogEntry>,
    ) -> Result<Self, AppError> {
        let mut index = HashMap::with_capacity(entries.len());
        let mut dimension: Option<usize> = None;

        for (pos, entry) in entries.iter().enumerate() {
            if index.insert(entry.id.clone(), pos).is_some() {
                return Err(AppError::Data(format!("duplicate entry id: {}", entry.id)));
            }
            if let Some(embedding) = &entry.embedding {
                match dimension {
                    None => dimension = Some(embedding.len()),
                    Some(dim) if dim != embedding.len() => {
                        return Err(AppError::Data(format!(
                            "entry {} has embedding dimension {}, expected {dim}",
                            entry.id,
                            embedding.len()
                        )));
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(Self {
            schema,
            entries: entries.into_iter().map(Arc::new).collect(),
            index,
        })
    }

    pub fn schema(&self) -> SchemaVersion {
        self.schema
    }

    pub fn all(&self) -> &[Arc<CatalogEntry>] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&Arc<CatalogEntry>> {
        self.index.get(id).map(|&pos| &self.entries[pos])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The pinned entries shown on the landing page: the first three in catalog order.
    pub fn top_picks(&self) -> &[Arc<CatalogEntry>] {
        &self.entries[..self.entries.len().min(TOP_PICK_COUNT)]
    }

    /// Sorted, de-duplicated list of every tag in the catalog.
    pub fn all_tags(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|e| e.tags.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn filter(&self, options: &FilterOptions) -> Vec<Arc<CatalogEntry>> {
        self.entries
            .iter()
            .filter(|e| options.matches(e))
            .cloned()
            .collect()
    }

    /// Filter and sort according to browse-request parameters.
    pub fn browse(&self, params: &ListPilotsParams) -> Result<Vec<Arc<CatalogEntry>>, AppError> {
        let options = FilterOptions::from_params(params)?;
        let sort = params
            .sort
            .as_deref()
            .unwrap_or_default()
            .parse::<SortOption>()
            .map_err(AppError::Validation)?;
        let mut entries = self.filter(&options);
        sort_entries(&mut entries, sort);
        Ok(entries)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    pub sectors: Vec<Sector>,
    pub feasibility: Option<Feasibility>,
    pub max_risk: Option<f32>,
    pub tags: Vec<String>,
    pub search: Option<String>,
}

impl FilterOptions {
    pub fn from_params(params: &ListPilotsParams) -> Result<Self, AppError> {
        let sectors = split_list(params.sector.as_deref())
            .map(|s| s.parse::<Sector>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(AppError::Validation)?;

        let feasibility = match params.feasibility.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(raw) => Some(raw.parse::<Feasibility>().map_err(AppError::Validation)?),
        };

        let search = params
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            sectors,
            feasibility,
            max_risk: params.max_risk,
            tags: split_list(params.tag.as_deref()).map(str::to_string).collect(),
            search,
        })
    }

    fn matches(&self, entry: &CatalogEntry) -> bool {
        if !self.sectors.is_empty() && !self.sectors.contains(&entry.sector) {
            return false;
        }
        if let Some(wanted) = self.feasibility {
            if entry.feasibility != Some(wanted) {
                return false;
            }
        }
        if let Some(max_risk) = self.max_risk {
            if entry.ranking.risk_equivalent() > max_risk {
                return false;
            }
        }
        if !self.tags.is_empty() {
            let hit = self.tags.iter().any(|wanted| {
                let wanted = wanted.to_lowercase();
                entry
                    .tags
                    .iter()
                    .any(|tag| tag.to_lowercase().contains(&wanted))
            });
            if !hit {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let hit = entry.title.to_lowercase().contains(&needle)
                || entry.one_liner.to_lowercase().contains(&needle)
                || entry.tags.iter().any(|t| t.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOption {
    /// Catalog order.
    #[default]
    Relevance,
    /// Lowest risk first.
    Risk,
    /// Solo-deliverable entries first.
    Feasibility,
}

impl FromStr for SortOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "relevance" => Ok(SortOption::Relevance),
            "risk" | "wheelrisk" => Ok(SortOption::Risk),
            "feasibility" => Ok(SortOption::Feasibility),
            other => Err(format!("unknown sort option: '{other}'")),
        }
    }
}

/// Stable sort, so equal keys keep catalog order.
pub fn sort_entries(entries: &mut [Arc<CatalogEntry>], sort: SortOption) {
    match sort {
        SortOption::Relevance => {}
        SortOption::Risk => entries.sort_by(|a, b| {
            a.ranking
                .risk_equivalent()
                .total_cmp(&b.ranking.risk_equivalent())
        }),
        SortOption::Feasibility => entries.sort_by_key(|e| {
            !e.feasibility
                .is_some_and(|f| f.is_independently_achievable())
        }),
    }
}

fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

// --- On-disk shapes ---

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Versioned {
        #[serde(rename = "schemaVersion")]
        schema_version: SchemaVersion,
        entries: Vec<serde_json::Value>,
    },
    Bare(Vec<serde_json::Value>),
}

/// Legacy record: risk-rated, with feasibility and an inline embedding.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRecord {
    id: String,
    title: String,
    sector: String,
    tags: Vec<String>,
    one_liner: String,
    #[serde(default)]
    stack: Vec<String>,
    #[serde(default)]
    kpis: Vec<String>,
    feasibility: String,
    wheel_risk: f64,
    problem: String,
    approach: String,
    #[serde(default)]
    one_week: Option<String>,
    #[serde(default)]
    ninety_day: Option<String>,
    #[serde(default)]
    risks: Vec<String>,
    #[serde(default)]
    buy_vs_build: Option<String>,
    #[serde(default)]
    emb: Option<Vec<f32>>,
}

/// Current record: quality-rated ("overall pick"), with competitors and sources.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentRecord {
    id: String,
    title: String,
    one_liner: String,
    sector: String,
    tags: Vec<String>,
    problem: String,
    approach: String,
    #[serde(default)]
    pain_points: Vec<Link>,
    #[serde(default)]
    kpis: Vec<String>,
    #[serde(default)]
    competitors: Competitors,
    overall_pick: f64,
    #[serde(default)]
    build_vs_buy: Option<BuildDecision>,
    #[serde(default)]
    buy_url: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
}

#[derive(Deserialize, Default)]
#[serde(untagged)]
enum Competitors {
    #[default]
    None,
    Links(Vec<Link>),
    Text(String),
}

impl Competitors {
    fn into_links(self) -> Vec<Link> {
        match self {
            Competitors::None => vec![],
            Competitors::Links(links) => links,
            Competitors::Text(text) if text.trim().is_empty() => vec![],
            Competitors::Text(text) => vec![Link {
                name: text.trim().to_string(),
                url: None,
            }],
        }
    }
}

fn parse_record(
    schema: SchemaVersion,
    idx: usize,
    value: serde_json::Value,
) -> Result<CatalogEntry, AppError> {
    let invalid = |msg: String| AppError::Data(format!("catalog entry #{idx}: {msg}"));

    let entry = match schema {
        SchemaVersion::Legacy => {
            let record: LegacyRecord =
                serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;
            let risk = bounded_score(record.wheel_risk).map_err(|m| invalid(format!("wheelRisk {m}")))?;
            CatalogEntry {
                id: record.id,
                title: record.title,
                one_liner: record.one_liner,
                sector: record.sector.parse().map_err(invalid)?,
                tags: record.tags,
                problem: record.problem,
                approach: record.approach,
                ranking: RankingScore::Risk(risk),
                feasibility: Some(record.feasibility.parse().map_err(invalid)?),
                embedding: record.emb.filter(|v| !v.is_empty()),
                competitors: vec![],
                pain_points: vec![],
                kpis: record.kpis,
                risks: record.risks,
                sources: vec![],
                build_vs_buy: record
                    .buy_vs_build
                    .filter(|note| !note.trim().is_empty())
                    .map(|note| BuildVsBuy {
                        recommendation: None,
                        note: Some(note),
                        url: None,
                    }),
                stack: record.stack,
                one_week: non_blank(record.one_week),
                ninety_day: non_blank(record.ninety_day),
            }
        }
        SchemaVersion::Current => {
            let record: CurrentRecord =
                serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;
            let quality =
                bounded_score(record.overall_pick).map_err(|m| invalid(format!("overallPick {m}")))?;
            let build_vs_buy = match (record.build_vs_buy, record.buy_url) {
                (None, None) => None,
                (recommendation, url) => Some(BuildVsBuy {
                    recommendation,
                    note: None,
                    url: url.filter(|u| !u.trim().is_empty()),
                }),
            };
            CatalogEntry {
                id: record.id,
                title: record.title,
                one_liner: record.one_liner,
                sector: record.sector.parse().map_err(invalid)?,
                tags: record.tags,
                problem: record.problem,
                approach: record.approach,
                ranking: RankingScore::Quality(quality),
                feasibility: None,
                embedding: None,
                competitors: record.competitors.into_links(),
                pain_points: record.pain_points,
                kpis: record.kpis,
                risks: vec![],
                sources: record.sources,
                build_vs_buy,
                stack: vec![],
                one_week: None,
                ninety_day: None,
            }
        }
    };

    if entry.id.trim().is_empty() {
        return Err(invalid("id must not be empty".to_string()));
    }
    if entry
        .embedding
        .as_ref()
        .is_some_and(|v| v.iter().any(|x| !x.is_finite()))
    {
        return Err(invalid("embedding contains non-finite values".to_string()));
    }
    Ok(entry)
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

fn bounded_score(value: f64) -> Result<f32, String> {
    if !value.is_finite() || !(0.0..=10.0).contains(&value) {
        return Err(format!("must be within [0, 10], got {value}"));
    }
    Ok(value as f32)
}
