/// Deterministic keyword scorer used when the retrieval path is unavailable.
///
/// Signals are additive: tag overlap, title/one-liner relevance, a feasibility bonus and a
/// ranking-score term. Results are ordered by the unclamped total and reported clamped to
/// [0, 1]. Equal totals keep catalog order.
use std::sync::Arc;

use crate::model::{CatalogEntry, RankingScore, ScoredEntry};

pub const MAX_EMBEDDING_NUDGE: f32 = 0.1;

/// Minimum token length (in chars) for a query token to count.
const MIN_TOKEN_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeuristicWeights {
    /// Scaled by the fraction of the entry's tags that match.
    pub tag: f32,
    /// Flat amount when any token hits the title or one-liner.
    pub text: f32,
    /// Flat amount for independently achievable entries.
    pub feasibility: f32,
    /// Scaled by the entry's quality-equivalent score / 10.
    pub ranking: f32,
    /// Weight of the coarse inline-embedding proxy. Off by default.
    pub embedding_nudge: f32,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            tag: 0.6,
            text: 0.3,
            feasibility: 0.2,
            ranking: 0.2,
            embedding_nudge: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer {
    weights: HeuristicWeights,
}

impl HeuristicScorer {
    pub fn new(mut weights: HeuristicWeights) -> Self {
        weights.embedding_nudge = weights.embedding_nudge.clamp(0.0, MAX_EMBEDDING_NUDGE);
        Self { weights }
    }

    /// Rank `entries` against `query`, highest first, dropping non-positive totals.
    pub fn score(&self, query: &str, entries: &[Arc<CatalogEntry>]) -> Vec<ScoredEntry> {
        let tokens = tokenize(query);

        let mut scored: Vec<(f32, ScoredEntry)> = entries
            .iter()
            .filter_map(|entry| {
                let (total, reasons) = self.score_entry(&tokens, entry);
                (total > 0.0).then(|| {
                    (
                        total,
                        ScoredEntry {
                            entry: Arc::clone(entry),
                            score: total.clamp(0.0, 1.0),
                            reasons,
                        },
                    )
                })
            })
            .collect();

        // `sort_by` is stable, so ties keep catalog order.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().map(|(_, s)| s).collect()
    }

    /// Unclamped additive total plus the reasons that contributed to it.
    fn score_entry(&self, tokens: &[String], entry: &CatalogEntry) -> (f32, Vec<String>) {
        let w = &self.weights;
        let mut total = 0.0_f32;
        let mut reasons = Vec::new();

        let matched_tags: Vec<&str> = entry
            .tags
            .iter()
            .filter(|tag| {
                let tag = tag.to_lowercase();
                tokens.iter().any(|token| tag.contains(token.as_str()))
            })
            .map(String::as_str)
            .collect();
        if !matched_tags.is_empty() {
            total += w.tag * (matched_tags.len() as f32 / entry.tags.len() as f32);
            reasons.push(format!("Matches tags: {}", matched_tags.join(", ")));
        }

        let title = entry.title.to_lowercase();
        let one_liner = entry.one_liner.to_lowercase();
        if tokens
            .iter()
            .any(|t| title.contains(t.as_str()) || one_liner.contains(t.as_str()))
        {
            total += w.text;
            reasons.push("Relevant to your query".to_string());
        }

        if entry
            .feasibility
            .is_some_and(|f| f.is_independently_achievable())
        {
            total += w.feasibility;
            reasons.push("Can be built solo in 90 days".to_string());
        }

        match entry.ranking {
            RankingScore::Risk(risk) => {
                total += w.ranking * (10.0 - risk) / 10.0;
                if risk <= 4.0 {
                    reasons.push(format!("Low implementation risk ({risk}/10)"));
                }
            }
            RankingScore::Quality(quality) => {
                total += w.ranking * quality / 10.0;
                if quality >= 7.0 {
                    reasons.push(format!("Highly recommended ({quality}/10 overall pick)"));
                }
            }
        }

        if w.embedding_nudge > 0.0 {
            if let Some(embedding) = entry.embedding.as_deref().filter(|e| !e.is_empty()) {
                // Proxy only: there is no query vector on this path.
                let mean = embedding.iter().sum::<f32>() / embedding.len() as f32;
                total += mean * 0.5 * w.embedding_nudge;
            }
        }

        (total, reasons)
    }
}

/// Lowercased whitespace tokens of at least three characters.
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::entry;
    use crate::model::{Feasibility, Sector};

    fn carbon_entry() -> CatalogEntry {
        let mut e = entry(
            "carbon-tracker",
            Sector::Environmental,
            &["carbon", "tracking"],
            RankingScore::Risk(3.0),
        );
        e.title = "Carbon Tracker".to_string();
        e.feasibility = Some(Feasibility::Solo90Day);
        e
    }

    fn unrelated_risky_entry() -> CatalogEntry {
        let mut e = entry(
            "fleet-router",
            Sector::Transportation,
            &["routing", "fleet"],
            RankingScore::Risk(9.0),
        );
        e.title = "Fleet Router".to_string();
        e.one_liner = "Route municipal vehicles".to_string();
        e.feasibility = Some(Feasibility::Configure);
        e
    }

    fn arcs(entries: Vec<CatalogEntry>) -> Vec<Arc<CatalogEntry>> {
        entries.into_iter().map(Arc::new).collect()
    }

    #[test]
    fn tokenizer_drops_short_tokens() {
        assert_eq!(
            tokenize("An EV   fleet for the city"),
            vec!["fleet", "for", "the", "city"]
        );
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn low_risk_solo_query_ranks_matching_entry_first() {
        let scorer = HeuristicScorer::default();
        let entries = arcs(vec![unrelated_risky_entry(), carbon_entry()]);

        let ranked = scorer.score("low-risk solo carbon tracking", &entries);
        assert_eq!(ranked[0].entry.id, "carbon-tracker");
        assert!(ranked[0].score > ranked[1].score);

        let reasons = &ranked[0].reasons;
        assert!(reasons.iter().any(|r| r == "Matches tags: carbon, tracking"));
        assert!(reasons.iter().any(|r| r == "Can be built solo in 90 days"));
        assert!(reasons.iter().any(|r| r == "Low implementation risk (3/10)"));
    }

    #[test]
    fn empty_query_only_applies_flat_bonuses() {
        let scorer = HeuristicScorer::default();
        let entries = arcs(vec![carbon_entry()]);
        let ranked = scorer.score("", &entries);
        assert_eq!(ranked.len(), 1);
        // feasibility 0.2 + risk 0.2 * 0.7
        assert!((ranked[0].score - 0.34).abs() < 1e-6);
        assert!(!ranked[0].reasons.iter().any(|r| r.starts_with("Matches tags")));
        assert!(!ranked[0].reasons.iter().any(|r| r == "Relevant to your query"));
    }

    #[test]
    fn non_positive_scores_are_excluded() {
        let scorer = HeuristicScorer::default();
        let mut maxed = entry("maxed", Sector::Water, &[], RankingScore::Risk(10.0));
        maxed.feasibility = Some(Feasibility::Configure);
        let ranked = scorer.score("nothing relevant here", &arcs(vec![maxed]));
        assert!(ranked.is_empty());
    }

    #[test]
    fn empty_tag_list_never_gets_tag_reason() {
        let scorer = HeuristicScorer::default();
        let e = entry("bare", Sector::Water, &[], RankingScore::Quality(9.0));
        let ranked = scorer.score("pilot water", &arcs(vec![e]));
        assert!(!ranked[0].reasons.iter().any(|r| r.starts_with("Matches tags")));
        assert!(ranked[0]
            .reasons
            .iter()
            .any(|r| r == "Highly recommended (9/10 overall pick)"));
    }

    #[test]
    fn raw_total_reaches_one_point_three_and_is_clamped() {
        let scorer = HeuristicScorer::default();
        let mut best = entry("best", Sector::Energy, &["solar"], RankingScore::Risk(0.0));
        best.title = "Solar".to_string();
        best.feasibility = Some(Feasibility::Solo90Day);

        let (raw, _) = scorer.score_entry(&tokenize("solar"), &best);
        assert!((raw - 1.3).abs() < 1e-6);

        let ranked = scorer.score("solar", &arcs(vec![best]));
        assert_eq!(ranked[0].score, 1.0);
    }

    #[test]
    fn ordering_uses_unclamped_totals() {
        let scorer = HeuristicScorer::default();
        let mut strong = entry("strong", Sector::Energy, &["solar"], RankingScore::Risk(0.0));
        strong.title = "Solar".to_string();
        strong.feasibility = Some(Feasibility::Solo90Day);
        let mut weaker = entry("weaker", Sector::Energy, &["solar"], RankingScore::Risk(5.0));
        weaker.title = "Solar".to_string();
        weaker.feasibility = Some(Feasibility::Solo90Day);

        let ranked = scorer.score("solar", &arcs(vec![weaker, strong]));
        assert_eq!(ranked[0].entry.id, "strong");
        assert_eq!(ranked[0].score, 1.0);
        assert_eq!(ranked[1].score, 1.0);
    }

    #[test]
    fn scoring_is_idempotent() {
        let scorer = HeuristicScorer::default();
        let entries = arcs(vec![carbon_entry(), unrelated_risky_entry()]);
        let first = scorer.score("carbon fleet tracking", &entries);
        let second = scorer.score("carbon fleet tracking", &entries);
        let ids = |v: &[ScoredEntry]| {
            v.iter()
                .map(|s| (s.entry.id.clone(), s.score, s.reasons.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn ties_preserve_catalog_order() {
        let scorer = HeuristicScorer::default();
        let a = entry("a", Sector::Water, &[], RankingScore::Quality(5.0));
        let b = entry("b", Sector::Water, &[], RankingScore::Quality(5.0));
        let c = entry("c", Sector::Water, &[], RankingScore::Quality(5.0));
        let ranked = scorer.score("", &arcs(vec![a, b, c]));
        let order: Vec<&str> = ranked.iter().map(|s| s.entry.id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn adding_a_matching_tag_never_lowers_score() {
        let scorer = HeuristicScorer::default();
        let before = entry("x", Sector::Water, &["leak", "pipes"], RankingScore::Risk(5.0));
        let mut after = before.clone();
        after.tags.push("leakage".to_string());

        let tokens = tokenize("leak detection");
        let (s_before, _) = scorer.score_entry(&tokens, &before);
        let (s_after, _) = scorer.score_entry(&tokens, &after);
        assert!(s_after >= s_before);
    }

    #[test]
    fn embedding_nudge_is_opt_in_and_capped() {
        let mut e = entry("e", Sector::Water, &[], RankingScore::Quality(5.0));
        e.embedding = Some(vec![1.0, 1.0]);

        let (plain, _) = HeuristicScorer::default().score_entry(&[], &e);
        let nudged_scorer = HeuristicScorer::new(HeuristicWeights {
            embedding_nudge: 5.0,
            ..Default::default()
        });
        let (nudged, _) = nudged_scorer.score_entry(&[], &e);
        assert!((nudged - plain - 0.05).abs() < 1e-6);
    }
}
