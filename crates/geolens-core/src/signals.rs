//! The crawler's page-signals record and the signal keys scoring rules read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageCategory {
    Homepage,
    Product,
    Article,
    Blog,
    Faq,
    Category,
    Landing,
    Legal,
    Contact,
    Other,
}

impl std::fmt::Display for PageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PageCategory::Homepage => "homepage",
            PageCategory::Product => "product",
            PageCategory::Article => "article",
            PageCategory::Blog => "blog",
            PageCategory::Faq => "faq",
            PageCategory::Category => "category",
            PageCategory::Landing => "landing",
            PageCategory::Legal => "legal",
            PageCategory::Contact => "contact",
            PageCategory::Other => "other",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentMetrics {
    pub word_count: u32,
    pub citation_count: u32,
    pub author_present: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureMetrics {
    pub h1_count: u32,
    pub heading_count: u32,
    /// Number of times a heading level was skipped (e.g. `h2` straight to `h4`).
    pub heading_levels_skipped: u32,
    #[serde(default)]
    pub schema_types: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FreshnessMetrics {
    pub published_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageBrandMetrics {
    pub mention_count: u32,
    #[serde(default)]
    pub keywords_found: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnippetMetrics {
    pub qa_blocks: u32,
    pub list_count: u32,
    pub table_count: u32,
}

/// Read-only record produced by the crawler for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSignals {
    pub url: String,
    pub category: PageCategory,
    /// When the crawler fetched the page. Freshness is measured against this,
    /// never against the wall clock, so re-scoring is reproducible.
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub content: ContentMetrics,
    #[serde(default)]
    pub structure: StructureMetrics,
    #[serde(default)]
    pub freshness: FreshnessMetrics,
    #[serde(default)]
    pub brand: PageBrandMetrics,
    #[serde(default)]
    pub snippet: SnippetMetrics,
}

/// A raw value a scoring rule can read.
///
/// `Llm*` keys come from structured judgments rather than page signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKey {
    WordCount,
    CitationCount,
    AuthorPresent,
    HeadingHierarchy,
    SchemaTypeCount,
    DaysSinceUpdate,
    BrandMentionCount,
    BrandKeywordCoverage,
    QaBlockCount,
    ListCount,
    TableCount,
    LlmAuthority,
    LlmFreshness,
    LlmStructure,
    LlmBrandAlignment,
    LlmAccuracy,
}

impl SignalKey {
    #[must_use]
    pub fn is_llm(self) -> bool {
        matches!(
            self,
            SignalKey::LlmAuthority
                | SignalKey::LlmFreshness
                | SignalKey::LlmStructure
                | SignalKey::LlmBrandAlignment
                | SignalKey::LlmAccuracy
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKey::WordCount => "word_count",
            SignalKey::CitationCount => "citation_count",
            SignalKey::AuthorPresent => "author_present",
            SignalKey::HeadingHierarchy => "heading_hierarchy",
            SignalKey::SchemaTypeCount => "schema_type_count",
            SignalKey::DaysSinceUpdate => "days_since_update",
            SignalKey::BrandMentionCount => "brand_mention_count",
            SignalKey::BrandKeywordCoverage => "brand_keyword_coverage",
            SignalKey::QaBlockCount => "qa_block_count",
            SignalKey::ListCount => "list_count",
            SignalKey::TableCount => "table_count",
            SignalKey::LlmAuthority => "llm_authority",
            SignalKey::LlmFreshness => "llm_freshness",
            SignalKey::LlmStructure => "llm_structure",
            SignalKey::LlmBrandAlignment => "llm_brand_alignment",
            SignalKey::LlmAccuracy => "llm_accuracy",
        }
    }
}

impl std::fmt::Display for SignalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PageSignals {
    /// Read the raw value for a page-level signal key.
    ///
    /// Returns `None` for `Llm*` keys and when the page lacks the data (no
    /// dates for `DaysSinceUpdate`, no configured keywords for
    /// `BrandKeywordCoverage`).
    #[must_use]
    pub fn value(&self, key: SignalKey, brand_keywords: &[String]) -> Option<f64> {
        match key {
            SignalKey::WordCount => Some(f64::from(self.content.word_count)),
            SignalKey::CitationCount => Some(f64::from(self.content.citation_count)),
            SignalKey::AuthorPresent => Some(if self.content.author_present { 1.0 } else { 0.0 }),
            SignalKey::HeadingHierarchy => Some(self.heading_hierarchy_quality()),
            #[allow(clippy::cast_precision_loss)]
            SignalKey::SchemaTypeCount => Some(self.structure.schema_types.len() as f64),
            SignalKey::DaysSinceUpdate => self.days_since_update(),
            SignalKey::BrandMentionCount => Some(f64::from(self.brand.mention_count)),
            SignalKey::BrandKeywordCoverage => self.keyword_coverage(brand_keywords),
            SignalKey::QaBlockCount => Some(f64::from(self.snippet.qa_blocks)),
            SignalKey::ListCount => Some(f64::from(self.snippet.list_count)),
            SignalKey::TableCount => Some(f64::from(self.snippet.table_count)),
            SignalKey::LlmAuthority
            | SignalKey::LlmFreshness
            | SignalKey::LlmStructure
            | SignalKey::LlmBrandAlignment
            | SignalKey::LlmAccuracy => None,
        }
    }

    /// Heading quality on a 0–100 scale.
    ///
    /// No headings scores 0. Otherwise start at 100, lose 40 unless there is
    /// exactly one `h1`, and lose 20 per skipped level (at most 60).
    #[allow(clippy::cast_precision_loss)]
    fn heading_hierarchy_quality(&self) -> f64 {
        if self.structure.heading_count == 0 {
            return 0.0;
        }
        let mut quality: i64 = 100;
        if self.structure.h1_count != 1 {
            quality -= 40;
        }
        quality -= (i64::from(self.structure.heading_levels_skipped) * 20).min(60);
        quality.max(0) as f64
    }

    #[allow(clippy::cast_precision_loss)]
    fn days_since_update(&self) -> Option<f64> {
        let date = self
            .freshness
            .modified_at
            .or(self.freshness.published_at)?;
        Some((self.fetched_at - date).num_days().max(0) as f64)
    }

    #[allow(clippy::cast_precision_loss)]
    fn keyword_coverage(&self, brand_keywords: &[String]) -> Option<f64> {
        if brand_keywords.is_empty() {
            return None;
        }
        let found: Vec<String> = self
            .brand
            .keywords_found
            .iter()
            .map(|k| k.to_lowercase())
            .collect();
        let hits = brand_keywords
            .iter()
            .filter(|k| found.contains(&k.to_lowercase()))
            .count();
        Some(hits as f64 / brand_keywords.len() as f64 * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn page() -> PageSignals {
        PageSignals {
            url: "https://example.com/guide".to_string(),
            category: PageCategory::Article,
            fetched_at: Utc.with_ymd_and_hms(2026, 3, 31, 0, 0, 0).unwrap(),
            content: ContentMetrics {
                word_count: 1800,
                citation_count: 6,
                author_present: true,
            },
            structure: StructureMetrics {
                h1_count: 1,
                heading_count: 9,
                heading_levels_skipped: 1,
                schema_types: vec!["Article".to_string(), "FAQPage".to_string()],
            },
            freshness: FreshnessMetrics {
                published_at: Some(Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap()),
                modified_at: Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()),
            },
            brand: PageBrandMetrics {
                mention_count: 4,
                keywords_found: vec!["Sparkling".to_string(), "organic".to_string()],
            },
            snippet: SnippetMetrics {
                qa_blocks: 3,
                list_count: 2,
                table_count: 0,
            },
        }
    }

    #[test]
    fn days_since_update_prefers_modified_date() {
        assert_eq!(page().value(SignalKey::DaysSinceUpdate, &[]), Some(30.0));
    }

    #[test]
    fn days_since_update_missing_without_dates() {
        let mut p = page();
        p.freshness = FreshnessMetrics::default();
        assert_eq!(p.value(SignalKey::DaysSinceUpdate, &[]), None);
    }

    #[test]
    fn heading_quality_penalises_skips() {
        assert_eq!(page().value(SignalKey::HeadingHierarchy, &[]), Some(80.0));
    }

    #[test]
    fn heading_quality_zero_without_headings() {
        let mut p = page();
        p.structure.heading_count = 0;
        assert_eq!(p.value(SignalKey::HeadingHierarchy, &[]), Some(0.0));
    }

    #[test]
    fn keyword_coverage_is_case_insensitive() {
        let keywords = vec![
            "sparkling".to_string(),
            "Organic".to_string(),
            "vegan".to_string(),
            "local".to_string(),
        ];
        assert_eq!(
            page().value(SignalKey::BrandKeywordCoverage, &keywords),
            Some(50.0)
        );
    }

    #[test]
    fn keyword_coverage_missing_without_configured_keywords() {
        assert_eq!(page().value(SignalKey::BrandKeywordCoverage, &[]), None);
    }

    #[test]
    fn llm_keys_have_no_page_value() {
        assert!(SignalKey::LlmAuthority.is_llm());
        assert_eq!(page().value(SignalKey::LlmAuthority, &[]), None);
    }
}
