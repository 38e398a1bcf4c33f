//! Prompt templates and the per-project prompt battery.
//!
//! Templates are static text with `{{variable}}` placeholders. Rendering is
//! a pure function: the same template and context always produce the same
//! text, and therefore the same prompt id.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use geolens_core::{PageSignals, PipelineType, ProjectContext};
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::TemplateError;
use crate::schemas::schema_for;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([a-z_]+)\s*\}\}").expect("valid regex"));

const DEFAULT_MARKET: &str = "the global market";
const NO_ATTRIBUTES: &str = "none provided";
const UNKNOWN_DOMAIN: &str = "unknown";

struct Template {
    id: &'static str,
    pipeline: PipelineType,
    text: &'static str,
}

const TEMPLATES: &[Template] = &[
    Template {
        id: "spontaneous",
        pipeline: PipelineType::Spontaneous,
        text: "A shopper in {{market}} asks you for recommendations in the category \
               \"{{category}}\". Which brands would you recommend, best first? \
               List every brand you name, in order.",
    },
    Template {
        id: "sentiment",
        pipeline: PipelineType::Sentiment,
        text: "What is the general perception of the brand {{brand}} in {{market}}? \
               Describe its reputation, strengths and weaknesses as customers and \
               reviewers see them.",
    },
    Template {
        id: "comparison",
        pipeline: PipelineType::Comparison,
        text: "Compare {{brand}} and {{competitor}} for a customer in {{market}}. \
               Which one would you recommend, and what sets them apart?",
    },
    Template {
        id: "accuracy",
        pipeline: PipelineType::Accuracy,
        text: "Describe the brand {{brand}} (website: {{domain}}). What does it offer \
               and what is it known for? The brand describes itself with these \
               attributes: {{attributes}}. Say which of them your knowledge confirms, \
               which it does not mention, and anything you believe is inaccurate.",
    },
    Template {
        id: "brand_battle",
        pipeline: PipelineType::BrandBattle,
        text: "Head to head: {{brand}} versus {{competitor}} in {{market}}. Score each \
               brand from 0 to 100 on overall quality, trust and value, name the \
               winner, and explain your reasoning.",
    },
    Template {
        id: "unified_kpi",
        pipeline: PipelineType::UnifiedKpi,
        text: "Assess how well this {{page_category}} page of {{brand}} would serve as \
               a source for an AI answer engine.\nURL: {{url}}\nPage signals: \
               {{page_summary}}\nScore authority, freshness, structure and brand \
               alignment from 0 to 100, list concrete issues, and say whether the page \
               carries publication or update dates.",
    },
    Template {
        id: "unified_kpi_project",
        pipeline: PipelineType::UnifiedKpi,
        text: "Assess the online presence of {{brand}} (website: {{domain}}) in \
               {{market}} as a source for AI answer engines. Its stated attributes are: \
               {{attributes}}. Score authority, freshness, structure and brand \
               alignment from 0 to 100, list concrete issues, and say whether you saw \
               publication or update dates.",
    },
];

fn find_template(template_id: &str) -> Result<&'static Template, TemplateError> {
    TEMPLATES
        .iter()
        .find(|t| t.id == template_id)
        .ok_or_else(|| TemplateError::TemplateNotFound(template_id.to_string()))
}

/// Substitute every `{{variable}}` in the named template.
///
/// # Errors
///
/// - [`TemplateError::TemplateNotFound`] for an unknown id.
/// - [`TemplateError::MissingVariable`] for the first placeholder with no value
///   in `context`.
pub fn render(template_id: &str, context: &BTreeMap<String, String>) -> Result<String, TemplateError> {
    let template = find_template(template_id)?;

    if let Some(missing) = PLACEHOLDER
        .captures_iter(template.text)
        .filter_map(|cap| cap.get(1))
        .find(|name| !context.contains_key(name.as_str()))
    {
        return Err(TemplateError::MissingVariable {
            template: template_id.to_string(),
            variable: missing.as_str().to_string(),
        });
    }

    let rendered = PLACEHOLDER.replace_all(template.text, |cap: &regex::Captures<'_>| {
        context.get(&cap[1]).cloned().unwrap_or_default()
    });
    Ok(rendered.into_owned())
}

/// One rendered prompt, ready to send to every selected model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptInstance {
    /// Stable hash of template id and rendered text.
    pub id: String,
    pub template_id: String,
    pub pipeline: PipelineType,
    pub text: String,
    pub context: BTreeMap<String, String>,
    /// Competitor for comparison/battle prompts, page URL for page-level KPI.
    pub subject: Option<String>,
}

impl PromptInstance {
    /// Render `template_id` with `context`.
    ///
    /// # Errors
    ///
    /// Same as [`render`].
    pub fn new(
        template_id: &str,
        context: BTreeMap<String, String>,
        subject: Option<String>,
    ) -> Result<Self, TemplateError> {
        let template = find_template(template_id)?;
        let text = render(template_id, &context)?;
        Ok(Self {
            id: prompt_id(template_id, &text),
            template_id: template_id.to_string(),
            pipeline: template.pipeline,
            text,
            context,
            subject,
        })
    }

    /// The text a provider actually receives: the rendered prompt followed by
    /// the pipeline's format instructions.
    #[must_use]
    pub fn sent_text(&self) -> String {
        schema_for(self.pipeline).append_to(&self.text)
    }
}

fn prompt_id(template_id: &str, text: &str) -> String {
    let digest = Sha256::digest(format!("{template_id}\n{text}").as_bytes());
    let hex = format!("{digest:x}");
    hex[..16].to_string()
}

fn base_context(project: &ProjectContext) -> BTreeMap<String, String> {
    let attributes = if project.brand.attributes.is_empty() {
        NO_ATTRIBUTES.to_string()
    } else {
        project.brand.attributes.join(", ")
    };
    BTreeMap::from([
        ("brand".to_string(), project.brand.name.clone()),
        (
            "market".to_string(),
            project
                .market
                .clone()
                .unwrap_or_else(|| DEFAULT_MARKET.to_string()),
        ),
        ("attributes".to_string(), attributes),
        (
            "domain".to_string(),
            project
                .brand
                .domain
                .clone()
                .unwrap_or_else(|| UNKNOWN_DOMAIN.to_string()),
        ),
    ])
}

fn with_var(base: &BTreeMap<String, String>, pairs: &[(&str, String)]) -> BTreeMap<String, String> {
    let mut context = base.clone();
    for (key, value) in pairs {
        context.insert((*key).to_string(), value.clone());
    }
    context
}

fn page_summary(page: &PageSignals) -> String {
    let schema = if page.structure.schema_types.is_empty() {
        "none".to_string()
    } else {
        page.structure.schema_types.join(", ")
    };
    let date = |d: Option<DateTime<Utc>>| {
        d.map_or_else(|| "unknown".to_string(), |d| d.format("%Y-%m-%d").to_string())
    };
    format!(
        "{} words, {} citations, author {}, {} headings ({} h1), schema types: {schema}, \
         published {}, modified {}, {} brand mentions, {} Q&A blocks, {} lists, {} tables",
        page.content.word_count,
        page.content.citation_count,
        if page.content.author_present { "named" } else { "not named" },
        page.structure.heading_count,
        page.structure.h1_count,
        date(page.freshness.published_at),
        date(page.freshness.modified_at),
        page.brand.mention_count,
        page.snippet.qa_blocks,
        page.snippet.list_count,
        page.snippet.table_count,
    )
}

/// Render the fixed prompt battery for a project.
///
/// One spontaneous prompt per category, one sentiment and one accuracy
/// prompt, a comparison and a brand battle per competitor, and a unified-KPI
/// prompt per page (or one project-level prompt when there are no pages).
/// A template that fails to render is skipped with a warning.
#[must_use]
pub fn build_prompt_battery(project: &ProjectContext) -> Vec<PromptInstance> {
    let base = base_context(project);
    let mut planned: Vec<(&str, BTreeMap<String, String>, Option<String>)> = Vec::new();

    if project.categories.is_empty() {
        tracing::warn!(
            project = %project.id,
            "project has no categories; no spontaneous prompts will be sent"
        );
    }
    for category in &project.categories {
        planned.push((
            "spontaneous",
            with_var(&base, &[("category", category.clone())]),
            None,
        ));
    }

    planned.push(("sentiment", base.clone(), None));
    planned.push(("accuracy", base.clone(), None));

    for competitor in &project.competitors {
        let context = with_var(&base, &[("competitor", competitor.clone())]);
        planned.push(("comparison", context.clone(), Some(competitor.clone())));
        planned.push(("brand_battle", context, Some(competitor.clone())));
    }

    if project.pages.is_empty() {
        planned.push(("unified_kpi_project", base.clone(), None));
    } else {
        for page in &project.pages {
            let context = with_var(
                &base,
                &[
                    ("url", page.url.clone()),
                    ("page_category", page.category.to_string()),
                    ("page_summary", page_summary(page)),
                ],
            );
            planned.push(("unified_kpi", context, Some(page.url.clone())));
        }
    }

    planned
        .into_iter()
        .filter_map(|(template_id, context, subject)| {
            match PromptInstance::new(template_id, context, subject) {
                Ok(prompt) => Some(prompt),
                Err(e) => {
                    tracing::warn!(
                        project = %project.id,
                        template = template_id,
                        error = %e,
                        "skipping prompt that failed to render"
                    );
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "templates_test.rs"]
mod tests;
