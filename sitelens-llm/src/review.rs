//! Multi-site design review through a multimodal model.
//!
//! One request carries every site's full-page screenshot. The model answers
//! with a JSON document scoring each site's header, main content and footer,
//! plus visual improvement notes and a short comparison. Parsing is lenient:
//! models routinely return scores as strings, drop fields, or wrap the JSON in
//! a markdown fence.

use crate::traits::{InlineImage, LlmClient, LlmRequest};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sitelens_common::{Result, Section, SiteLensError};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Visual areas the review asks improvement notes for.
pub const IMPROVEMENT_AREAS: [&str; 7] = [
    "color_scheme",
    "typography",
    "layout",
    "visual_hierarchy",
    "whitespace",
    "responsive_design",
    "accessibility",
];

/// One site handed to the reviewer.
#[derive(Debug, Clone)]
pub struct ReviewSubject {
    pub name: String,
    pub url: String,
    pub image: InlineImage,
    /// Public path of the full-page screenshot, copied into the review.
    pub screenshot: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignReview {
    #[serde(default, deserialize_with = "lenient_websites")]
    pub websites: Vec<WebsiteReview>,
    #[serde(default, deserialize_with = "lenient")]
    pub comparison: ComparisonSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    #[serde(default, deserialize_with = "lenient_text")]
    pub best_overall: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub best_header: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub best_main_content: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub best_footer: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub summary: Option<String>,
}

impl ComparisonSummary {
    pub fn is_empty(&self) -> bool {
        self.best_overall.is_none()
            && self.best_header.is_none()
            && self.best_main_content.is_none()
            && self.best_footer.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebsiteReview {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient_score")]
    pub overall_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub sections: SectionReviews,
    #[serde(default, deserialize_with = "lenient_areas")]
    pub vision_improvements: BTreeMap<String, ImprovementArea>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub screenshot: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionReviews {
    #[serde(default, deserialize_with = "lenient")]
    pub header: Option<SectionReview>,
    #[serde(default, deserialize_with = "lenient")]
    pub main_content: Option<SectionReview>,
    #[serde(default, deserialize_with = "lenient")]
    pub footer: Option<SectionReview>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionReview {
    #[serde(default, deserialize_with = "lenient_score")]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub strengths: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub weaknesses: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImprovementArea {
    #[serde(default, deserialize_with = "lenient_string")]
    pub current_analysis: String,
    #[serde(default, deserialize_with = "lenient_list")]
    pub recommendations: Vec<String>,
}

impl WebsiteReview {
    pub fn section(&self, section: Section) -> Option<&SectionReview> {
        match section {
            Section::Header => self.sections.header.as_ref(),
            Section::Main => self.sections.main_content.as_ref(),
            Section::Footer => self.sections.footer.as_ref(),
            Section::Full => None,
        }
    }

    /// Review score for `section` rescaled to `[0, 1]`. The full page uses
    /// `overall_score`.
    pub fn section_score(&self, section: Section) -> Option<f64> {
        let raw = match section {
            Section::Full => self.overall_score,
            other => self.section(other).and_then(|s| s.score),
        };
        raw.map(rescale_score)
    }
}

fn same_site(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

impl DesignReview {
    /// Find a site's review by display name, ignoring case.
    pub fn website(&self, name: &str) -> Option<&WebsiteReview> {
        self.websites.iter().find(|w| same_site(&w.name, name))
    }

    /// Index of the review for `names[position]`, where `names` lists the
    /// reviewed sites in prompt order.
    ///
    /// A review whose name matches wins. Otherwise the review at the same
    /// position is taken, provided its name belongs to none of `names`:
    /// models shorten or decorate names ("Amazon.in") but keep the order.
    pub fn review_index<S: AsRef<str>>(&self, names: &[S], position: usize) -> Option<usize> {
        let wanted = names.get(position)?.as_ref();
        if let Some(idx) = self.websites.iter().position(|w| same_site(&w.name, wanted)) {
            return Some(idx);
        }
        let candidate = self.websites.get(position)?;
        if names.iter().any(|n| same_site(&candidate.name, n.as_ref())) {
            return None;
        }
        Some(position)
    }

    pub fn review_for<S: AsRef<str>>(&self, names: &[S], position: usize) -> Option<&WebsiteReview> {
        self.review_index(names, position)
            .and_then(|idx| self.websites.get(idx))
    }
}

/// Map a 1-10 review score onto `[0, 1]`.
pub fn rescale_score(score: f64) -> f64 {
    score.clamp(0.0, 10.0) / 10.0
}

fn number_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").ok())
        .as_ref()
}

fn fence_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").ok())
        .as_ref()
}

/// Null or a value of the wrong shape becomes `T::default()`.
fn lenient<'de, D, T>(de: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let v = Value::deserialize(de)?;
    Ok(serde_json::from_value(v).unwrap_or_default())
}

fn lenient_string<'de, D>(de: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(de)?;
    Ok(match v {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

// One malformed site must not cost the others their review.
fn lenient_websites<'de, D>(de: D) -> std::result::Result<Vec<WebsiteReview>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(de)?;
    Ok(match v {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

fn lenient_areas<'de, D>(de: D) -> std::result::Result<BTreeMap<String, ImprovementArea>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(de)?;
    Ok(match v {
        Value::Object(map) => map
            .into_iter()
            .filter_map(|(area, item)| serde_json::from_value(item).ok().map(|a| (area, a)))
            .collect(),
        _ => BTreeMap::new(),
    })
}

fn lenient_score<'de, D>(de: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(de)?;
    Ok(match v {
        Value::Number(n) => n.as_f64(),
        // "8", "8.5", "8/10"
        Value::String(s) => number_re()
            .and_then(|re| re.find(&s))
            .and_then(|m| m.as_str().parse::<f64>().ok()),
        _ => None,
    })
}

fn lenient_list<'de, D>(de: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(de)?;
    Ok(match v {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s),
                Value::Null => None,
                Value::String(_) => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    })
}

fn lenient_text<'de, D>(de: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(de)?;
    Ok(match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

fn website_template(subject: &ReviewSubject) -> String {
    let section = r#"{
                "score": <score from 1-10>,
                "strengths": ["<strength1>", "<strength2>", ...],
                "weaknesses": ["<weakness1>", "<weakness2>", ...],
                "recommendations": ["<recommendation1>", "<recommendation2>", ...]
            }"#;
    let improvements = IMPROVEMENT_AREAS
        .iter()
        .map(|area| {
            let label = area.replace('_', " ");
            format!(
                r#"            "{area}": {{
                "current_analysis": "<analysis of current {label}>",
                "recommendations": ["<specific {label} improvement1>", "<specific {label} improvement2>", ...]
            }}"#
            )
        })
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        r#"    {{
        "name": {name},
        "url": {url},
        "overall_score": <score from 1-10>,
        "sections": {{
            "header": {section},
            "main_content": {section},
            "footer": {section}
        }},
        "vision_improvements": {{
{improvements}
        }}
    }}"#,
        name = Value::String(subject.name.clone()),
        url = Value::String(subject.url.clone()),
    )
}

/// Build the comparison prompt. Screenshots are attached in `subjects` order.
pub fn build_review_prompt(category: &str, subjects: &[ReviewSubject]) -> String {
    let names = subjects
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let templates = subjects
        .iter()
        .map(website_template)
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        r#"Compare the following {count} {category} websites: {names}.
One full-page screenshot is attached per website, in the order listed.

For each website, evaluate these key sections:
1. Header section
2. Main content section
3. Footer section

For each section of each website, provide:
- A score from 1-10
- Strengths (2-3 points)
- Weaknesses (2-3 points)
- Recommendations for improvement (1-2 points)

Additionally, for each website, provide detailed visual design improvement recommendations in these categories:
- Color Scheme: Analyze current colors and suggest specific improvements with color codes
- Typography: Evaluate text readability and suggest font improvements
- Layout: Analyze spacing, alignment and suggest layout improvements
- Visual Hierarchy: Evaluate importance signaling and suggest visual hierarchy improvements
- Whitespace: Analyze use of whitespace and suggest improvements
- Responsive Design: Assess adaptability to different screen sizes
- Accessibility: Evaluate color contrast, text size, and suggest accessibility improvements

Also provide an overall score from 1-10 for each website.

Return your response in the following JSON format:
{{
  "websites": [
{templates}
  ],
  "comparison": {{
    "best_overall": "<website name>",
    "best_header": "<website name>",
    "best_main_content": "<website name>",
    "best_footer": "<website name>",
    "summary": "<brief comparison summary>"
  }}
}}

Provide only the JSON with no other text."#,
        count = subjects.len(),
    )
}

/// Pull the JSON document out of a model reply: a fenced ```json block, else
/// the outermost `{...}` span, else the trimmed text.
pub fn extract_json_block(text: &str) -> &str {
    if let Some(inner) = fence_re()
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
    {
        return inner.as_str();
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text.trim(),
    }
}

pub fn parse_review(text: &str) -> Result<DesignReview> {
    let block = extract_json_block(text);
    serde_json::from_str::<DesignReview>(block).map_err(|e| {
        let snippet: String = block.chars().take(300).collect();
        SiteLensError::Llm(format!(
            "Failed to parse review JSON: {e}; response starts with: {snippet}"
        ))
    })
}

/// Run one review call covering every subject.
pub async fn review_websites(
    llm: &dyn LlmClient,
    category: &str,
    subjects: &[ReviewSubject],
) -> Result<DesignReview> {
    if subjects.is_empty() {
        return Err(SiteLensError::Validation(
            "No website screenshots to review".to_string(),
        ));
    }

    let mut request = LlmRequest::new(build_review_prompt(category, subjects))
        .with_system_prompt(llm.default_review_system_prompt())
        .json();
    for subject in subjects {
        request = request.with_image(subject.image.clone());
    }

    let started = std::time::Instant::now();
    tracing::info!(
        model = llm.model_name(),
        sites = subjects.len(),
        %category,
        "review.request"
    );
    let response = llm.generate(&request).await?;
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        tokens_used = ?response.tokens_used,
        "review.response"
    );

    let mut review = parse_review(&response.text)?;
    let names: Vec<&str> = subjects.iter().map(|s| s.name.as_str()).collect();
    for (position, subject) in subjects.iter().enumerate() {
        let Some(site) = review
            .review_index(&names, position)
            .and_then(|idx| review.websites.get_mut(idx))
        else {
            tracing::warn!(site = %subject.name, "review.site_missing");
            continue;
        };
        // Key the review by the submitted name.
        site.name = subject.name.clone();
        if site.url.is_empty() {
            site.url = subject.url.clone();
        }
        if site.screenshot.is_none() {
            site.screenshot = subject.screenshot.clone();
        }
    }
    Ok(review)
}
