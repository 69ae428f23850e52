use crate::scoring::blend;
use serde::{Deserialize, Serialize};
use sitelens_common::{CriteriaScores, Section};
use sitelens_llm::review::{ComparisonSummary, DesignReview, WebsiteReview};
use sitelens_storage::{HostedImage, StoredShot};
use sitelens_vision::ClipScore;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// One site's result for one section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionEntry {
    pub name: String,
    /// Public screenshot path, e.g. `screenshots/shop/shop_header.png`.
    pub path: String,
    pub score: f64,
    #[serde(default)]
    pub clip_score: Option<f64>,
    #[serde(default)]
    pub gemini_score: Option<f64>,
    pub criteria: CriteriaScores,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gemini_strengths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gemini_weaknesses: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gemini_recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudinary_url: Option<String>,
    /// Full-page entries carry the site's whole design review.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<WebsiteReview>,
}

/// Per-site roll-up across sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSummary {
    pub name: String,
    pub header: Option<f64>,
    pub main: Option<f64>,
    pub footer: Option<f64>,
    pub full: Option<f64>,
    /// Mean of the section scores that exist.
    pub overall: f64,
}

impl SiteSummary {
    pub fn get(&self, section: Section) -> Option<f64> {
        match section {
            Section::Header => self.header,
            Section::Main => self.main,
            Section::Footer => self.footer,
            Section::Full => self.full,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    #[serde(default)]
    pub header: Vec<SectionEntry>,
    #[serde(default)]
    pub main: Vec<SectionEntry>,
    #[serde(default)]
    pub footer: Vec<SectionEntry>,
    #[serde(default)]
    pub full: Vec<SectionEntry>,
    #[serde(default)]
    pub websites: Vec<WebsiteReview>,
    #[serde(default)]
    pub comparison: ComparisonSummary,
    #[serde(default)]
    pub ranking: Vec<SiteSummary>,
    #[serde(default)]
    pub best: BTreeMap<Section, String>,
}

impl ComparisonReport {
    pub fn section(&self, section: Section) -> &[SectionEntry] {
        match section {
            Section::Header => &self.header,
            Section::Main => &self.main,
            Section::Footer => &self.footer,
            Section::Full => &self.full,
        }
    }

    fn section_mut(&mut self, section: Section) -> &mut Vec<SectionEntry> {
        match section {
            Section::Header => &mut self.header,
            Section::Main => &mut self.main,
            Section::Footer => &mut self.footer,
            Section::Full => &mut self.full,
        }
    }

    pub fn is_empty(&self) -> bool {
        Section::ALL.iter().all(|s| self.section(*s).is_empty())
    }
}

/// Everything gathered for one site before scoring is combined.
#[derive(Debug, Clone, Default)]
pub struct SiteResults {
    pub name: String,
    pub shots: BTreeMap<Section, StoredShot>,
    pub clip: BTreeMap<Section, ClipScore>,
    pub hosted: BTreeMap<Section, HostedImage>,
}

fn by_score_then_name(a_score: f64, a_name: &str, b_score: f64, b_name: &str) -> Ordering {
    b_score
        .partial_cmp(&a_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a_name.cmp(b_name))
}

fn entry_for(
    site: &SiteResults,
    section: Section,
    review: Option<&WebsiteReview>,
    clip_weight: f64,
) -> Option<SectionEntry> {
    let shot = site.shots.get(&section)?;
    let clip = site.clip.get(&section);
    let clip_score = clip.map(|c| c.normalized);
    let gemini_score = review.and_then(|r| r.section_score(section));

    let Some(score) = blend(clip_score, gemini_score, clip_weight) else {
        tracing::debug!(site = %site.name, %section, "no score available; entry dropped");
        return None;
    };

    let criteria = clip
        .map(|c| c.criteria)
        .unwrap_or_else(|| CriteriaScores::uniform(score));
    let section_review = review.and_then(|r| r.section(section));

    Some(SectionEntry {
        name: site.name.clone(),
        path: shot.public_path.clone(),
        score,
        clip_score,
        gemini_score,
        criteria,
        gemini_strengths: section_review
            .map(|s| s.strengths.clone())
            .unwrap_or_default(),
        gemini_weaknesses: section_review
            .map(|s| s.weaknesses.clone())
            .unwrap_or_default(),
        gemini_recommendations: section_review
            .map(|s| s.recommendations.clone())
            .unwrap_or_default(),
        cloudinary_url: site.hosted.get(&section).map(|h| h.url.clone()),
        details: match section {
            Section::Full => review.cloned(),
            _ => None,
        },
    })
}

/// Combine per-site CLIP scores and the design review into the ranked report.
pub fn assemble_report(
    sites: &[SiteResults],
    review: Option<&DesignReview>,
    clip_weight: f64,
) -> ComparisonReport {
    let mut report = ComparisonReport::default();
    let names: Vec<&str> = sites.iter().map(|s| s.name.as_str()).collect();
    let site_reviews: Vec<Option<&WebsiteReview>> = (0..sites.len())
        .map(|position| review.and_then(|r| r.review_for(&names, position)))
        .collect();

    for section in Section::ALL {
        let entries = report.section_mut(section);
        for (site, site_review) in sites.iter().zip(&site_reviews) {
            if let Some(entry) = entry_for(site, section, *site_review, clip_weight) {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| by_score_then_name(a.score, &a.name, b.score, &b.name));
        if let Some(top) = entries.first() {
            let name = top.name.clone();
            report.best.insert(section, name);
        }
    }

    let mut ranking: Vec<SiteSummary> = sites
        .iter()
        .filter_map(|site| {
            let score_of = |section: Section| {
                report
                    .section(section)
                    .iter()
                    .find(|e| e.name == site.name)
                    .map(|e| e.score)
            };
            let summary = SiteSummary {
                name: site.name.clone(),
                header: score_of(Section::Header),
                main: score_of(Section::Main),
                footer: score_of(Section::Footer),
                full: score_of(Section::Full),
                overall: 0.0,
            };
            let present: Vec<f64> = Section::ALL
                .iter()
                .filter_map(|s| summary.get(*s))
                .collect();
            if present.is_empty() {
                return None;
            }
            let overall = present.iter().sum::<f64>() / present.len() as f64;
            Some(SiteSummary { overall, ..summary })
        })
        .collect();
    ranking.sort_by(|a, b| by_score_then_name(a.overall, &a.name, b.overall, &b.name));
    report.ranking = ranking;

    if let Some(review) = review {
        report.websites = review.websites.clone();
        report.comparison = review.comparison.clone();
    }
    if report.comparison.is_empty() {
        report.comparison.best_overall = report.ranking.first().map(|s| s.name.clone());
        report.comparison.best_header = report.best.get(&Section::Header).cloned();
        report.comparison.best_main_content = report.best.get(&Section::Main).cloned();
        report.comparison.best_footer = report.best.get(&Section::Footer).cloned();
    }

    report
}

/// Plain-text table of section scores per site, ranked.
pub fn summary_table(report: &ComparisonReport) -> String {
    let cell = |v: Option<f64>| v.map(|s| format!("{s:.3}")).unwrap_or_else(|| "-".into());
    let name_width = report
        .ranking
        .iter()
        .map(|s| s.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Website".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<name_width$} | {:>7} | {:>7} | {:>7} | {:>7} | {:>7}",
        "Website",
        Section::Header.label(),
        Section::Main.label(),
        Section::Footer.label(),
        Section::Full.label(),
        "OVERALL"
    );
    let _ = writeln!(out, "{}", "-".repeat(name_width + 50));
    for site in &report.ranking {
        let _ = writeln!(
            out,
            "{:<name_width$} | {:>7} | {:>7} | {:>7} | {:>7} | {:>7.3}",
            site.name,
            cell(site.header),
            cell(site.main),
            cell(site.footer),
            cell(site.full),
            site.overall
        );
    }
    out
}
