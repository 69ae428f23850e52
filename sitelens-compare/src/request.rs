use serde::{Deserialize, Serialize};
use sitelens_common::{Result, SiteLensError, WebsiteInput};
use std::collections::HashSet;

pub const DEFAULT_CATEGORY: &str = "ecommerce";

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// Body of a comparison request.
///
/// ```
/// use sitelens_compare::CompareRequest;
///
/// let req: CompareRequest = serde_json::from_str(
///     r#"{"websites": [{"name": "Shop", "url": "https://shop.example"}]}"#,
/// ).unwrap();
/// assert_eq!(req.category, "ecommerce");
/// assert!(req.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompareRequest {
    #[serde(default)]
    pub websites: Vec<WebsiteInput>,
    #[serde(default = "default_category")]
    pub category: String,
}

impl CompareRequest {
    pub fn new(websites: Vec<WebsiteInput>, category: impl Into<String>) -> Self {
        Self {
            websites,
            category: category.into(),
        }
    }

    /// Trimmed category, falling back to the default when blank.
    pub fn category(&self) -> &str {
        match self.category.trim() {
            "" => DEFAULT_CATEGORY,
            c => c,
        }
    }

    /// At least one website, each valid, no two sharing a slug (they would
    /// overwrite each other's screenshots).
    pub fn validate(&self) -> Result<()> {
        if self.websites.is_empty() {
            return Err(SiteLensError::Validation(
                "No websites provided".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for site in &self.websites {
            site.validate()?;
            if !seen.insert(site.slug()) {
                return Err(SiteLensError::Validation(format!(
                    "duplicate website name {:?}",
                    site.name
                )));
            }
        }
        Ok(())
    }
}
