use sitelens_common::{slugify, Result, Section, SiteLensError};
use std::path::{Path, PathBuf};

/// URL prefix the server mounts the screenshot directory under.
pub const PUBLIC_PREFIX: &str = "screenshots";

/// A section screenshot written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredShot {
    pub section: Section,
    pub path: PathBuf,
    /// Relative URL path served by `/screenshots/*`.
    pub public_path: String,
}

/// Local screenshot layout: `<root>/<slug>/<slug>_<section>.png`.
#[derive(Debug, Clone)]
pub struct ScreenshotStore {
    root: PathBuf,
}

impl ScreenshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slug_for(name: &str) -> Result<String> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(SiteLensError::Validation(format!(
                "website name {name:?} has no usable characters"
            )));
        }
        Ok(slug)
    }

    fn file_name(slug: &str, section: Section) -> String {
        format!("{slug}_{}.png", section.as_str())
    }

    pub fn section_path(&self, name: &str, section: Section) -> Result<PathBuf> {
        let slug = Self::slug_for(name)?;
        Ok(self.root.join(&slug).join(Self::file_name(&slug, section)))
    }

    pub fn public_path(&self, name: &str, section: Section) -> Result<String> {
        let slug = Self::slug_for(name)?;
        Ok(format!(
            "{PUBLIC_PREFIX}/{slug}/{}",
            Self::file_name(&slug, section)
        ))
    }

    /// Write one section's PNG, creating the site directory as needed.
    pub async fn save(&self, name: &str, section: Section, png: &[u8]) -> Result<StoredShot> {
        let path = self.section_path(name, section)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, png).await?;
        tracing::debug!(
            target: "storage.local",
            site = %name,
            %section,
            path = %path.display(),
            bytes = png.len(),
            "screenshot saved"
        );
        Ok(StoredShot {
            section,
            public_path: self.public_path(name, section)?,
            path,
        })
    }
}
