use crate::store::StoredShot;
use async_trait::async_trait;
use sitelens_common::{slugify, Result, Section};
use std::collections::BTreeMap;
use std::path::Path;

/// An image stored on a remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostedImage {
    pub public_id: String,
    pub url: String,
}

/// Remote image hosting used to mirror screenshots.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload (overwriting) a local file as `<folder>/<public_id>`.
    async fn upload(&self, path: &Path, public_id: &str, folder: &str) -> Result<HostedImage>;

    async fn delete(&self, public_id: &str, folder: &str) -> Result<()>;

    /// Delivery URL for an already uploaded image.
    fn url_for(&self, public_id: &str, folder: &str) -> String;

    /// Folder every site's images are grouped under.
    fn base_folder(&self) -> &str;
}

/// Mirror a site's stored screenshots as `<base>/<slug>/<slug>_<section>`.
/// Failed sections are logged and left out of the result.
pub async fn upload_site(
    host: &dyn ImageHost,
    name: &str,
    shots: &[StoredShot],
) -> BTreeMap<Section, HostedImage> {
    let slug = slugify(name);
    let folder = match host.base_folder().trim_matches('/') {
        "" => slug.clone(),
        base => format!("{base}/{slug}"),
    };

    let mut hosted = BTreeMap::new();
    for shot in shots {
        let public_id = format!("{slug}_{}", shot.section.as_str());
        match host.upload(&shot.path, &public_id, &folder).await {
            Ok(image) => {
                tracing::debug!(
                    target: "storage.host",
                    site = %name,
                    section = %shot.section,
                    url = %image.url,
                    "screenshot mirrored"
                );
                hosted.insert(shot.section, image);
            }
            Err(e) => {
                tracing::warn!(
                    target: "storage.host",
                    site = %name,
                    section = %shot.section,
                    error = %e,
                    "screenshot upload failed; skipping"
                );
            }
        }
    }
    hosted
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitelens_common::SiteLensError;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHost {
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ImageHost for RecordingHost {
        async fn upload(&self, path: &Path, public_id: &str, folder: &str) -> Result<HostedImage> {
            self.calls
                .lock()
                .unwrap()
                .push((public_id.to_string(), folder.to_string()));
            if path.ends_with("broken.png") {
                return Err(SiteLensError::Storage("boom".into()));
            }
            Ok(HostedImage {
                public_id: format!("{folder}/{public_id}"),
                url: self.url_for(public_id, folder),
            })
        }

        async fn delete(&self, _public_id: &str, _folder: &str) -> Result<()> {
            Ok(())
        }

        fn url_for(&self, public_id: &str, folder: &str) -> String {
            format!("https://cdn.test/{folder}/{public_id}")
        }

        fn base_folder(&self) -> &str {
            "website_screenshots"
        }
    }

    fn shot(section: Section, file: &str) -> StoredShot {
        StoredShot {
            section,
            path: PathBuf::from(file),
            public_path: String::new(),
        }
    }

    #[tokio::test]
    async fn uploads_under_site_folder_and_skips_failures() {
        let host = RecordingHost::default();
        let shots = vec![
            shot(Section::Header, "shop_header.png"),
            shot(Section::Main, "broken.png"),
            shot(Section::Full, "shop_full.png"),
        ];

        let hosted = upload_site(&host, "Shop", &shots).await;

        assert_eq!(hosted.len(), 2);
        assert_eq!(
            hosted[&Section::Header].url,
            "https://cdn.test/website_screenshots/shop/shop_header"
        );
        assert!(!hosted.contains_key(&Section::Main));
        let calls = host.calls.lock().unwrap();
        assert_eq!(calls[2], ("shop_full".to_string(), "website_screenshots/shop".to_string()));
    }
}
