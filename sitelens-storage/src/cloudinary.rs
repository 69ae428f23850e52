use crate::host::{HostedImage, ImageHost};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sitelens_common::{Result, SiteLensError};
use sitelens_config::CloudinaryConfig;
use sitelens_http::{HttpClient, RequestOpts};
use std::path::Path;
use std::time::Duration;

pub const CLOUDINARY_API_BASE: &str = "https://api.cloudinary.com/";
const DELIVERY_BASE: &str = "https://res.cloudinary.com";

/// Parameters sent with a request but never signed.
const UNSIGNED_PARAMS: [&str; 6] = [
    "file",
    "api_key",
    "resource_type",
    "cloud_name",
    "signature_algorithm",
    "signature",
];

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    #[serde(default)]
    secure_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    #[serde(default)]
    result: String,
}

/// Request signature: sorted `k=v` pairs joined by `&`, secret appended,
/// SHA-256, hex encoded.
pub fn sign(params: &[(String, String)], api_secret: &str) -> String {
    let mut signed: Vec<&(String, String)> = params
        .iter()
        .filter(|(k, v)| !UNSIGNED_PARAMS.contains(&k.as_str()) && !v.is_empty())
        .collect();
    signed.sort_by(|a, b| a.0.cmp(&b.0));

    let to_sign = signed
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

fn full_public_id(public_id: &str, folder: &str) -> String {
    match folder.trim_matches('/') {
        "" => public_id.to_string(),
        f => format!("{f}/{public_id}"),
    }
}

/// Signed Cloudinary REST client for image upload and deletion.
pub struct CloudinaryClient {
    http: HttpClient,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    folder: String,
}

impl CloudinaryClient {
    pub fn new(cloud_name: &str, api_key: &str, api_secret: &str) -> Result<Self> {
        let http = HttpClient::new(CLOUDINARY_API_BASE)
            .map_err(|e| SiteLensError::Config(e.to_string()))?
            .with_timeout(Duration::from_secs(60));
        Ok(Self {
            http,
            cloud_name: cloud_name.to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            folder: "website_screenshots".to_string(),
        })
    }

    pub fn from_config(config: &CloudinaryConfig) -> Result<Self> {
        Ok(Self::new(&config.cloud_name, &config.api_key, &config.api_secret)?
            .with_folder(&config.folder))
    }

    pub fn with_folder(mut self, folder: &str) -> Self {
        self.folder = folder.trim_matches('/').to_string();
        self
    }

    /// Point the client at a different API root (tests, proxies).
    pub fn with_api_base(mut self, base: &str) -> Result<Self> {
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        self.http = HttpClient::new(&base)
            .map_err(|e| SiteLensError::Config(e.to_string()))?
            .with_timeout(self.http.default_timeout)
            .with_retries(self.http.max_retries);
        Ok(self)
    }

    fn endpoint(&self, action: &str) -> String {
        format!("v1_1/{}/image/{action}", self.cloud_name)
    }

    /// Add timestamp, api key and signature to `params`.
    fn signed_form(&self, mut params: Vec<(String, String)>) -> Vec<(String, String)> {
        params.push((
            "timestamp".to_string(),
            chrono::Utc::now().timestamp().to_string(),
        ));
        let signature = sign(&params, &self.api_secret);
        params.push(("api_key".to_string(), self.api_key.clone()));
        params.push(("signature_algorithm".to_string(), "sha256".to_string()));
        params.push(("signature".to_string(), signature));
        params
    }

    fn storage_err(what: &str, e: impl std::fmt::Display) -> SiteLensError {
        SiteLensError::Storage(format!("{what}: {e}"))
    }
}

#[async_trait]
impl ImageHost for CloudinaryClient {
    async fn upload(&self, path: &Path, public_id: &str, folder: &str) -> Result<HostedImage> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SiteLensError::Storage(format!(
                    "File not found: {}",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        let data_uri = format!("data:{};base64,{}", mime_for(path), BASE64.encode(&bytes));

        let mut params = vec![
            ("public_id".to_string(), public_id.to_string()),
            ("overwrite".to_string(), "true".to_string()),
        ];
        let folder = folder.trim_matches('/');
        if !folder.is_empty() {
            params.push(("folder".to_string(), folder.to_string()));
        }
        let mut form = self.signed_form(params);
        form.push(("file".to_string(), data_uri));

        let resp: UploadResponse = self
            .http
            .post_form_opts(&self.endpoint("upload"), &form, RequestOpts::default())
            .await
            .map_err(|e| Self::storage_err("Cloudinary upload failed", e))?;

        let url = resp
            .secure_url
            .or(resp.url)
            .ok_or_else(|| SiteLensError::Storage("Cloudinary upload returned no URL".into()))?;

        tracing::info!(
            target: "storage.cloudinary",
            public_id = %resp.public_id,
            bytes = bytes.len(),
            "image uploaded"
        );
        Ok(HostedImage {
            public_id: resp.public_id,
            url,
        })
    }

    async fn delete(&self, public_id: &str, folder: &str) -> Result<()> {
        let form = self.signed_form(vec![(
            "public_id".to_string(),
            full_public_id(public_id, folder),
        )]);

        let resp: DestroyResponse = self
            .http
            .post_form_opts(&self.endpoint("destroy"), &form, RequestOpts::default())
            .await
            .map_err(|e| Self::storage_err("Cloudinary destroy failed", e))?;

        match resp.result.as_str() {
            "ok" => Ok(()),
            "not found" => {
                tracing::debug!(target: "storage.cloudinary", %public_id, "image already absent");
                Ok(())
            }
            other => Err(SiteLensError::Storage(format!(
                "Cloudinary destroy returned {other:?}"
            ))),
        }
    }

    fn url_for(&self, public_id: &str, folder: &str) -> String {
        format!(
            "{DELIVERY_BASE}/{}/image/upload/{}",
            self.cloud_name,
            full_public_id(public_id, folder)
        )
    }

    fn base_folder(&self) -> &str {
        &self.folder
    }
}
