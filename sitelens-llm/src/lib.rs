//! Hosted multimodal LLM integration for SiteLens.
//!
//! This crate exposes a provider-agnostic [`traits::LlmClient`] interface, the
//! Gemini implementation, and the [`review`] workflow that scores several
//! websites from their full-page screenshots in a single call.
//!
//! # Examples
//! ```no_run
//! use sitelens_common::Result;
//! use sitelens_llm::gemini::GeminiClient;
//! use sitelens_llm::review::{review_websites, ReviewSubject};
//! use sitelens_llm::{encode_for_llm, DEFAULT_GEMINI_MODEL};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let client = GeminiClient::new("api-key".into(), DEFAULT_GEMINI_MODEL.into())?;
//! let png = std::fs::read("screenshots/shop/shop_full.png")?;
//! let subjects = vec![ReviewSubject {
//!     name: "Shop".into(),
//!     url: "https://shop.example".into(),
//!     image: encode_for_llm(&png)?,
//!     screenshot: None,
//! }];
//! let review = review_websites(&client, "ecommerce", &subjects).await?;
//! println!("{:?}", review.comparison.best_overall);
//! # Ok(())
//! # }
//! ```
pub mod encode;
pub mod gemini;
pub mod review;
pub mod traits;

pub use encode::encode_for_llm;
pub use traits::{InlineImage, LlmClient, LlmRequest, LlmResponse};

/// Default model for design reviews.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
