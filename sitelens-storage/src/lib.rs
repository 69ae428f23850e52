//! Screenshot persistence and remote image hosting.
//!
//! - [`ScreenshotStore`]: the on-disk `<root>/<slug>/<slug>_<section>.png` layout
//! - [`ImageHost`]: remote mirror abstraction, implemented by [`CloudinaryClient`]
//! - [`upload_site`]: mirror every stored section of one site
pub mod cloudinary;
pub mod host;
pub mod store;

pub use cloudinary::CloudinaryClient;
pub use host::{upload_site, HostedImage, ImageHost};
pub use store::{ScreenshotStore, StoredShot, PUBLIC_PREFIX};
