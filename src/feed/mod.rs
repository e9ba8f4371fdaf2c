pub mod download;
pub mod github;
pub mod version;

pub use download::download;
pub use github::{client, resolve_latest_asset, ResolvedAsset};
