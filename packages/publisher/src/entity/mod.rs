pub mod article;
pub mod asset_ref;
pub mod organization;
