//! Token metadata documents
//!
//! Any identifier gets a document; there is no check that the token exists.

use serde::Serialize;

pub const DEFAULT_IMAGE_BASE_URL: &str =
    "https://raw.githubusercontent.com/Aravinthrselva/BuidlerNFTCollection/master/my-app/public/cryptoDevs";

pub const DEFAULT_DESCRIPTION: &str = "Buidlers is a collection for developers in Web3";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenMetadata {
    pub name: String,
    pub description: String,
    pub image: String,
}

#[derive(Debug, Clone)]
pub struct MetadataTemplate {
    pub collection_name: String,
    pub description: String,
    pub image_base_url: String,
}

impl MetadataTemplate {
    pub fn new(collection_name: &str, image_base_url: &str) -> Self {
        Self {
            collection_name: collection_name.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            image_base_url: image_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn for_token(&self, token_id: &str) -> TokenMetadata {
        TokenMetadata {
            name: format!("{} #{}", self.collection_name, token_id),
            description: self.description.clone(),
            image: format!("{}/{}.svg", self.image_base_url, token_id),
        }
    }
}
