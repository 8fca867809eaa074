//! Provider identity primitives.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// The cloud platform a provider ingests billing data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Aws,
    Azure,
    Gcp,
    Ocp,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown provider type: {0}")]
pub struct ProviderTypeParseError(String);

impl FromStr for ProviderType {
    type Err = ProviderTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aws" => Ok(ProviderType::Aws),
            "azure" => Ok(ProviderType::Azure),
            "gcp" => Ok(ProviderType::Gcp),
            "ocp" => Ok(ProviderType::Ocp),
            other => Err(ProviderTypeParseError(other.to_string())),
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderType::Aws => write!(f, "aws"),
            ProviderType::Azure => write!(f, "azure"),
            ProviderType::Gcp => write!(f, "gcp"),
            ProviderType::Ocp => write!(f, "ocp"),
        }
    }
}

/// A billing source with a stable unique identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub uuid: Uuid,
    pub provider_type: ProviderType,
}

impl Provider {
    pub fn new(uuid: Uuid, provider_type: ProviderType) -> Self {
        Provider {
            uuid,
            provider_type,
        }
    }
}
