use serde::{Deserialize, Serialize};

use stockroom_core::DomainError;

/// Sales surface a sale is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesChannel {
    /// Counter sale in the shop.
    #[serde(alias = "pharmacy")]
    InStore,
    /// Secondary storefront.
    #[serde(alias = "farmazon")]
    Marketplace,
    /// External e-commerce platform (webhook-driven orders).
    #[serde(alias = "woocommerce")]
    External,
}

impl SalesChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SalesChannel::InStore => "in_store",
            SalesChannel::Marketplace => "marketplace",
            SalesChannel::External => "external",
        }
    }
}

impl core::fmt::Display for SalesChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for SalesChannel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "in_store" | "pharmacy" => Ok(SalesChannel::InStore),
            "marketplace" | "farmazon" => Ok(SalesChannel::Marketplace),
            "external" | "woocommerce" => Ok(SalesChannel::External),
            other => Err(DomainError::validation(format!(
                "unknown sales channel '{other}' (expected in_store, marketplace or external)"
            ))),
        }
    }
}
