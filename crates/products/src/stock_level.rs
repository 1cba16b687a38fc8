//! Stock as it appears in import payloads.
//!
//! Stock used to be stored per sales channel. Older exports still carry that
//! breakdown; it is collapsed into a single total on the way in.

use serde::{Deserialize, Deserializer};

/// Either a total, or the legacy per-channel breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StockLevel {
    Total(i64),
    PerChannel {
        #[serde(default)]
        pharmacy: i64,
        #[serde(default)]
        farmazon: i64,
        #[serde(default)]
        woocommerce: i64,
    },
}

impl StockLevel {
    pub fn total(self) -> i64 {
        match self {
            StockLevel::Total(n) => n,
            StockLevel::PerChannel {
                pharmacy,
                farmazon,
                woocommerce,
            } => pharmacy + farmazon + woocommerce,
        }
    }
}

pub(crate) fn deserialize_stock_total<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    StockLevel::deserialize(deserializer).map(StockLevel::total)
}
