//! Inbound order payload, as delivered by the e-commerce platform.

use serde::Deserialize;

/// Status of an order that is paid and ready to fulfill.
pub const READY_TO_FULFILL: &str = "processing";

/// Identifier sent either as a JSON number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExternalRef {
    Number(u64),
    Text(String),
}

impl core::fmt::Display for ExternalRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ExternalRef::Number(n) => write!(f, "{n}"),
            ExternalRef::Text(s) => f.write_str(s.trim()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LineItem {
    pub product_id: ExternalRef,
    pub quantity: i64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundOrder {
    pub id: ExternalRef,
    pub status: String,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

impl InboundOrder {
    /// Exact, case-sensitive match on the storefront's status tag.
    pub fn is_ready_to_fulfill(&self) -> bool {
        self.status == READY_TO_FULFILL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_may_be_numbers_or_strings() {
        let order: InboundOrder = serde_json::from_str(
            r#"{"id": 731, "status": "processing",
                "line_items": [{"product_id": 15, "quantity": 2}, {"product_id": "sku-9", "quantity": 1}]}"#,
        )
        .unwrap();

        assert_eq!(order.id.to_string(), "731");
        assert!(order.is_ready_to_fulfill());
        assert_eq!(order.line_items[0].product_id.to_string(), "15");
        assert_eq!(order.line_items[1].product_id, ExternalRef::Text("sku-9".to_string()));
    }

    #[test]
    fn other_statuses_are_not_ready() {
        let order: InboundOrder =
            serde_json::from_str(r#"{"id": "A-1", "status": "on-hold"}"#).unwrap();
        assert!(!order.is_ready_to_fulfill());
        assert!(order.line_items.is_empty());
    }

    #[test]
    fn status_match_is_exact() {
        for status in ["PROCESSING", "Processing", " processing", "processing "] {
            let order = InboundOrder {
                id: ExternalRef::Text("A-2".to_string()),
                status: status.to_string(),
                line_items: Vec::new(),
            };
            assert!(!order.is_ready_to_fulfill(), "{status:?} should not be ready");
        }
    }
}
