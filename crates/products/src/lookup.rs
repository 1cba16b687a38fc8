//! Tagged product lookup: an identifier is either a product id or a barcode.

use stockroom_core::{DomainError, ProductId};

/// How a free-form product identifier should be resolved.
///
/// Id-shaped input (a UUID) is always treated as an id; anything else is a
/// barcode. The two lookups are never combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductLookup {
    Id(ProductId),
    Barcode(String),
}

impl ProductLookup {
    pub fn parse(identifier: &str) -> Result<Self, DomainError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(DomainError::validation("product identifier cannot be empty"));
        }
        match identifier.parse::<ProductId>() {
            Ok(id) => Ok(ProductLookup::Id(id)),
            Err(_) => Ok(ProductLookup::Barcode(identifier.to_string())),
        }
    }
}

impl core::fmt::Display for ProductLookup {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ProductLookup::Id(id) => write!(f, "id {id}"),
            ProductLookup::Barcode(code) => write!(f, "barcode {code}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_resolves_as_id() {
        let id = ProductId::new();
        assert_eq!(ProductLookup::parse(&id.to_string()).unwrap(), ProductLookup::Id(id));
    }

    #[test]
    fn anything_else_is_a_barcode() {
        assert_eq!(
            ProductLookup::parse(" 8690000000012 ").unwrap(),
            ProductLookup::Barcode("8690000000012".to_string())
        );
        // 24-hex strings are barcodes here, not ids.
        assert_eq!(
            ProductLookup::parse("65a1f0c2e4b0a1b2c3d4e5f6").unwrap(),
            ProductLookup::Barcode("65a1f0c2e4b0a1b2c3d4e5f6".to_string())
        );
    }

    #[test]
    fn blank_identifier_is_rejected() {
        assert!(matches!(
            ProductLookup::parse("  "),
            Err(DomainError::Validation(_))
        ));
    }
}
