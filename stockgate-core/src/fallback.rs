//! Static fallback catalog
//!
//! Substitute stock records served when the inventory backend is
//! unreachable. Quantities are always zero and the safety level unknown;
//! the record only restores the descriptive metadata a caller needs to
//! recognize the product. Every record carries a provenance note marking
//! it non-authoritative.

use crate::stock::StockRecord;

/// Note attached to every fallback record.
pub const FALLBACK_NOTE: &str = "Fallback data - inventory service unavailable";

const UNKNOWN_SAFETY_LEVEL: &str = "UNKNOWN";
const DEFAULT_WAREHOUSE: &str = "BOD-01";

/// Deterministic lookup table of substitute records.
///
/// Well-known product ids carry richer static metadata; anything else
/// degrades to a minimal generic record. Same input, same output, no side
/// effects.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackCatalog;

impl FallbackCatalog {
    pub fn new() -> Self {
        Self
    }

    pub fn lookup(&self, product_id: &str, warehouse_id: Option<&str>) -> StockRecord {
        let warehouse = warehouse_id.unwrap_or(DEFAULT_WAREHOUSE).to_string();

        match product_id {
            "CASCO-001" => StockRecord {
                product_id: product_id.to_string(),
                product_name: "Type II Safety Helmet".to_string(),
                category: "EPP".to_string(),
                warehouse_id: warehouse,
                current_stock: 0,
                reserved_stock: 0,
                available_stock: 0,
                reorder_point: 50,
                safety_level: UNKNOWN_SAFETY_LEVEL.to_string(),
                certification: Some("ANSI Z89.1".to_string()),
                note: Some(FALLBACK_NOTE.to_string()),
            },
            "RESP-001" => StockRecord {
                product_id: product_id.to_string(),
                product_name: "N95 Respirator".to_string(),
                category: "EPP".to_string(),
                warehouse_id: warehouse,
                current_stock: 0,
                reserved_stock: 0,
                available_stock: 0,
                reorder_point: 200,
                safety_level: UNKNOWN_SAFETY_LEVEL.to_string(),
                certification: Some("NIOSH 42CFR84".to_string()),
                note: Some(FALLBACK_NOTE.to_string()),
            },
            _ => StockRecord {
                product_id: product_id.to_string(),
                product_name: "Unidentified product".to_string(),
                category: UNKNOWN_SAFETY_LEVEL.to_string(),
                warehouse_id: warehouse,
                current_stock: 0,
                reserved_stock: 0,
                available_stock: 0,
                reorder_point: 0,
                safety_level: UNKNOWN_SAFETY_LEVEL.to_string(),
                certification: None,
                note: Some(FALLBACK_NOTE.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_product_has_static_metadata() {
        let catalog = FallbackCatalog::new();
        let record = catalog.lookup("CASCO-001", None);
        assert_eq!(record.product_name, "Type II Safety Helmet");
        assert_eq!(record.category, "EPP");
        assert_eq!(record.reorder_point, 50);
        assert_eq!(record.certification.as_deref(), Some("ANSI Z89.1"));
    }

    #[test]
    fn test_quantities_always_zero() {
        let catalog = FallbackCatalog::new();
        for id in ["CASCO-001", "RESP-001", "NOPE-999"] {
            let record = catalog.lookup(id, None);
            assert_eq!(record.current_stock, 0);
            assert_eq!(record.reserved_stock, 0);
            assert_eq!(record.available_stock, 0);
            assert_eq!(record.safety_level, "UNKNOWN");
            assert_eq!(record.note.as_deref(), Some(FALLBACK_NOTE));
        }
    }

    #[test]
    fn test_unknown_product_gets_generic_record() {
        let catalog = FallbackCatalog::new();
        let record = catalog.lookup("WIDGET-42", Some("BOD-07"));
        assert_eq!(record.product_id, "WIDGET-42");
        assert_eq!(record.product_name, "Unidentified product");
        assert_eq!(record.warehouse_id, "BOD-07");
        assert_eq!(record.certification, None);
    }

    #[test]
    fn test_deterministic() {
        let catalog = FallbackCatalog::new();
        assert_eq!(
            catalog.lookup("RESP-001", Some("BOD-02")),
            catalog.lookup("RESP-001", Some("BOD-02"))
        );
    }

    #[test]
    fn test_warehouse_defaults() {
        let catalog = FallbackCatalog::new();
        assert_eq!(catalog.lookup("RESP-001", None).warehouse_id, "BOD-01");
    }
}
