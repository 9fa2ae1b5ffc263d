use chrono::{DateTime, Utc};
use std::collections::HashMap;

pub const TIMESTAMP_FIELD: &str = "updated_at_block_time";
pub const PRICE_FIELD: &str = "price";
pub const COMMISSION_FIELD: &str = "commission_amount";
pub const ITEM_ID_FIELD: &str = "nft_id";
pub const SET_FIELD: &str = "nft_edition_set_truncatedName";
pub const SHAPE_FIELD: &str = "nft_edition_shape_name";
pub const VARIANT_FIELD: &str = "nft_edition_variant";
pub const SERIES_FIELD: &str = "nft_edition_series_name";
pub const SERIAL_FIELD: &str = "nft_serial_number";
pub const TOTAL_MINTED_FIELD: &str = "nft_edition_total_minted";
pub const BUYER_USERNAME_FIELD: &str = "receiver_username";
pub const BUYER_WALLET_FIELD: &str = "receiver_flowAddress";
pub const SELLER_USERNAME_FIELD: &str = "seller_username";
pub const SELLER_WALLET_FIELD: &str = "seller_flowAddress";

/// One marketplace sale as it arrives from the tabular source. All values stay
/// raw strings; typed access goes through the tolerant accessors below.
/// Unknown columns are kept so downstream consumers can read them.
#[derive(Debug, Clone, Default)]
pub struct TransactionRecord {
    fields: HashMap<String, String>,
    /// Source row position. Part of the display identity together with the
    /// item id and timestamp, so identical-looking sales never collapse.
    pub ordinal: usize,
}

impl TransactionRecord {
    pub fn new(fields: HashMap<String, String>, ordinal: usize) -> Self {
        Self { fields, ordinal }
    }

    /// Raw field lookup. Empty and whitespace-only values count as absent.
    pub fn field(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(v) if !v.trim().is_empty() => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.field(TIMESTAMP_FIELD)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn price(&self) -> f64 {
        crate::normalize::parse_amount(self.field(PRICE_FIELD).unwrap_or(""))
    }

    pub fn commission(&self) -> f64 {
        crate::normalize::parse_amount(self.field(COMMISSION_FIELD).unwrap_or(""))
    }

    pub fn serial_number(&self) -> Option<i64> {
        self.field(SERIAL_FIELD).and_then(|s| s.trim().parse().ok())
    }

    pub fn total_minted(&self) -> Option<i64> {
        self.field(TOTAL_MINTED_FIELD)
            .and_then(|s| s.trim().parse().ok())
    }

    pub fn item_id(&self) -> Option<&str> {
        self.field(ITEM_ID_FIELD)
    }

    pub fn set_name(&self) -> Option<&str> {
        self.field(SET_FIELD)
    }

    pub fn shape_name(&self) -> Option<&str> {
        self.field(SHAPE_FIELD)
    }

    pub fn variant(&self) -> Option<&str> {
        self.field(VARIANT_FIELD)
    }

    pub fn series_name(&self) -> Option<&str> {
        self.field(SERIES_FIELD)
    }

    pub fn buyer_username(&self) -> Option<&str> {
        self.field(BUYER_USERNAME_FIELD)
    }

    pub fn buyer_wallet(&self) -> Option<&str> {
        self.field(BUYER_WALLET_FIELD)
    }

    pub fn seller_username(&self) -> Option<&str> {
        self.field(SELLER_USERNAME_FIELD)
    }

    pub fn seller_wallet(&self) -> Option<&str> {
        self.field(SELLER_WALLET_FIELD)
    }
}

/// Converts a pre-parsed JSON array (the envelope's alternate wire format)
/// into records. Non-string scalars are stringified; nulls count as absent.
pub fn records_from_json(values: &[serde_json::Value]) -> Vec<TransactionRecord> {
    values
        .iter()
        .enumerate()
        .filter_map(|(ordinal, value)| {
            let obj = value.as_object()?;
            let mut fields = HashMap::with_capacity(obj.len());
            for (key, val) in obj {
                let text = match val {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Null => continue,
                    other => other.to_string(),
                };
                fields.insert(key.clone(), text);
            }
            Some(TransactionRecord::new(fields, ordinal))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> TransactionRecord {
        let fields = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TransactionRecord::new(fields, 0)
    }

    #[test]
    fn empty_values_count_as_absent() {
        let r = record(&[(PRICE_FIELD, "  "), (SET_FIELD, "Villains")]);
        assert!(r.field(PRICE_FIELD).is_none());
        assert_eq!(r.set_name(), Some("Villains"));
    }

    #[test]
    fn timestamp_parses_rfc3339_and_rejects_garbage() {
        let good = record(&[(TIMESTAMP_FIELD, "2025-07-12T19:08:10.735715Z")]);
        assert!(good.timestamp().is_some());
        let bad = record(&[(TIMESTAMP_FIELD, "yesterday")]);
        assert!(bad.timestamp().is_none());
    }

    #[test]
    fn numeric_accessors_default_on_malformed_input() {
        let r = record(&[(PRICE_FIELD, "abc"), (TOTAL_MINTED_FIELD, "322")]);
        assert_eq!(r.price(), 0.0);
        assert_eq!(r.total_minted(), Some(322));
        assert_eq!(r.serial_number(), None);
    }

    #[test]
    fn json_records_preserve_unknown_columns() {
        let payload = serde_json::json!([
            {"price": "149", "cursor": "abc123", "nft_id": 7, "note": null}
        ]);
        let records = records_from_json(payload.as_array().unwrap());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field("cursor"), Some("abc123"));
        assert_eq!(records[0].item_id(), Some("7"));
        assert!(records[0].field("note").is_none());
    }
}
