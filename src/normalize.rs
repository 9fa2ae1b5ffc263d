use crate::record::TransactionRecord;

/// How a search query should be matched against records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    /// Hex account address, stored lowercase with any `0x` prefix stripped.
    Wallet(String),
    /// Anything that does not look like an address, stored lowercase.
    Username(String),
}

/// Parses a decimal amount, defaulting to 0 on missing or malformed input.
/// Sums over the record set rely on this being total.
pub fn parse_amount(raw: &str) -> f64 {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Lowercases and strips a leading `0x` so addresses compare by content.
pub fn normalize_wallet(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    lower.strip_prefix("0x").unwrap_or(&lower).to_string()
}

pub fn wallets_equal(a: &str, b: &str) -> bool {
    normalize_wallet(a) == normalize_wallet(b)
}

/// A query is a wallet when it is an optional `0x` prefix followed by twelve
/// or more hex characters; everything else is treated as a username.
pub fn classify_search_input(text: &str) -> SearchKey {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if body.len() >= 12 && body.chars().all(|c| c.is_ascii_hexdigit()) {
        SearchKey::Wallet(normalize_wallet(trimmed))
    } else {
        SearchKey::Username(trimmed.to_lowercase())
    }
}

/// Grouping key for a sellable pin: `"{set} - {shape} - {variant}"` with
/// `"Unknown"` standing in for a missing set or shape. When none of the three
/// are present the raw item id is the only identity left, so fall back to it.
pub fn pin_identity_key(record: &TransactionRecord) -> String {
    let set = record.set_name();
    let shape = record.shape_name();
    let variant = record.variant();
    if set.is_none() && shape.is_none() && variant.is_none() {
        return record.item_id().unwrap_or("Unknown").to_string();
    }
    format!(
        "{} - {} - {}",
        set.unwrap_or("Unknown"),
        shape.unwrap_or("Unknown"),
        variant.unwrap_or("")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ITEM_ID_FIELD, SET_FIELD, SHAPE_FIELD, VARIANT_FIELD};
    use std::collections::HashMap;

    fn record(pairs: &[(&str, &str)]) -> TransactionRecord {
        let fields: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TransactionRecord::new(fields, 0)
    }

    #[test]
    fn parse_amount_defaults_to_zero() {
        assert_eq!(parse_amount("149"), 149.0);
        assert_eq!(parse_amount(" 10.93 "), 10.93);
        assert_eq!(parse_amount(""), 0.0);
        assert_eq!(parse_amount("N/A"), 0.0);
        assert_eq!(parse_amount("NaN"), 0.0);
    }

    #[test]
    fn wallets_compare_case_and_prefix_insensitively() {
        assert!(wallets_equal("0xABC123DEF456", "abc123def456"));
        assert!(wallets_equal("99C84934165BE2C2", "0x99c84934165be2c2"));
        assert!(!wallets_equal("99c84934165be2c2", "4573d21f758f5085"));
    }

    #[test]
    fn search_input_classification() {
        assert_eq!(
            classify_search_input("0x99C84934165BE2C2"),
            SearchKey::Wallet("99c84934165be2c2".to_string())
        );
        assert_eq!(
            classify_search_input("4573d21f758f5085"),
            SearchKey::Wallet("4573d21f758f5085".to_string())
        );
        // Too short to be an address, even though it is all hex.
        assert_eq!(
            classify_search_input("abc123"),
            SearchKey::Username("abc123".to_string())
        );
        assert_eq!(
            classify_search_input("Kokishin"),
            SearchKey::Username("kokishin".to_string())
        );
    }

    #[test]
    fn pin_key_uses_unknown_placeholders() {
        let r = record(&[(SHAPE_FIELD, "Ariel"), (VARIANT_FIELD, "Digital Display")]);
        assert_eq!(pin_identity_key(&r), "Unknown - Ariel - Digital Display");
    }

    #[test]
    fn pin_key_falls_back_to_item_id() {
        let r = record(&[(ITEM_ID_FIELD, "1468906216")]);
        assert_eq!(pin_identity_key(&r), "1468906216");
    }

    #[test]
    fn pin_key_is_stable_across_calls() {
        let r = record(&[
            (SET_FIELD, "Disney Princess Vol.1"),
            (SHAPE_FIELD, "Ariel"),
            (VARIANT_FIELD, "Digital Display"),
        ]);
        let first = pin_identity_key(&r);
        assert_eq!(first, "Disney Princess Vol.1 - Ariel - Digital Display");
        assert_eq!(pin_identity_key(&r), first);
    }
}
