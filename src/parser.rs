use std::collections::HashMap;

use crate::error::CoreError;
use crate::record::TransactionRecord;

/// Parses delimited text into records. The first row is the header and defines
/// the field names in order; data rows map positionally. Short rows are padded
/// with empty strings, extra trailing values are dropped, empty lines are
/// skipped. Values stay raw strings — coercion belongs to the normalizer.
///
/// A header with zero data rows is a valid empty set ("no data yet"), not an
/// error. Input with no header row at all is malformed.
pub fn parse_table(text: &str) -> Result<Vec<TransactionRecord>, CoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CoreError::MalformedInput(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(CoreError::MalformedInput("missing header row".to_string()));
    }

    let mut records = Vec::new();
    let mut row = csv::StringRecord::new();
    let mut ordinal = 0usize;
    while reader.read_record(&mut row)? {
        if row.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        let mut fields = HashMap::with_capacity(headers.len());
        for (i, name) in headers.iter().enumerate() {
            let value = row.get(i).unwrap_or("").to_string();
            fields.insert(name.clone(), value);
        }
        records.push(TransactionRecord::new(fields, ordinal));
        ordinal += 1;
    }
    Ok(records)
}
