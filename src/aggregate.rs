use chrono::{DateTime, Utc};
use chrono_tz::America::Los_Angeles;
use std::collections::{BTreeMap, HashMap};

use crate::normalize::{pin_identity_key, wallets_equal, SearchKey};
use crate::record::TransactionRecord;

/// Header-card totals for whichever record set the caller passes in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryTotals {
    pub transactions: usize,
    pub total_sales: f64,
    pub total_commission: f64,
}

pub fn summary_totals(records: &[TransactionRecord]) -> SummaryTotals {
    SummaryTotals {
        transactions: records.len(),
        total_sales: records.iter().map(|r| r.price()).sum(),
        total_commission: records.iter().map(|r| r.commission()).sum(),
    }
}

pub fn group_sum<K, V>(records: &[TransactionRecord], key_fn: K, value_fn: V) -> HashMap<String, f64>
where
    K: Fn(&TransactionRecord) -> String,
    V: Fn(&TransactionRecord) -> f64,
{
    let mut out = HashMap::new();
    for record in records {
        *out.entry(key_fn(record)).or_insert(0.0) += value_fn(record);
    }
    out
}

pub fn group_count<K>(records: &[TransactionRecord], key_fn: K) -> HashMap<String, f64>
where
    K: Fn(&TransactionRecord) -> String,
{
    group_sum(records, key_fn, |_| 1.0)
}

/// Top `n` entries sorted descending by value. Equal values tie-break by
/// ascending key, which keeps repeated calls deterministic regardless of map
/// iteration order.
pub fn top_n(map: &HashMap<String, f64>, n: usize) -> Vec<(String, f64)> {
    let mut entries: Vec<(String, f64)> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
    entries.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    entries.truncate(n);
    entries
}

/// Running totals for one pin. `average` is `None` until at least two sales
/// exist — a single sale is not an average, and consumers show "N/A" instead.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PinStats {
    pub total: f64,
    pub count: usize,
    pub average: Option<f64>,
}

pub fn pin_averages(records: &[TransactionRecord]) -> HashMap<String, PinStats> {
    let mut out: HashMap<String, PinStats> = HashMap::new();
    for record in records {
        let stats = out.entry(pin_identity_key(record)).or_default();
        stats.total += record.price();
        stats.count += 1;
    }
    for stats in out.values_mut() {
        if stats.count > 1 {
            stats.average = Some(stats.total / stats.count as f64);
        }
    }
    out
}

/// One side of a user's activity, as shown in the search result tables.
#[derive(Debug, Clone)]
pub struct TradeLine {
    pub price: f64,
    pub timestamp: Option<DateTime<Utc>>,
    pub pin: String,
    pub counterparty: String,
}

#[derive(Debug, Clone, Default)]
pub struct UserSummary {
    pub username: Option<String>,
    pub wallet: Option<String>,
    pub purchases: Vec<TradeLine>,
    pub sales: Vec<TradeLine>,
    pub total_spent: f64,
    pub total_earned: f64,
}

impl UserSummary {
    pub fn purchase_count(&self) -> usize {
        self.purchases.len()
    }

    pub fn sale_count(&self) -> usize {
        self.sales.len()
    }

    pub fn total_transactions(&self) -> usize {
        self.purchases.len() + self.sales.len()
    }

    pub fn net_volume(&self) -> f64 {
        self.total_earned - self.total_spent
    }

    /// 0.0 when there are no purchases, so empty results never divide by zero.
    pub fn average_purchase(&self) -> f64 {
        if self.purchases.is_empty() {
            0.0
        } else {
            self.total_spent / self.purchases.len() as f64
        }
    }

    pub fn average_sale(&self) -> f64 {
        if self.sales.is_empty() {
            0.0
        } else {
            self.total_earned / self.sales.len() as f64
        }
    }
}

fn identity_matches(key: &SearchKey, username: Option<&str>, wallet: Option<&str>) -> bool {
    match key {
        SearchKey::Wallet(addr) => wallet.is_some_and(|w| wallets_equal(w, addr)),
        SearchKey::Username(name) => username.is_some_and(|u| u.to_lowercase() == *name),
    }
}

/// Collects everything one identity bought and sold in the given record set.
/// The complementary identity fields (wallet for a username search, username
/// for a wallet search) are filled best-effort from the first matching record.
pub fn user_summary(records: &[TransactionRecord], key: &SearchKey) -> UserSummary {
    let mut summary = UserSummary::default();

    for record in records {
        let pin = pin_identity_key(record);
        if identity_matches(key, record.buyer_username(), record.buyer_wallet()) {
            summary.total_spent += record.price();
            summary.purchases.push(TradeLine {
                price: record.price(),
                timestamp: record.timestamp(),
                pin: pin.clone(),
                counterparty: record.seller_username().unwrap_or("Unknown").to_string(),
            });
            if summary.username.is_none() {
                summary.username = record.buyer_username().map(str::to_string);
            }
            if summary.wallet.is_none() {
                summary.wallet = record.buyer_wallet().map(str::to_string);
            }
        }
        if identity_matches(key, record.seller_username(), record.seller_wallet()) {
            summary.total_earned += record.price();
            summary.sales.push(TradeLine {
                price: record.price(),
                timestamp: record.timestamp(),
                pin,
                counterparty: record.buyer_username().unwrap_or("Unknown").to_string(),
            });
            if summary.username.is_none() {
                summary.username = record.seller_username().map(str::to_string);
            }
            if summary.wallet.is_none() {
                summary.wallet = record.seller_wallet().map(str::to_string);
            }
        }
    }

    summary
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hour,
    Day,
}

/// Sums a value into Pacific-time buckets. The dashboard fixes on
/// America/Los_Angeles regardless of viewer locale; labels sort
/// chronologically (`YYYY-MM-DD HH` for hours, `YYYY-MM-DD` for days).
/// Records without a usable timestamp are left out.
pub fn bucket_by_time<V>(
    records: &[TransactionRecord],
    granularity: Granularity,
    value_fn: V,
) -> BTreeMap<String, f64>
where
    V: Fn(&TransactionRecord) -> f64,
{
    let mut out = BTreeMap::new();
    for record in records {
        let Some(ts) = record.timestamp() else { continue };
        let local = ts.with_timezone(&Los_Angeles);
        let label = match granularity {
            Granularity::Hour => local.format("%Y-%m-%d %H").to_string(),
            Granularity::Day => local.format("%Y-%m-%d").to_string(),
        };
        *out.entry(label).or_insert(0.0) += value_fn(record);
    }
    out
}
