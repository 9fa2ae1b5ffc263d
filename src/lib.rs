pub mod aggregate;
pub mod config;
pub mod error;
pub mod gateway;
pub mod normalize;
pub mod parser;
pub mod record;
pub mod refresh;
pub mod windows;

pub use aggregate::{
    bucket_by_time, group_count, group_sum, pin_averages, summary_totals, top_n, user_summary,
    Granularity, PinStats, SummaryTotals, UserSummary,
};
pub use config::Config;
pub use error::CoreError;
pub use gateway::{FetchOrigin, FetchOutcome, Gateway, SourceCache};
pub use normalize::{
    classify_search_input, parse_amount, pin_identity_key, wallets_equal, SearchKey,
};
pub use parser::parse_table;
pub use record::TransactionRecord;
pub use refresh::{RefreshController, RefreshState};
pub use windows::{classify, filter_by_window, window_report, EventWindow, ALL_WINDOW};
