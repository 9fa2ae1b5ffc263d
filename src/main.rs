use anyhow::Result;
use clap::{Parser, Subcommand};
use pin_event_analytics::{
    bucket_by_time, classify_search_input, group_count, group_sum, pin_identity_key, summary_totals,
    top_n, user_summary, Config, Gateway, Granularity, RefreshController, SearchKey,
    TransactionRecord, ALL_WINDOW,
};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pin-event-analytics")]
#[command(about = "Marketplace event analytics for the pin trading dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// One-shot fetch and report for a window
    Summary {
        #[arg(long, default_value = ALL_WINDOW)]
        window: String,
    },
    /// Look up one user's purchases and sales by username or wallet
    User {
        #[arg(required = true)]
        query: String,
        #[arg(long, default_value = ALL_WINDOW)]
        window: String,
    },
    /// Keep refreshing the live window on the configured interval
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::from_default_env().add_directive("pin_event_analytics=info".parse()?);
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Summary { window } => run_summary(window).await,
        Commands::User { query, window } => run_user(query, window).await,
        Commands::Watch => run_watch().await,
    }
}

fn build_controller(config: &Config) -> Result<RefreshController> {
    let windows = config.load_windows()?;
    let gateway = Gateway::new(
        config.endpoint.clone(),
        config.snapshot_path.clone(),
        config.request_timeout_secs,
    );
    Ok(RefreshController::new(
        gateway,
        windows,
        config.live_window.clone(),
    ))
}

fn print_report(records: &[TransactionRecord], window: &str) {
    let totals = summary_totals(records);
    println!("== {window} ==");
    println!("Transactions:     {}", totals.transactions);
    println!("Total sales:      ${:.2}", totals.total_sales);
    println!("Total commission: ${:.2}", totals.total_commission);

    let by_pin = group_sum(records, pin_identity_key, |r| r.price());
    println!("\nTop pins by sales volume:");
    for (pin, total) in top_n(&by_pin, 10) {
        println!("  {pin:<60} ${total:.2}");
    }

    let by_set = group_sum(
        records,
        |r| r.set_name().unwrap_or("Unknown").to_string(),
        |r| r.price(),
    );
    println!("\nTop sets by sales volume:");
    for (set, total) in top_n(&by_set, 10) {
        println!("  {set:<60} ${total:.2}");
    }

    let by_buyer = group_sum(
        records,
        |r| r.buyer_username().unwrap_or("Unknown").to_string(),
        |r| r.price(),
    );
    println!("\nTop buyers by spend:");
    for (buyer, total) in top_n(&by_buyer, 15) {
        println!("  {buyer:<30} ${total:.2}");
    }

    let by_seller = group_count(records, |r| {
        r.seller_username().unwrap_or("Unknown").to_string()
    });
    println!("\nTop sellers by sale count:");
    for (seller, count) in top_n(&by_seller, 15) {
        println!("  {seller:<30} {count:.0}");
    }

    let granularity = if window == ALL_WINDOW {
        Granularity::Day
    } else {
        Granularity::Hour
    };
    let buckets = bucket_by_time(records, granularity, |r| r.price());
    println!("\nSales volume (Pacific time):");
    for (label, total) in &buckets {
        println!("  {label:<16} ${total:.2}");
    }
}

async fn run_summary(window: String) -> Result<()> {
    let config = Config::from_env()?;
    let mut controller = build_controller(&config)?;
    controller.select_window(&window);
    controller.refresh().await?;
    print_report(controller.data(), controller.selected_window());
    Ok(())
}

async fn run_user(query: String, window: String) -> Result<()> {
    let config = Config::from_env()?;
    let mut controller = build_controller(&config)?;
    controller.select_window(&window);
    controller.refresh().await?;

    let key = classify_search_input(&query);
    match &key {
        SearchKey::Wallet(addr) => info!("searching by wallet {addr}"),
        SearchKey::Username(name) => info!("searching by username {name}"),
    }

    let summary = user_summary(controller.data(), &key);
    if summary.total_transactions() == 0 {
        println!("No results found for \"{query}\" in {window}");
        return Ok(());
    }

    println!(
        "User: {} ({})",
        summary.username.as_deref().unwrap_or(&query),
        summary.wallet.as_deref().unwrap_or("N/A"),
    );
    println!(
        "Purchases: {:<5} total spent  ${:.2} (avg ${:.2})",
        summary.purchase_count(),
        summary.total_spent,
        summary.average_purchase(),
    );
    println!(
        "Sales:     {:<5} total earned ${:.2} (avg ${:.2})",
        summary.sale_count(),
        summary.total_earned,
        summary.average_sale(),
    );
    println!("Net volume: ${:.2}", summary.net_volume());

    for line in summary.purchases.iter().take(10) {
        println!(
            "  bought {:<50} ${:<10.2} from {}",
            line.pin, line.price, line.counterparty
        );
    }
    for line in summary.sales.iter().take(10) {
        println!(
            "  sold   {:<50} ${:<10.2} to   {}",
            line.pin, line.price, line.counterparty
        );
    }
    Ok(())
}

async fn run_watch() -> Result<()> {
    let config = Config::from_env()?;
    let mut controller = build_controller(&config)?;
    controller.select_window(&config.live_window);
    info!("Live window: {}", config.live_window);
    info!("Refresh interval: {}s", config.refresh_secs);

    controller
        .run(Duration::from_secs(config.refresh_secs), |full, data| {
            let totals = summary_totals(data);
            info!(
                full = full.len(),
                windowed = totals.transactions,
                sales = format!("{:.2}", totals.total_sales),
                commission = format!("{:.2}", totals.total_commission),
                "cycle summary"
            );
        })
        .await?;
    Ok(())
}
