use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

use card_map::{
    export_csv, Category, ClientFlags, Config, MapSession, ReportKind, StatusFilter,
};

const USAGE: &str = "usage: card-map [stats | list [all|card|giro|cash] | vote <venue-id> <card|giro|cash> | report <venue-id> <kind> | export <path>]";

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("stats");

    if matches!(command, "-h" | "--help" | "help") {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = Config::load()?;
    let mut session = config.session()?;

    println!("🗺️  Munich Card Map v{}", card_map::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if let Err(e) = session.load().await {
        eprintln!("❌ {}", e.user_message());
        eprintln!("   {}", e);
        std::process::exit(1);
    }

    match command {
        "stats" => run_stats(&session),
        "list" => run_list(&session, args.get(1).map(String::as_str).unwrap_or("all")),
        "vote" => run_vote(&mut session, &config, &args[1..]).await,
        "report" => run_report(&session, &config, &args[1..]).await,
        "export" => run_export(&session, &args[1..]),
        other => bail!("unknown command '{}'\n{}", other, USAGE),
    }
}

fn run_stats(session: &MapSession) -> Result<()> {
    let stats = session.stats();

    println!("\n📊 Coverage: {}", stats.summary());
    for (label, filter) in [
        ("💳 Card", StatusFilter::Card),
        ("🏧 Girocard", StatusFilter::Giro),
        ("💶 Cash only", StatusFilter::Cash),
    ] {
        println!("   {:<12} {}", label, session.venues(filter).len());
    }

    Ok(())
}

fn run_list(session: &MapSession, filter: &str) -> Result<()> {
    let filter: StatusFilter = filter.parse().map_err(|e: String| anyhow!(e))?;
    let venues = session.venues(filter);

    for venue in &venues {
        let status = venue.status();
        println!(
            "{:<16} {:<8} {:<40} cash {} / card {} / giro {}",
            venue.id,
            status.category,
            venue.display_name(),
            venue.tally.cash_votes,
            venue.tally.card_votes,
            venue.tally.giro_votes,
        );
    }
    println!("\n✓ {} venue(s)", venues.len());

    Ok(())
}

async fn run_vote(session: &mut MapSession, config: &Config, args: &[String]) -> Result<()> {
    let [venue_id, choice] = args else {
        bail!("usage: card-map vote <venue-id> <card|giro|cash>");
    };
    let choice: Category = choice.parse().map_err(|e: String| anyhow!(e))?;
    let mut flags = ClientFlags::load(&config.flags_path)?;

    let outcome = session
        .vote_once(&mut flags, venue_id, choice)
        .await
        .context("Vote not recorded")?;

    println!("✅ Thanks! {} is now: {}", outcome.venue_id, outcome.status.text);
    println!("📊 Coverage: {}", outcome.stats.summary());

    Ok(())
}

async fn run_report(session: &MapSession, config: &Config, args: &[String]) -> Result<()> {
    let [venue_id, kind] = args else {
        bail!("usage: card-map report <venue-id> <closed|wrong_location|not_a_venue|other>");
    };
    let kind: ReportKind = kind.parse().map_err(|e: String| anyhow!(e))?;
    let mut flags = ClientFlags::load(&config.flags_path)?;

    let report = session
        .report_once(&mut flags, venue_id, kind)
        .await
        .context("Report not sent")?;

    println!("✅ Report {} filed for {} ({})", report.report_id, report.venue_id, report.kind);

    Ok(())
}

fn run_export(session: &MapSession, args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        bail!("usage: card-map export <path>");
    };

    let rows = export_csv(Path::new(path), session.collection().venues())?;
    println!("✓ Exported {} venues to {}", rows, path);

    Ok(())
}
