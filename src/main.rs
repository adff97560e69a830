//! Gameday Attention CLI
//!
//! Measures social-media attention around scheduled games.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::HashMap;
use std::path::PathBuf;
use gameday_attention::{
    config::Config,
    core::{AggregationParams, AttentionAggregator, BinWidth, Grouping, Reduction, Window},
    report,
    schedule::load_game_stats,
    BucketCache, CsvSchedule, Game, JsonlSource, VERSION,
};

#[derive(Parser)]
#[command(name = "gameday-attention")]
#[command(version = VERSION)]
#[command(about = "Social-media attention windows around sporting events", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the per-user config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Schedule CSV
    #[arg(long, global = true)]
    schedule: Option<PathBuf>,

    /// JSON-lines post dump
    #[arg(long, global = true)]
    posts: Option<PathBuf>,

    /// IANA timezone kickoffs are given in
    #[arg(long, global = true)]
    timezone: Option<String>,

    /// First season to include
    #[arg(long, global = true)]
    first_season: Option<i32>,

    /// Last season to include
    #[arg(long, global = true)]
    last_season: Option<i32>,

    /// Count posts returned by both anchors twice
    #[arg(long, global = true)]
    no_dedupe: bool,

    /// Ignore and do not write the bucket cache
    #[arg(long, global = true)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum BinArg {
    Hour,
    HalfHour,
}

impl From<BinArg> for BinWidth {
    fn from(arg: BinArg) -> Self {
        match arg {
            BinArg::Hour => BinWidth::Hour,
            BinArg::HalfHour => BinWidth::HalfHour,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Mean attention per bin around kickoff
    Kickoff {
        /// Bin width
        #[arg(long, value_enum, default_value = "hour")]
        bin: BinArg,

        /// Hours before kickoff
        #[arg(long, default_value = "5")]
        before: i64,

        /// Hours after kickoff
        #[arg(long, default_value = "15")]
        after: i64,
    },

    /// Total attention per season and week
    Weekly {
        /// Days either side of gameday
        #[arg(long, default_value = "7")]
        days: i64,
    },

    /// Rank teams by mean attention around their games
    Teams {
        /// Only show the top N teams
        #[arg(long)]
        top: Option<usize>,

        /// Hours before kickoff
        #[arg(long, default_value = "5")]
        before: i64,

        /// Hours after kickoff
        #[arg(long, default_value = "24")]
        after: i64,
    },

    /// List games that drew no posts at all
    Zero {
        /// Hours before kickoff
        #[arg(long, default_value = "5")]
        before: i64,

        /// Hours after kickoff
        #[arg(long, default_value = "24")]
        after: i64,
    },

    /// Share of attention that falls close to kickoff
    Concentration {
        /// Hours either side of kickoff for the narrow window
        #[arg(long, default_value = "72")]
        narrow_hours: i64,

        /// Days either side of gameday for the full window
        #[arg(long, default_value = "7")]
        full_days: i64,
    },

    /// Write one CSV row per game for modeling
    Games {
        /// Output file (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Days either side of gameday
        #[arg(long, default_value = "7")]
        days: i64,

        /// Per-game statistics CSV to join (overrides the config)
        #[arg(long)]
        stats: Option<PathBuf>,
    },

    /// Attention for every game between two teams
    Matchup {
        team_a: String,
        team_b: String,

        /// Restrict to one season
        #[arg(long)]
        season: Option<i32>,

        /// Days either side of gameday
        #[arg(long, default_value = "1")]
        days: i64,
    },

    /// Tally a post field (e.g. location) over a team's games
    Locations {
        /// Team whose games are scanned (all games if omitted)
        #[arg(long)]
        team: Option<String>,

        /// Post field to tally
        #[arg(long, default_value = "city_state")]
        field: String,

        /// Extra anchor searched for every game, e.g. `#DallasCowboys` (repeatable)
        #[arg(long = "anchor")]
        anchors: Vec<String>,

        /// Days either side of gameday
        #[arg(long, default_value = "3")]
        days: i64,

        /// Only show the top N values
        #[arg(long, default_value = "20")]
        top: usize,
    },

    /// Show configuration
    Config,
}

type Aggregator = AttentionAggregator<CsvSchedule, JsonlSource>;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Kickoff { bin, before, after } => {
            let window = Window::hours(-before, *after, (*bin).into())?;
            cmd_kickoff(&config, window)
        }
        Commands::Weekly { days } => cmd_weekly(&config, Window::days(-days, *days)?),
        Commands::Teams { top, before, after } => {
            let window = Window::hours(-before, *after, BinWidth::Hour)?;
            cmd_teams(&config, window, *top)
        }
        Commands::Zero { before, after } => {
            cmd_zero(&config, Window::hours(-before, *after, BinWidth::Hour)?)
        }
        Commands::Concentration {
            narrow_hours,
            full_days,
        } => {
            let narrow = Window::hours(-narrow_hours, *narrow_hours, BinWidth::Hour)?;
            let full = Window::hours(-full_days * 24, full_days * 24, BinWidth::Hour)?;
            cmd_concentration(&config, narrow, full)
        }
        Commands::Games {
            output,
            days,
            stats,
        } => {
            let stats = stats.as_ref().or(config.game_stats_path.as_ref());
            cmd_games(&config, Window::days(-days, *days)?, output.as_ref(), stats)
        }
        Commands::Matchup {
            team_a,
            team_b,
            season,
            days,
        } => cmd_matchup(&config, team_a, team_b, *season, Window::days(-days, *days)?),
        Commands::Locations {
            team,
            field,
            anchors,
            days,
            top,
        } => cmd_locations(
            &config,
            team.as_deref(),
            field,
            anchors,
            Window::days(-days, *days)?,
            *top,
        ),
        Commands::Config => cmd_config(&config, &cli),
    }
}

/// Load the config file and apply command-line overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli.config.clone().unwrap_or_else(Config::config_path);
    let mut config =
        Config::load_from(&path).with_context(|| format!("loading config from {path:?}"))?;

    if let Some(schedule) = &cli.schedule {
        config.schedule_path = schedule.clone();
    }
    if let Some(posts) = &cli.posts {
        config.posts_path = posts.clone();
    }
    if let Some(tz) = &cli.timezone {
        config.timezone = tz.clone();
    }
    if let Some(first) = cli.first_season {
        config.seasons.first = first;
    }
    if let Some(last) = cli.last_season {
        config.seasons.last = last;
    }
    if cli.no_dedupe {
        config.dedupe_posts = false;
    }
    if cli.no_cache {
        config.use_cache = false;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn params(config: &Config, window: Window) -> Result<AggregationParams> {
    Ok(AggregationParams::new(window)
        .with_timezone(config.tz()?)
        .dedupe(config.dedupe_posts))
}

/// Build the aggregator, attaching a cache file bound to `window` and the
/// de-duplication policy.
fn build_aggregator(config: &Config, window: Window) -> Result<Aggregator> {
    let source = JsonlSource::open(&config.posts_path)
        .with_context(|| format!("reading posts from {:?}", config.posts_path))?;
    let aggregator = AttentionAggregator::new(CsvSchedule::new(&config.schedule_path), source);

    if !config.use_cache {
        return Ok(aggregator);
    }

    config
        .ensure_directories()
        .context("creating data directories")?;
    let name = config.cache_name(&window);
    let cache = BucketCache::open(config.cache_path(&name), window, config.dedupe_posts)
        .with_context(|| format!("opening bucket cache {name}"))?;
    Ok(aggregator.with_cache(cache))
}

fn finish(aggregator: &Aggregator) -> Result<()> {
    aggregator.save_cache().context("saving bucket cache")?;
    eprintln!();
    eprintln!("{}", aggregator.stats().summary());
    Ok(())
}

fn selected_games(config: &Config, aggregator: &Aggregator) -> Result<Vec<Game>> {
    aggregator
        .games(&config.game_filter())
        .with_context(|| format!("loading schedule from {:?}", config.schedule_path))
}

fn cmd_kickoff(config: &Config, window: Window) -> Result<()> {
    let mut aggregator = build_aggregator(config, window)?;
    let games = selected_games(config, &aggregator)?;
    let params = params(config, window)?.skip_empty(true);

    let result = aggregator
        .aggregate(&games, Grouping::Global, &params)?
        .reduce(Reduction::Mean);

    println!("Mean posts per {} bin around kickoff ({window})", window.bin);
    if let Some(row) = result.get(&gameday_attention::ReportKey::Global) {
        println!(
            "{} games contributed, {} skipped with no posts",
            row.contributing, row.skipped_empty
        );
    }
    println!();
    print!("{}", report::kickoff_curve_table(&report::kickoff_curve(&result)));

    finish(&aggregator)
}

fn cmd_weekly(config: &Config, window: Window) -> Result<()> {
    let mut aggregator = build_aggregator(config, window)?;
    let games = selected_games(config, &aggregator)?;
    let params = params(config, window)?;

    let result = aggregator
        .aggregate(&games, Grouping::SeasonWeek, &params)?
        .reduce(Reduction::Sum);
    let weekly = report::WeeklyTotals::from_result(&result);

    println!("Posts per week ({window})");
    println!();
    print!("{}", weekly.table());

    finish(&aggregator)
}

fn cmd_teams(config: &Config, window: Window, top: Option<usize>) -> Result<()> {
    let mut aggregator = build_aggregator(config, window)?;
    let games = selected_games(config, &aggregator)?;
    let params = params(config, window)?.skip_empty(true);

    let result = aggregator
        .aggregate(&games, Grouping::Team, &params)?
        .reduce(Reduction::Mean);
    let ranks = report::team_ranking(&result);

    println!("Teams by mean attention around kickoff ({window})");
    println!();
    print!("{}", report::team_ranking_table(&ranks, top));

    finish(&aggregator)
}

fn cmd_zero(config: &Config, window: Window) -> Result<()> {
    let mut aggregator = build_aggregator(config, window)?;
    let games = selected_games(config, &aggregator)?;
    let params = params(config, window)?;

    let flagged = aggregator.zero_attention(&games, &params)?;

    println!("{} of {} games drew no posts ({window})", flagged.len(), games.len());
    for game in &flagged {
        println!(
            "  {:<18} {}@{} {}",
            game.game_id,
            game.away_team,
            game.home_team,
            game.kickoff.to_rfc3339()
        );
    }

    finish(&aggregator)
}

fn cmd_concentration(config: &Config, narrow: Window, full: Window) -> Result<()> {
    let mut aggregator = build_aggregator(config, full)?;
    let games = selected_games(config, &aggregator)?;
    let params = params(config, full)?;

    let concentration = aggregator.concentration(&games, &narrow, &params)?;

    match concentration.percentage() {
        Some(pct) => println!(
            "{pct:.1}% of posts ({} of {}) fall within {narrow}, across {} games",
            concentration.narrow_total, concentration.full_total, concentration.games
        ),
        None => println!("No posts found within {full}"),
    }

    finish(&aggregator)
}

fn cmd_games(
    config: &Config,
    window: Window,
    output: Option<&PathBuf>,
    stats: Option<&PathBuf>,
) -> Result<()> {
    let mut aggregator = build_aggregator(config, window)?;
    let games = selected_games(config, &aggregator)?;
    let params = params(config, window)?;
    let stats = match stats {
        Some(path) => load_game_stats(path)
            .with_context(|| format!("loading game statistics from {path:?}"))?,
        None => HashMap::new(),
    };

    let observations = aggregator.observe_all(&games, &params)?;
    let rows = report::game_rows(&games, &observations, &stats);

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("creating {path:?}"))?;
            report::write_game_rows(file, &rows)?;
            println!("Wrote {} rows to {path:?}", rows.len());
        }
        None => report::write_game_rows(std::io::stdout().lock(), &rows)?,
    }

    if let Some(summary) = report::AttentionSummary::from_rows(&rows) {
        eprintln!("Per-game attention: {summary}");
    }

    finish(&aggregator)
}

fn cmd_matchup(
    config: &Config,
    team_a: &str,
    team_b: &str,
    season: Option<i32>,
    window: Window,
) -> Result<()> {
    let mut aggregator = build_aggregator(config, window)?;
    let games: Vec<Game> = selected_games(config, &aggregator)?
        .into_iter()
        .filter(|g| g.is_matchup(team_a, team_b))
        .filter(|g| season.map_or(true, |s| g.season == s))
        .collect();
    if games.is_empty() {
        bail!("no games between {team_a} and {team_b} in the selected seasons");
    }

    let params = params(config, window)?;
    let observations = aggregator.observe_all(&games, &params)?;

    println!("{team_a} vs {team_b} ({window})");
    println!();
    print!(
        "{}",
        report::matchup_table(&report::matchup_lines(&games, &observations))
    );

    finish(&aggregator)
}

fn cmd_locations(
    config: &Config,
    team: Option<&str>,
    field: &str,
    anchors: &[String],
    window: Window,
    top: usize,
) -> Result<()> {
    let mut aggregator = build_aggregator(config, window)?;
    let games: Vec<Game> = selected_games(config, &aggregator)?
        .into_iter()
        .filter(|g| team.map_or(true, |t| g.involves(t)))
        .collect();
    let params = params(config, window)?;

    let tally = aggregator.tally_field(&games, field, anchors, &params)?;

    println!("Top `{field}` values over {} games ({window})", games.len());
    println!();
    print!("{}", report::tally_table(&tally, Some(top)));

    finish(&aggregator)
}

fn cmd_config(config: &Config, cli: &Cli) -> Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    println!(
        "Config file: {:?}",
        cli.config.clone().unwrap_or_else(Config::config_path)
    );
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
