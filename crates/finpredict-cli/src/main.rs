//! finpredict-cli: fit a forecaster on demand and print dated predictions,
//! or score recent headlines for a company.
//!
//! Usage:
//!   cargo run -p finpredict-cli -- predict AAPL --date 2024-06-28
//!   cargo run -p finpredict-cli -- predict BTC-USD --source coingecko --strategy forest
//!   cargo run -p finpredict-cli -- sentiment Tesla --days 7 --max 20

use analysis_core::{PriceSource, SentimentLabel};
use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use forecast_engine::evaluation::DEFAULT_TRAIN_FRACTION;
use forecast_engine::{evaluate_holdout, ForecastConfig, ForecastStrategy, Forecaster};
use market_data::{
    AlphaVantageClient, CoinGeckoClient, PolygonNewsClient, SeriesFetcher, YahooChartClient,
};
use sentiment_analysis::{SentimentScorer, DEFAULT_LOOKBACK_DAYS, DEFAULT_MAX_ARTICLES};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

const DEFAULT_STEPS: usize = 5;
const DEFAULT_LOOKBACK: usize = 60;
/// Calendar days of history fetched before the cut-off date
const DEFAULT_HISTORY_DAYS: i64 = 730;
const RECENT_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
struct PredictArgs {
    symbol: String,
    date: Option<NaiveDate>,
    history_days: i64,
    steps: usize,
    lookback: usize,
    source: Option<PriceSource>,
    strategy: ForecastStrategy,
    epochs: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
struct SentimentArgs {
    query: String,
    days: i64,
    max_articles: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Predict(PredictArgs),
    Sentiment(SentimentArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "finpredict_cli=info,market_data=warn".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_command(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    match command {
        Command::Predict(args) => run_predict(args).await,
        Command::Sentiment(args) => run_sentiment(args).await,
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  finpredict-cli predict <SYMBOL> [options]   Forecast closes after a date");
    eprintln!("  finpredict-cli sentiment <QUERY> [options]  Score recent headlines");
    eprintln!();
    eprintln!("predict options:");
    eprintln!("  --date YYYY-MM-DD   Last day of history used (default: today)");
    eprintln!("  --days N            History fetched before the date (default: {})", DEFAULT_HISTORY_DAYS);
    eprintln!("  --steps N           Days to predict (default: {})", DEFAULT_STEPS);
    eprintln!("  --lookback N        Window length (default: {})", DEFAULT_LOOKBACK);
    eprintln!("  --source NAME       yahoo | alpha_vantage | coingecko (default: yahoo)");
    eprintln!("  --strategy NAME     sequence | kernel | forest (default: sequence)");
    eprintln!("  --epochs N          Training epochs for the sequence model");
    eprintln!();
    eprintln!("sentiment options:");
    eprintln!("  --days N            News lookback in days (default: {})", DEFAULT_LOOKBACK_DAYS);
    eprintln!("  --max N             Articles to score (default: {})", DEFAULT_MAX_ARTICLES);
}

fn parse_command(args: &[String]) -> Result<Command> {
    let Some(name) = args.first() else {
        bail!("missing command");
    };
    let rest = &args[1..];

    match name.as_str() {
        "predict" => {
            let symbol = positional(rest).context("predict requires a SYMBOL")?;
            let args = PredictArgs {
                symbol: symbol.to_uppercase(),
                date: flag_value(rest, "--date").map(parse_date).transpose()?,
                history_days: parse_flag(rest, "--days", DEFAULT_HISTORY_DAYS)?,
                steps: parse_flag(rest, "--steps", DEFAULT_STEPS)?,
                lookback: parse_flag(rest, "--lookback", DEFAULT_LOOKBACK)?,
                source: flag_value(rest, "--source")
                    .map(|raw| parse_value::<PriceSource>("--source", raw))
                    .transpose()?,
                strategy: parse_flag(rest, "--strategy", ForecastStrategy::default())?,
                epochs: flag_value(rest, "--epochs")
                    .map(|raw| parse_value::<usize>("--epochs", raw))
                    .transpose()?,
            };
            if args.history_days <= 0 {
                bail!("--days must be positive");
            }
            if args.steps == 0 || args.lookback == 0 || args.epochs == Some(0) {
                bail!("--steps, --lookback and --epochs must be at least 1");
            }
            Ok(Command::Predict(args))
        }
        "sentiment" => {
            let query = positional(rest).context("sentiment requires a QUERY")?;
            let args = SentimentArgs {
                query: query.to_string(),
                days: parse_flag(rest, "--days", DEFAULT_LOOKBACK_DAYS)?,
                max_articles: parse_flag(rest, "--max", DEFAULT_MAX_ARTICLES)?,
            };
            if args.days <= 0 || args.max_articles == 0 {
                bail!("--days and --max must be positive");
            }
            Ok(Command::Sentiment(args))
        }
        other => bail!("unknown command: {}", other),
    }
}

/// First argument that is neither a flag nor a flag's value.
fn positional(args: &[String]) -> Option<&str> {
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
        } else if arg.starts_with("--") {
            skip_next = true;
        } else {
            return Some(arg.as_str());
        }
    }
    None
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn parse_flag<T>(args: &[String], flag: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match flag_value(args, flag) {
        Some(raw) => parse_value(flag, raw),
        None => Ok(default),
    }
}

fn parse_value<T>(flag: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| anyhow!("Invalid value for {}: {} ({})", flag, raw, e))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid date format: {} (expected YYYY-MM-DD)", raw))
}

/// Calendar days following `after`, one per predicted step.
fn prediction_dates(after: NaiveDate, steps: usize) -> Vec<NaiveDate> {
    (1..=steps as i64)
        .map_while(|i| Duration::try_days(i).and_then(|d| after.checked_add_signed(d)))
        .collect()
}

fn build_fetcher() -> SeriesFetcher {
    let mut fetcher = SeriesFetcher::new(PriceSource::Yahoo)
        .with_provider(Arc::new(YahooChartClient::new()))
        .with_provider(Arc::new(CoinGeckoClient::new()));
    if let Some(key) = env_key("ALPHA_VANTAGE_API_KEY") {
        fetcher = fetcher.with_provider(Arc::new(AlphaVantageClient::new(key)));
    }
    fetcher
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

async fn run_predict(args: PredictArgs) -> Result<()> {
    let today = Utc::now().date_naive();
    let cutoff = args.date.unwrap_or(today);
    if cutoff > today {
        bail!("--date {} is in the future", cutoff);
    }

    let span = (today - cutoff).num_days().saturating_add(args.history_days);
    let snapshot = build_fetcher()
        .fetch(&args.symbol, span, args.source)
        .await
        .with_context(|| format!("Could not fetch data for {}", args.symbol))?;

    let series = snapshot.series.truncate_after(cutoff);
    if series.is_empty() {
        bail!("No price data for {} on or before {}", args.symbol, cutoff);
    }
    let closes = series.closes();
    tracing::info!(
        "{}: {} closes up to {} from {}",
        args.symbol,
        closes.len(),
        cutoff,
        snapshot.source
    );

    let mut config = ForecastConfig {
        strategy: args.strategy,
        lookback: args.lookback,
        ..ForecastConfig::default()
    };
    if let Some(epochs) = args.epochs {
        config = config.with_epochs(epochs);
    }
    let forecaster = Forecaster::new(config);
    let steps = args.steps;

    let (forecast, holdout) = tokio::task::spawn_blocking(move || {
        let forecast = forecaster.forecast(&closes, steps);
        let holdout = evaluate_holdout(&forecaster, &closes, DEFAULT_TRAIN_FRACTION);
        (forecast, holdout)
    })
    .await
    .context("forecast task failed")?;
    let forecast = forecast.with_context(|| format!("Could not forecast {}", args.symbol))?;

    println!();
    println!(
        "Predicted prices for the next {} days after {} ({}):",
        steps,
        cutoff,
        forecast.strategy.model_name()
    );
    for (date, price) in prediction_dates(cutoff, forecast.path.len())
        .into_iter()
        .zip(&forecast.path)
    {
        println!("{}: {:.2}", date, price);
    }

    println!();
    println!("Last {} actual closes:", RECENT_ROWS);
    for bar in series.tail(RECENT_ROWS) {
        println!(
            "{}: {:.2} (scaled {:.4})",
            bar.date,
            bar.close,
            forecast.scaler.transform(bar.close)
        );
    }
    println!(
        "Scaler min: {:.2}, max: {:.2}",
        forecast.scaler.min(),
        forecast.scaler.max()
    );

    println!();
    match holdout {
        Ok(report) => {
            println!(
                "Hold-out ({} train / {} test windows): RMSE {:.4}, MAE {:.4}, direction {:.1}%",
                report.train_windows,
                report.test_windows,
                report.rmse,
                report.mae,
                report.directional_accuracy * 100.0
            );
        }
        Err(e) => tracing::warn!("Hold-out evaluation skipped: {}", e),
    }

    Ok(())
}

async fn run_sentiment(args: SentimentArgs) -> Result<()> {
    let key = env_key("POLYGON_API_KEY").context("POLYGON_API_KEY must be set")?;
    let scorer = SentimentScorer::new(Some(Arc::new(PolygonNewsClient::new(key))));

    let result = scorer.score(&args.query, args.days, args.max_articles).await;
    if let Some(error) = &result.error {
        bail!("Could not score headlines for {}: {}", args.query, error);
    }

    println!();
    println!("{:>7}  {:<10}  Headline", "Score", "Date");
    for headline in &result.headlines {
        let date = headline
            .date
            .map(|d| d.date_naive().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:>+7.3}  {:<10}  {}", headline.sentiment, date, headline.title);
    }
    println!();
    println!(
        "{}: {} ({:+.3}) over {} articles, confidence {:.2}",
        args.query,
        label_text(result.sentiment_label),
        result.sentiment_score,
        result.articles_analyzed,
        result.confidence
    );

    Ok(())
}

fn label_text(label: SentimentLabel) -> &'static str {
    match label {
        SentimentLabel::Positive => "positive",
        SentimentLabel::Neutral => "neutral",
        SentimentLabel::Negative => "negative",
    }
}
