use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use log::error;

use tardis_norm::layout::parse_date;
use tardis_norm::replay::{cache_capture, DownloadRequest, TardisHttpClient, DEFAULT_ENDPOINT};
use tardis_norm::storage::Compression;
use tardis_norm::{
    AggregationPipeline, Error, MalformedPolicy, PipelineConfig, PipelineOutcome,
};

#[derive(Parser, Debug)]
#[command(name = "tardis-get-trades")]
#[command(about = "Download a day of Tardis trades and normalize it into a parquet table")]
struct Cli {
    /// Exchange id (e.g. bitmex, binance-futures, kraken)
    exchange: String,

    /// Capture date (YYYY-MM-DD)
    date: String,

    /// Comma-separated symbols to request (e.g. XBTUSD,ETHUSD)
    #[arg(value_delimiter = ',')]
    symbols: Vec<String>,

    /// Root directory for captures
    #[arg(long = "cache_dir", alias = "cache-dir", env = "CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Tardis API key
    #[arg(long = "api_key", alias = "api-key", env = "TARDIS_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Replay service endpoint
    #[arg(long, env = "TARDIS_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Process an existing capture directory instead of downloading
    #[arg(long)]
    capture_dir: Option<PathBuf>,

    /// Message count above which the capture is processed per partition
    #[arg(long, default_value_t = PipelineConfig::default().partition_threshold)]
    threshold: usize,

    /// Abort on the first malformed line instead of skipping it
    #[arg(long)]
    strict: bool,

    /// Codec for written tables
    #[arg(long, value_enum, default_value_t = Compression::Lz4)]
    compression: Compression,
}

fn main() -> ExitCode {
    let _ = dotenv::dotenv();
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let malformed = if cli.strict {
        MalformedPolicy::Abort
    } else {
        MalformedPolicy::Skip
    };
    let config = PipelineConfig::default()
        .with_partition_threshold(cli.threshold)
        .with_compression(cli.compression)
        .with_malformed(malformed);
    let pipeline = AggregationPipeline::new(&cli.exchange, config)?;
    let date = parse_date(&cli.date).map_err(Error::from)?;

    let capture = match cli.capture_dir {
        Some(dir) => dir,
        None => {
            let Some(cache_dir) = cli.cache_dir else {
                Cli::command()
                    .error(
                        ErrorKind::MissingRequiredArgument,
                        "--cache_dir (or CACHE_DIR) is required unless --capture-dir is given",
                    )
                    .exit();
            };
            let request = DownloadRequest::for_exchange(&cli.exchange, date, cli.symbols)?
                .with_api_key(cli.api_key);
            let client = TardisHttpClient::with_endpoint(cli.endpoint)?;
            let runtime = tokio::runtime::Runtime::new().context("start tokio runtime")?;
            runtime
                .block_on(cache_capture(&client, &request, &cache_dir))
                .with_context(|| format!("cache {} capture", cli.exchange))?
        }
    };

    match pipeline.run(&capture, date)? {
        PipelineOutcome::Empty { capture } => {
            println!(
                "no trade messages in {}, nothing written",
                capture.display()
            );
        }
        PipelineOutcome::Written(report) => {
            println!(
                "wrote rows={} strategy={:?} files={} malformed={} unmapped={} output={}",
                report.rows,
                report.strategy,
                report.stats.files,
                report.stats.malformed,
                report.stats.unmapped.total(),
                report.output.display()
            );
        }
    }
    Ok(())
}

fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<Error>().map_or(1, Error::exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_split_on_commas() {
        let cli = Cli::try_parse_from([
            "tardis-get-trades",
            "kraken",
            "2020-09-01",
            "XBT/USD,ETH/USD",
            "--cache_dir",
            "/tmp/x",
        ])
        .unwrap();
        assert_eq!(cli.symbols, vec!["XBT/USD", "ETH/USD"]);
        assert_eq!(cli.cache_dir, Some(PathBuf::from("/tmp/x")));
    }

    #[test]
    fn capture_dir_needs_no_symbols() {
        let cli = Cli::try_parse_from([
            "tardis-get-trades",
            "kraken",
            "2020-09-01",
            "--capture-dir",
            "/tmp/capture",
        ])
        .unwrap();
        assert!(cli.symbols.is_empty());
        assert!(!cli.strict);
        assert_eq!(cli.compression, Compression::Lz4);
    }
}
