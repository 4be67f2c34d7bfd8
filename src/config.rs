use clap::{ArgAction, Args, Parser, Subcommand};
use std::{net::SocketAddr, path::PathBuf, time::Duration};

use crate::pipeline::PickerOptions;

#[derive(Parser, Debug)]
#[command(
    name = "imgpick",
    version,
    about = "Pick the most representative image of a web page"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub config: Config,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print the best image address for a page
    Pick(PickArgs),
    /// Serve the lookup over HTTP
    Serve {
        /// Address to bind the HTTP server to
        #[arg(long, env = "IMGPICK_BIND_ADDR", default_value = "0.0.0.0:8080")]
        bind: SocketAddr,
    },
}

#[derive(Args, Debug, Clone)]
pub struct PickArgs {
    /// Page to inspect
    pub url: String,

    /// Reference text for similarity scoring
    #[arg(long)]
    pub query: Option<String>,

    /// Read the page body from this file instead of fetching it
    #[arg(long)]
    pub html_file: Option<PathBuf>,

    /// Print every intermediate candidate list as JSON
    #[arg(long)]
    pub debug: bool,
}

/// Settings shared by every subcommand.
#[derive(Parser, Debug, Clone)]
pub struct Config {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Decrease verbosity (-q, -qq, -qqq)
    #[arg(short = 'q', action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Also write logs to this file
    #[arg(long, env = "IMGPICK_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// JSON file with scoring weight overrides
    #[arg(long, env = "IMGPICK_SCORE_CONFIG", global = true)]
    pub score_config: Option<PathBuf>,

    /// Candidates validated concurrently per batch
    #[arg(long, env = "IMGPICK_BATCH_SIZE", default_value_t = 10, global = true)]
    pub batch_size: usize,

    /// Per-image validation timeout
    #[arg(long, env = "IMGPICK_VALIDATE_TIMEOUT_SECS", default_value_t = 5, global = true)]
    pub validate_timeout_secs: u64,

    /// How long a validation result is reused
    #[arg(long, env = "IMGPICK_CACHE_TTL_SECS", default_value_t = 10, global = true)]
    pub cache_ttl_secs: u64,

    /// Timeout for page and stylesheet fetches
    #[arg(long, env = "IMGPICK_FETCH_TIMEOUT_SECS", default_value_t = 45, global = true)]
    pub fetch_timeout_secs: u64,

    /// User-Agent sent with every request
    #[arg(long, env = "IMGPICK_USER_AGENT", global = true)]
    pub user_agent: Option<String>,
}

impl Config {
    #[must_use]
    pub fn verbosity_delta(&self) -> i16 {
        i16::from(self.verbose) - i16::from(self.quiet)
    }

    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        match self.verbosity_delta() {
            d if d <= -2 => "error",
            -1 => "warn",
            0 => "info,imgpick=info,tower_http=info",
            1 => "info,imgpick=debug,tower_http=debug",
            2 => "debug,imgpick=trace,tower_http=trace,reqwest=info,hyper=info",
            _ => "trace,imgpick=trace,tower_http=trace,reqwest=debug,hyper=debug",
        }
    }

    #[must_use]
    pub fn picker_options(&self) -> PickerOptions {
        let defaults = PickerOptions::default();
        PickerOptions {
            batch_size: self.batch_size.max(1),
            validate_timeout: Duration::from_secs(self.validate_timeout_secs),
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_picker_defaults() {
        let cli = Cli::try_parse_from(["imgpick", "pick", "https://a.com/"]).unwrap();
        let opts = cli.config.picker_options();
        let defaults = PickerOptions::default();
        assert_eq!(opts.batch_size, defaults.batch_size);
        assert_eq!(opts.validate_timeout, defaults.validate_timeout);
        assert_eq!(opts.cache_ttl, defaults.cache_ttl);
        assert_eq!(opts.fetch_timeout, defaults.fetch_timeout);
        assert!(matches!(cli.command, Commands::Pick(ref a) if a.url == "https://a.com/"));
    }

    #[test]
    fn verbosity_flags_move_the_filter() {
        let cli = Cli::try_parse_from(["imgpick", "-vv", "serve"]).unwrap();
        assert_eq!(cli.config.verbosity_delta(), 2);
        assert!(cli.config.log_filter().contains("imgpick=trace"));

        let cli = Cli::try_parse_from(["imgpick", "serve", "-qq"]).unwrap();
        assert_eq!(cli.config.log_filter(), "error");
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let cli = Cli::try_parse_from(["imgpick", "--batch-size", "0", "pick", "x"]).unwrap();
        assert_eq!(cli.config.picker_options().batch_size, 1);
    }
}
