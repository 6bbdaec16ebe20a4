use anyhow::Result;
use ethers::types::{Address, U256};
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use reqwest::StatusCode;

use crate::error::SweepError;

pub const PROJECT_NAME: &str = "sweeper";

pub fn setup_logger(level: LevelFilter) -> Result<()> {
    let colors = ColoredLevelConfig {
        trace: Color::Cyan,
        debug: Color::Magenta,
        info: Color::Green,
        warn: Color::Yellow,
        error: Color::BrightRed,
    };

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{}[{}] {}",
                chrono::Local::now().format("[%Y-%m-%d %H:%M:%S]"),
                colors.color(record.level()),
                message
            ))
        })
        .chain(std::io::stdout())
        .level(LevelFilter::Warn)
        .level_for(PROJECT_NAME, level)
        .apply()?;

    Ok(())
}

pub fn parse_level(level: &str) -> Option<LevelFilter> {
    match level.to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// Full lowercase hex; `Display` on ethers addresses elides the middle.
pub fn fmt_address(address: Address) -> String {
    format!("{:?}", address)
}

/// Parses a `0x`-prefixed (or bare) hex quantity. Empty strings read as zero.
pub fn parse_hex_u256(raw: &str) -> Option<U256> {
    let digits = raw.trim().trim_start_matches("0x");
    if digits.is_empty() {
        return Some(U256::zero());
    }
    U256::from_str_radix(digits, 16).ok()
}

/// Maps a non-success HTTP status from an external API onto the sweep taxonomy.
pub fn upstream_status_error(service: &'static str, status: StatusCode, body: &str) -> SweepError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return SweepError::RateLimited { service };
    }
    let snippet: String = body.chars().take(200).collect();
    SweepError::UpstreamUnavailable {
        service,
        reason: format!("status {}: {}", status, snippet),
    }
}

/// Some backends carry their API key in the request path, so the URL is
/// stripped before the error can reach a log line.
pub fn upstream_request_error(service: &'static str, err: reqwest::Error) -> SweepError {
    SweepError::UpstreamUnavailable {
        service,
        reason: err.without_url().to_string(),
    }
}
