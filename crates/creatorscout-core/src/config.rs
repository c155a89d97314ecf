use crate::app_config::{AppConfig, VideoCap};
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from the variables already in the process,
/// without reading `.env`.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build configuration from an arbitrary env-var lookup so tests can feed a
/// plain `HashMap`.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but cannot be parsed.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        parse_flag(&or_default(var, default)).ok_or_else(|| {
            invalid(var, "expected one of true/false/1/0/yes/no".to_string())
        })
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
    };

    let log_level = or_default("CREATORSCOUT_LOG_LEVEL", "info");
    let ads_base_url = or_default("CREATORSCOUT_ADS_BASE_URL", "https://ads.tiktok.com");
    let web_base_url = or_default("CREATORSCOUT_WEB_BASE_URL", "https://www.tiktok.com");
    let user_agent = or_default("CREATORSCOUT_USER_AGENT", DEFAULT_USER_AGENT);
    let request_timeout_secs = parse_u64("CREATORSCOUT_REQUEST_TIMEOUT_SECS", "30")?;
    let network_wait_timeout_ms = parse_u64("CREATORSCOUT_NETWORK_WAIT_TIMEOUT_MS", "15000")?;
    let max_bootstrap_retries = parse_u32("CREATORSCOUT_MAX_BOOTSTRAP_RETRIES", "5")?;
    if max_bootstrap_retries == 0 {
        return Err(invalid(
            "CREATORSCOUT_MAX_BOOTSTRAP_RETRIES",
            "must be at least 1".to_string(),
        ));
    }

    let discovery_max_retry = parse_u32("CREATORSCOUT_DISCOVERY_MAX_RETRY", "3")?;
    let discovery_retry_delay_ms = parse_u64("CREATORSCOUT_DISCOVERY_RETRY_DELAY_MS", "1000")?;
    let discovery_page_delay_ms = parse_u64("CREATORSCOUT_DISCOVERY_PAGE_DELAY_MS", "1000")?;
    let discovery_max_data = optional("CREATORSCOUT_DISCOVERY_MAX_DATA")
        .map(|raw| {
            raw.parse::<usize>()
                .map_err(|e| invalid("CREATORSCOUT_DISCOVERY_MAX_DATA", e.to_string()))
        })
        .transpose()?;

    let pool_max_concurrency = parse_usize("CREATORSCOUT_POOL_MAX_CONCURRENCY", "3")?;
    if pool_max_concurrency == 0 {
        return Err(invalid(
            "CREATORSCOUT_POOL_MAX_CONCURRENCY",
            "must be at least 1".to_string(),
        ));
    }
    let pool_retry_limit = parse_u32("CREATORSCOUT_POOL_RETRY_LIMIT", "3")?;
    let pool_retry_delay_ms = parse_u64("CREATORSCOUT_POOL_RETRY_DELAY_MS", "5000")?;
    let pool_task_timeout_secs = parse_u64("CREATORSCOUT_POOL_TASK_TIMEOUT_SECS", "60")?;

    let min_engagement_rate = or_default("CREATORSCOUT_MIN_ENGAGEMENT_RATE", "0.05")
        .parse::<f64>()
        .map_err(|e| invalid("CREATORSCOUT_MIN_ENGAGEMENT_RATE", e.to_string()))?;
    if !min_engagement_rate.is_finite() || min_engagement_rate < 0.0 {
        return Err(invalid(
            "CREATORSCOUT_MIN_ENGAGEMENT_RATE",
            "must be a non-negative number".to_string(),
        ));
    }
    let min_views = or_default("CREATORSCOUT_MIN_VIEWS", "500000")
        .parse::<i64>()
        .map_err(|e| invalid("CREATORSCOUT_MIN_VIEWS", e.to_string()))?;

    let creator_video_cap = parse_video_cap(&or_default("CREATORSCOUT_CREATOR_VIDEO_CAP", "30"))
        .map_err(|reason| invalid("CREATORSCOUT_CREATOR_VIDEO_CAP", reason))?;
    let scroll_delay_ms = parse_u64("CREATORSCOUT_SCROLL_DELAY_MS", "1000")?;
    let enrich_videos = parse_bool("CREATORSCOUT_ENRICH_VIDEOS", "false")?;
    let chrome_headless = parse_bool("CREATORSCOUT_CHROME_HEADLESS", "true")?;

    let telegram_bot_token = optional("CREATORSCOUT_TELEGRAM_BOT_TOKEN");
    let telegram_chat_id = optional("CREATORSCOUT_TELEGRAM_CHAT_ID");

    Ok(AppConfig {
        log_level,
        ads_base_url,
        web_base_url,
        user_agent,
        request_timeout_secs,
        network_wait_timeout_ms,
        max_bootstrap_retries,
        discovery_max_retry,
        discovery_retry_delay_ms,
        discovery_page_delay_ms,
        discovery_max_data,
        pool_max_concurrency,
        pool_retry_limit,
        pool_retry_delay_ms,
        pool_task_timeout_secs,
        min_engagement_rate,
        min_views,
        creator_video_cap,
        scroll_delay_ms,
        enrich_videos,
        chrome_headless,
        telegram_bot_token,
        telegram_chat_id,
    })
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// `all` keeps the full timeline, a positive integer caps it.
fn parse_video_cap(s: &str) -> Result<VideoCap, String> {
    let trimmed = s.trim();
    if trimmed.eq_ignore_ascii_case("all") {
        return Ok(VideoCap::All);
    }
    match trimmed.parse::<usize>() {
        Ok(0) => Err("must be positive or \"all\"".to_string()),
        Ok(n) => Ok(VideoCap::Recent(n)),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
