use crate::config::types::{Config, CrawlerConfig, OutputConfig, SearchConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_search_config(&config.search)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the search table
///
/// Tag values are passed through untouched; only the endpoint URL and the
/// rating range ordering are checked.
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid search url '{}': {}", config.url, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Search url '{}' must use HTTP or HTTPS",
            config.url
        )));
    }

    validate_rating_range(config.rating_range)
}

/// Validates that the rating bounds are finite and ordered
fn validate_rating_range(range: [f64; 2]) -> Result<(), ConfigError> {
    let [low, high] = range;

    if !low.is_finite() || !high.is_finite() {
        return Err(ConfigError::Validation(format!(
            "rating-range bounds must be finite numbers, got [{}, {}]",
            low, high
        )));
    }

    if low > high {
        return Err(ConfigError::Validation(format!(
            "rating-range low bound {} is greater than high bound {}",
            low, high
        )));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.detail_workers < 1 || config.detail_workers > 16 {
        return Err(ConfigError::Validation(format!(
            "detail-workers must be between 1 and 16, got {}",
            config.detail_workers
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.max_page_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-page-retries must be <= 10, got {}",
            config.max_page_retries
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent name cannot be empty".to_string(),
        ));
    }

    if config.name.chars().any(|c| c.is_control()) {
        return Err(ConfigError::Validation(format!(
            "user-agent name contains control characters: '{}'",
            config.name.escape_debug()
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rating_range() {
        assert!(validate_rating_range([5.0, 10.0]).is_ok());
        assert!(validate_rating_range([7.5, 7.5]).is_ok());
        assert!(validate_rating_range([0.0, 0.0]).is_ok());

        assert!(validate_rating_range([10.0, 5.0]).is_err());
        assert!(validate_rating_range([f64::NAN, 5.0]).is_err());
        assert!(validate_rating_range([0.0, f64::INFINITY]).is_err());
    }

    #[test]
    fn test_validate_user_agent() {
        let ok = UserAgentConfig {
            name: "learning_chinese_with_tv_shows".to_string(),
        };
        assert!(validate_user_agent_config(&ok).is_ok());

        let blank = UserAgentConfig {
            name: "   ".to_string(),
        };
        assert!(validate_user_agent_config(&blank).is_err());

        let control = UserAgentConfig {
            name: "bot\nInjected: yes".to_string(),
        };
        assert!(validate_user_agent_config(&control).is_err());
    }

    #[test]
    fn test_validate_crawler_workers_bounds() {
        let mut config = CrawlerConfig::default();
        assert!(validate_crawler_config(&config).is_ok());

        config.detail_workers = 0;
        assert!(validate_crawler_config(&config).is_err());

        config.detail_workers = 17;
        assert!(validate_crawler_config(&config).is_err());
    }
}
