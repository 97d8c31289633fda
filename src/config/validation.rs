use crate::config::types::{Config, DiagnosticsConfig, InputConfig, OutputConfig, PipelineConfig};
use crate::{ConfigError, ConfigResult};

/// Upper bound for the chunk queue capacity
const MAX_QUEUE_CAPACITY: usize = 10_000;

/// Upper bound for the charset sniffing window
const MAX_CHARSET_SNIFF_BYTES: usize = 65_536;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_pipeline_config(&config.pipeline)?;
    validate_diagnostics_config(&config.diagnostics)?;
    validate_output_config(&config.output)?;
    validate_input_config(&config.input)?;
    Ok(())
}

fn validate_pipeline_config(config: &PipelineConfig) -> ConfigResult<()> {
    if config.chunk_size < 1 {
        return Err(ConfigError::Validation(format!(
            "chunk-size must be >= 1, got {}",
            config.chunk_size
        )));
    }

    if config.queue_capacity < 1 || config.queue_capacity > MAX_QUEUE_CAPACITY {
        return Err(ConfigError::Validation(format!(
            "queue-capacity must be between 1 and {}, got {}",
            MAX_QUEUE_CAPACITY, config.queue_capacity
        )));
    }

    if config.anchor_text_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "anchor-text-limit must be >= 1, got {}",
            config.anchor_text_limit
        )));
    }

    if config.charset_sniff_bytes < 1 || config.charset_sniff_bytes > MAX_CHARSET_SNIFF_BYTES {
        return Err(ConfigError::Validation(format!(
            "charset-sniff-bytes must be between 1 and {}, got {}",
            MAX_CHARSET_SNIFF_BYTES, config.charset_sniff_bytes
        )));
    }

    Ok(())
}

fn validate_diagnostics_config(config: &DiagnosticsConfig) -> ConfigResult<()> {
    if config.errors_path.is_empty() {
        return Err(ConfigError::Validation(
            "errors-path cannot be empty".to_string(),
        ));
    }

    if config.capacity < 1 {
        return Err(ConfigError::Validation(format!(
            "diagnostics capacity must be >= 1, got {}",
            config.capacity
        )));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> ConfigResult<()> {
    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch-size must be >= 1, got {}",
            config.batch_size
        )));
    }
    Ok(())
}

fn validate_input_config(config: &InputConfig) -> ConfigResult<()> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_chunk_size() {
        let mut config = Config::default();
        config.pipeline.chunk_size = 0;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_queue_capacity_bounds() {
        let mut config = Config::default();
        config.pipeline.queue_capacity = 0;
        assert!(validate(&config).is_err());

        config.pipeline.queue_capacity = MAX_QUEUE_CAPACITY;
        assert!(validate(&config).is_ok());

        config.pipeline.queue_capacity = MAX_QUEUE_CAPACITY + 1;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_charset_sniff_bounds() {
        let mut config = Config::default();
        config.pipeline.charset_sniff_bytes = 0;
        assert!(validate(&config).is_err());

        config.pipeline.charset_sniff_bytes = MAX_CHARSET_SNIFF_BYTES + 1;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_anchor_text_limit() {
        let mut config = Config::default();
        config.pipeline.anchor_text_limit = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_errors_path() {
        let mut config = Config::default();
        config.diagnostics.errors_path = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_diagnostics_capacity() {
        let mut config = Config::default();
        config.diagnostics.capacity = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_batch_size() {
        let mut config = Config::default();
        config.output.batch_size = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_blank_user_agent() {
        let mut config = Config::default();
        config.input.user_agent = "   ".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = Config::default();
        config.input.timeout_secs = 0;
        assert!(validate(&config).is_err());
    }
}
