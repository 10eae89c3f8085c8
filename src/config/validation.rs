use super::models::Config;
use crate::boards::moon::is_moon_board;
use thiserror::Error;

const MAX_PAGE_SIZE: u32 = 500;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("retry.max_attempts must be at least 1")]
    NoAttempts,

    #[error("moon.page_size must be between 1 and {max}, got {actual}")]
    InvalidPageSize { actual: u32, max: u32 },

    #[error("{field} must be an http(s) URL, got '{value}'")]
    InvalidUrl { field: String, value: String },

    #[error("aurora.url_template must contain '{{host_base}}', got '{0}'")]
    MissingHostBasePlaceholder(String),

    #[error("Aurora board '{0}' is shadowed by a Moon board of the same name")]
    ShadowedHostBase(String),

    #[error("Aurora board '{0}' has an empty host base")]
    EmptyHostBase(String),

    #[error("output.delimiter must be a single ASCII character other than '\"', got '{0}'")]
    InvalidDelimiter(char),
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_retry(config)?;
    validate_moon(config)?;
    validate_aurora(config)?;
    validate_output(config)?;
    Ok(())
}

fn validate_retry(config: &Config) -> Result<(), ValidationError> {
    if config.retry.max_attempts == 0 {
        return Err(ValidationError::NoAttempts);
    }
    Ok(())
}

fn validate_moon(config: &Config) -> Result<(), ValidationError> {
    let page_size = config.moon.page_size;
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(ValidationError::InvalidPageSize {
            actual: page_size,
            max: MAX_PAGE_SIZE,
        });
    }
    validate_url("moon.api_url", &config.moon.api_url)
}

fn validate_aurora(config: &Config) -> Result<(), ValidationError> {
    let template = &config.aurora.url_template;
    if !template.contains("{host_base}") {
        return Err(ValidationError::MissingHostBasePlaceholder(template.clone()));
    }
    validate_url("aurora.url_template", template)?;

    for (board, host_base) in &config.aurora.host_bases {
        // Moon resolves first, so such an entry could never be selected
        if is_moon_board(board) {
            return Err(ValidationError::ShadowedHostBase(board.clone()));
        }
        if host_base.trim().is_empty() {
            return Err(ValidationError::EmptyHostBase(board.clone()));
        }
    }
    Ok(())
}

fn validate_output(config: &Config) -> Result<(), ValidationError> {
    let delimiter = config.output.delimiter;
    if !delimiter.is_ascii() || delimiter == '"' || delimiter == '\n' || delimiter == '\r' {
        return Err(ValidationError::InvalidDelimiter(delimiter));
    }
    Ok(())
}

fn validate_url(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ValidationError::InvalidUrl {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}
