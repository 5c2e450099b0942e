//! Parsing helpers for raw environment values.
#![allow(clippy::redundant_pub_crate)]

use std::time::Duration;

use url::Url;

use crate::defaults::UPLOAD_CHUNK_GRANULARITY;
use crate::error::{ConfigError, ConfigResult};

pub(crate) fn parse_i64(field: &'static str, raw: &str) -> ConfigResult<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ConfigError::invalid(field, raw, "not_an_integer"))
}

pub(crate) fn parse_positive_u64(field: &'static str, raw: &str) -> ConfigResult<u64> {
    let value = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::invalid(field, raw, "not_an_unsigned_integer"))?;
    if value == 0 {
        return Err(ConfigError::invalid(field, raw, "must_be_positive"));
    }
    Ok(value)
}

pub(crate) fn parse_positive_usize(field: &'static str, raw: &str) -> ConfigResult<usize> {
    let value = parse_positive_u64(field, raw)?;
    usize::try_from(value).map_err(|_| ConfigError::invalid(field, raw, "out_of_range"))
}

pub(crate) fn parse_u32(field: &'static str, raw: &str) -> ConfigResult<u32> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| ConfigError::invalid(field, raw, "not_an_unsigned_integer"))
}

pub(crate) fn parse_secs(field: &'static str, raw: &str) -> ConfigResult<Duration> {
    parse_positive_u64(field, raw).map(Duration::from_secs)
}

pub(crate) fn parse_http_url(field: &'static str, raw: &str) -> ConfigResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|_| ConfigError::invalid(field, raw, "invalid_url"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(field, raw, "unsupported_scheme"));
    }
    Ok(url)
}

pub(crate) fn parse_chunk_size(field: &'static str, raw: &str) -> ConfigResult<usize> {
    let value = parse_positive_usize(field, raw)?;
    if value % UPLOAD_CHUNK_GRANULARITY != 0 {
        return Err(ConfigError::invalid(field, raw, "not_a_multiple_of_256_kib"));
    }
    Ok(value)
}

/// Strip a leading `@` and surrounding whitespace from a channel handle.
pub(crate) fn normalize_handle(field: &'static str, raw: &str) -> ConfigResult<String> {
    let trimmed = raw.trim().trim_start_matches('@');
    if trimmed.is_empty() {
        return Err(ConfigError::invalid(field, raw, "empty_handle"));
    }
    Ok(trimmed.to_string())
}
