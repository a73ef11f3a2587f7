use crate::ConfigError;
use ::std::sync::OnceLock;

pub const DEFAULT_PAGE_LIMIT: u32 = 9;

/// Page size used by [`crate::Pager`] and the GraphQL surface, from `PAGE_LIMIT`.
pub fn page_limit() -> u32 {
    static PAGE_LIMIT: OnceLock<u32> = OnceLock::new();
    *PAGE_LIMIT.get_or_init(|| {
        parse_page_limit(std::env::var("PAGE_LIMIT").ok().as_deref()).unwrap_or_else(|err| {
            tracing::warn!(%err, default = DEFAULT_PAGE_LIMIT, "falling back to default page limit");
            DEFAULT_PAGE_LIMIT
        })
    })
}

/// Upper bound on any requested page size, from `PAGINATION_MAX_COUNT`. Unbounded when unset.
pub fn pagination_max_count() -> &'static Option<u32> {
    static PAGINATION_MAX_COUNT: OnceLock<Option<u32>> = OnceLock::new();
    PAGINATION_MAX_COUNT.get_or_init(|| {
        parse_max_count(std::env::var("PAGINATION_MAX_COUNT").ok().as_deref()).unwrap_or_else(|err| {
            tracing::warn!(%err, "ignoring PAGINATION_MAX_COUNT");
            None
        })
    })
}

pub fn database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing { name: "DATABASE_URL" })
}

pub fn parse_page_limit(value: Option<&str>) -> Result<u32, ConfigError> {
    match value {
        None => Ok(DEFAULT_PAGE_LIMIT),
        Some(value) => parse_positive("PAGE_LIMIT", value),
    }
}

pub fn parse_max_count(value: Option<&str>) -> Result<Option<u32>, ConfigError> {
    value.map(|value| parse_positive("PAGINATION_MAX_COUNT", value)).transpose()
}

fn parse_positive(name: &'static str, value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(ConfigError::NotPositive {
            name,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_limit_defaults_to_nine() {
        assert_eq!(parse_page_limit(None), Ok(9));
        assert_eq!(parse_page_limit(Some(" 20 ")), Ok(20));
    }

    #[test]
    fn zero_and_garbage_are_rejected() {
        assert!(parse_page_limit(Some("0")).is_err());
        assert!(parse_page_limit(Some("-3")).is_err());
        assert_eq!(
            parse_max_count(Some("lots")),
            Err(ConfigError::NotPositive {
                name: "PAGINATION_MAX_COUNT",
                value: "lots".into()
            })
        );
    }

    #[test]
    fn max_count_is_optional() {
        assert_eq!(parse_max_count(None), Ok(None));
        assert_eq!(parse_max_count(Some("50")), Ok(Some(50)));
    }
}
