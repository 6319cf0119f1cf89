//! Relative cache-time expressions and HTTP date handling.
//!
//! A cache time is written the way an operator would say it, e.g. `+1 day`,
//! `2 hours`, or `+1 week 3 days`. It is resolved against the current time on
//! every response, so calendar units (`month`, `year`) follow the calendar
//! instead of a fixed number of seconds.
//!
//! HTTP dates are always emitted in the RFC 1123 form
//! (`Sun, 06 Nov 1994 08:49:37 GMT`). Parsing additionally accepts the
//! obsolete RFC 850 and asctime forms that RFC 9110 requires recipients to
//! understand.

use std::fmt;

use chrono::{DateTime, Months, NaiveDateTime, TimeDelta, Utc};

use crate::error::ConfigError;

/// strftime pattern for RFC 1123 dates.
pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Default cache time expression.
pub const DEFAULT_CACHE_TIME: &str = "+1 day";

// =============================================================================
// Cache Time
// =============================================================================

/// Unit of a single cache time term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimeUnit {
    fn parse(word: &str) -> Option<Self> {
        let unit = match word.to_ascii_lowercase().as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" => TimeUnit::Second,
            "min" | "mins" | "minute" | "minutes" => TimeUnit::Minute,
            "h" | "hour" | "hours" => TimeUnit::Hour,
            "d" | "day" | "days" => TimeUnit::Day,
            "week" | "weeks" => TimeUnit::Week,
            "month" | "months" => TimeUnit::Month,
            "year" | "years" => TimeUnit::Year,
            _ => return None,
        };
        Some(unit)
    }

    fn name(self) -> &'static str {
        match self {
            TimeUnit::Second => "second",
            TimeUnit::Minute => "minute",
            TimeUnit::Hour => "hour",
            TimeUnit::Day => "day",
            TimeUnit::Week => "week",
            TimeUnit::Month => "month",
            TimeUnit::Year => "year",
        }
    }
}

/// A parsed relative time expression such as `+1 day`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTime {
    terms: Vec<(u32, TimeUnit)>,
}

impl CacheTime {
    /// Parse a relative time expression.
    ///
    /// Terms are `[+]<amount> <unit>` and may be repeated. The amount and the
    /// unit may also be written together (`30min`). Negative amounts are
    /// rejected since they would produce an `Expires` in the past.
    pub fn parse(expression: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidCacheTime {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let mut tokens: Vec<&str> = Vec::new();
        for word in expression.split_whitespace() {
            // "30min" splits into "30" and "min"
            match word.find(|c: char| c.is_ascii_alphabetic()) {
                Some(idx) if idx > 0 => {
                    tokens.push(&word[..idx]);
                    tokens.push(&word[idx..]);
                }
                _ => tokens.push(word),
            }
        }

        if tokens.is_empty() {
            return Err(invalid("expression is empty"));
        }

        let mut terms = Vec::new();
        let mut iter = tokens.into_iter();
        while let Some(amount) = iter.next() {
            if amount.starts_with('-') {
                return Err(invalid("negative durations are not allowed"));
            }
            let amount = amount
                .strip_prefix('+')
                .unwrap_or(amount)
                .parse::<u32>()
                .map_err(|_| invalid("expected a number"))?;
            let unit = iter.next().ok_or_else(|| invalid("missing time unit"))?;
            let unit = TimeUnit::parse(unit).ok_or_else(|| invalid("unknown time unit"))?;
            terms.push((amount, unit));
        }

        Ok(Self { terms })
    }

    /// Instant at which a response produced at `now` expires.
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.terms
            .iter()
            .fold(now, |at, &(amount, unit)| add_term(at, amount, unit))
    }

    /// Seconds between `now` and [`Self::expires_at`].
    pub fn max_age(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at(now) - now).num_seconds()
    }
}

fn add_term(at: DateTime<Utc>, amount: u32, unit: TimeUnit) -> DateTime<Utc> {
    let amount_i64 = i64::from(amount);
    let shifted = match unit {
        TimeUnit::Second => at.checked_add_signed(TimeDelta::seconds(amount_i64)),
        TimeUnit::Minute => at.checked_add_signed(TimeDelta::minutes(amount_i64)),
        TimeUnit::Hour => at.checked_add_signed(TimeDelta::hours(amount_i64)),
        TimeUnit::Day => at.checked_add_signed(TimeDelta::days(amount_i64)),
        TimeUnit::Week => at.checked_add_signed(TimeDelta::weeks(amount_i64)),
        TimeUnit::Month => at.checked_add_months(Months::new(amount)),
        TimeUnit::Year => amount
            .checked_mul(12)
            .and_then(|months| at.checked_add_months(Months::new(months))),
    };
    shifted.unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl fmt::Display for CacheTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .terms
            .iter()
            .map(|(amount, unit)| {
                let plural = if *amount == 1 { "" } else { "s" };
                format!("+{} {}{}", amount, unit.name(), plural)
            })
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}

/// Whether a configured cache time means "disabled".
pub fn is_disabled_expression(expression: &str) -> bool {
    matches!(
        expression.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "off" | "no" | "none"
    )
}

// =============================================================================
// HTTP Dates
// =============================================================================

/// Format an instant as an RFC 1123 HTTP date.
pub fn format_http_date(time: DateTime<Utc>) -> String {
    time.format(HTTP_DATE_FORMAT).to_string()
}

/// Format a Unix timestamp (seconds) as an RFC 1123 HTTP date.
pub fn format_timestamp(timestamp: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(format_http_date)
}

/// Parse an HTTP date header into a Unix timestamp (seconds).
pub fn parse_http_date(value: &str) -> Option<i64> {
    let value = value.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.timestamp());
    }

    // RFC 850: Sunday, 06-Nov-94 08:49:37 GMT
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%A, %d-%b-%y %H:%M:%S GMT") {
        return Some(parsed.and_utc().timestamp());
    }

    // asctime: Sun Nov  6 08:49:37 1994
    NaiveDateTime::parse_from_str(value, "%a %b %e %H:%M:%S %Y")
        .ok()
        .map(|parsed| parsed.and_utc().timestamp())
}

// =============================================================================
// Tests
// =============================================================================
