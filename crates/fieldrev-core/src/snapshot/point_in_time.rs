//! Point-in-time expressions
//!
//! Accepted forms:
//! - `now`
//! - RFC 3339 timestamps (`2026-03-01T12:00:00Z`)
//! - unix milliseconds (`1767225600000`)
//! - relative offsets `-<n> <unit>` / `+<n> <unit>` with units
//!   second(s), minute(s), hour(s), day(s), week(s)

use crate::errors::VcError;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointInTime {
    Now,
    Absolute(DateTime<Utc>),
    Relative(Duration),
}

impl PointInTime {
    pub fn parse(input: &str) -> Result<Self, VcError> {
        let trimmed = input.trim();
        let invalid = |reason: &str| VcError::InvalidPointInTime {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid("empty expression"));
        }
        if trimmed.eq_ignore_ascii_case("now") {
            return Ok(PointInTime::Now);
        }
        if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(PointInTime::Absolute(ts.with_timezone(&Utc)));
        }
        if trimmed.bytes().all(|b| b.is_ascii_digit()) {
            let ms: i64 = trimmed
                .parse()
                .map_err(|_| invalid("timestamp out of range"))?;
            return Utc
                .timestamp_millis_opt(ms)
                .single()
                .map(PointInTime::Absolute)
                .ok_or_else(|| invalid("timestamp out of range"));
        }

        let (sign, rest) = match trimmed.as_bytes()[0] {
            b'-' => (-1, &trimmed[1..]),
            b'+' => (1, &trimmed[1..]),
            _ => return Err(invalid("expected now, RFC 3339, unix milliseconds or +/-<n> <unit>")),
        };
        let mut parts = rest.split_whitespace();
        let amount: i64 = parts
            .next()
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| invalid("missing amount"))?;
        let unit = parts.next().ok_or_else(|| invalid("missing unit"))?;
        if parts.next().is_some() {
            return Err(invalid("trailing input"));
        }
        let amount = sign * amount;
        let duration = match unit.to_ascii_lowercase().trim_end_matches('s') {
            "second" | "sec" => Duration::try_seconds(amount),
            "minute" | "min" => Duration::try_minutes(amount),
            "hour" => Duration::try_hours(amount),
            "day" => Duration::try_days(amount),
            "week" => Duration::try_weeks(amount),
            _ => return Err(invalid("unknown unit")),
        }
        .ok_or_else(|| invalid("offset out of range"))?;
        Ok(PointInTime::Relative(duration))
    }

    /// Absolute instant relative to `now`
    pub fn resolve(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            PointInTime::Now => now,
            PointInTime::Absolute(ts) => *ts,
            PointInTime::Relative(offset) => now + *offset,
        }
    }

    /// Resolved instant in unix milliseconds, the unit revisions are stamped in
    pub fn resolve_millis(&self, now: DateTime<Utc>) -> i64 {
        self.resolve(now).timestamp_millis()
    }
}

impl FromStr for PointInTime {
    type Err = VcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PointInTime::parse(s)
    }
}

impl fmt::Display for PointInTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointInTime::Now => f.write_str("now"),
            PointInTime::Absolute(ts) => f.write_str(&ts.to_rfc3339()),
            PointInTime::Relative(d) => {
                let secs = d.num_seconds();
                if secs < 0 {
                    write!(f, "-{} seconds", -secs)
                } else {
                    write!(f, "+{} seconds", secs)
                }
            }
        }
    }
}
