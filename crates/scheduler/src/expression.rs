//! Schedule expressions in the `rate(..)` / `cron(..)` dialect.
//!
//! - `rate(10 minutes)`, `rate(1 hour)`, `rate(2 days)`
//! - `cron(min hour day-of-month month day-of-week year)`, e.g.
//!   `cron(0/30 * * 6-9 ? *)`; day-of-week runs 1-7 starting on Sunday.
//!
//! Several expressions are written as one string separated by `", "`
//! (a bare comma belongs to cron list syntax).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::SchedulerError;

#[derive(Debug, Clone)]
enum Kind {
    Rate(Duration),
    Cron(Box<cron::Schedule>),
}

#[derive(Debug, Clone)]
pub struct ScheduleExpression {
    source: String,
    kind: Kind,
}

fn invalid(expression: &str, reason: impl Into<String>) -> SchedulerError {
    SchedulerError::InvalidExpression {
        expression: expression.to_string(),
        reason: reason.into(),
    }
}

fn parse_rate(expression: &str, body: &str) -> Result<Duration, SchedulerError> {
    let mut parts = body.split_whitespace();
    let (Some(value), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid(expression, "expected 'rate(<value> <unit>)'"));
    };

    let value: u64 = value
        .parse()
        .map_err(|_| invalid(expression, format!("'{value}' is not a positive integer")))?;
    if value == 0 {
        return Err(invalid(expression, "rate must be greater than zero"));
    }

    let unit_secs = match unit {
        "minute" | "minutes" => 60,
        "hour" | "hours" => 60 * 60,
        "day" | "days" => 24 * 60 * 60,
        other => return Err(invalid(expression, format!("unknown unit '{other}'"))),
    };
    Ok(Duration::from_secs(value * unit_secs))
}

fn parse_cron(expression: &str, body: &str) -> Result<cron::Schedule, SchedulerError> {
    let fields = body.split_whitespace().count();
    if fields != 6 {
        return Err(invalid(
            expression,
            format!("expected 6 fields (min hour dom month dow year), found {fields}"),
        ));
    }
    // The cron crate wants a leading seconds field.
    cron::Schedule::from_str(&format!("0 {body}")).map_err(|e| invalid(expression, e.to_string()))
}

impl ScheduleExpression {
    pub fn parse(expression: &str) -> Result<Self, SchedulerError> {
        let source = expression.trim();
        let kind = if let Some(body) = source.strip_prefix("rate(").and_then(|s| s.strip_suffix(')')) {
            Kind::Rate(parse_rate(source, body)?)
        } else if let Some(body) = source.strip_prefix("cron(").and_then(|s| s.strip_suffix(')')) {
            Kind::Cron(Box::new(parse_cron(source, body)?))
        } else {
            return Err(invalid(source, "expected rate(...) or cron(...)"));
        };

        Ok(Self {
            source: source.to_string(),
            kind,
        })
    }

    /// Parse a `", "`-separated list of expressions.
    pub fn parse_list(list: &str) -> Result<Vec<Self>, SchedulerError> {
        let schedules = list
            .split(", ")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::parse)
            .collect::<Result<Vec<_>, _>>()?;

        if schedules.is_empty() {
            return Err(SchedulerError::NoSchedules);
        }
        Ok(schedules)
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.kind {
            Kind::Rate(interval) => chrono::Duration::from_std(*interval)
                .ok()
                .and_then(|step| after.checked_add_signed(step)),
            Kind::Cron(schedule) => schedule.after(&after).next(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for ScheduleExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for ScheduleExpression {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
