use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::models::{ExcursionStatus, ExcursionSummary};
use crate::numeric::parse_score;

#[derive(Debug, Error, PartialEq)]
pub enum ExcursionInputError {
    #[error("price {0:?} is not a number")]
    NotANumber(String),
    #[error("price {0} is negative")]
    Negative(f64),
    #[error("unknown excursion field {0:?} (expected attends or paid)")]
    UnknownField(String),
}

/// The two per-student flags that can be set for a whole class at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcursionField {
    Attends,
    Paid,
}

impl ExcursionField {
    pub fn column(self) -> &'static str {
        match self {
            ExcursionField::Attends => "attends",
            ExcursionField::Paid => "paid",
        }
    }
}

impl fmt::Display for ExcursionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for ExcursionField {
    type Err = ExcursionInputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "attends" => Ok(ExcursionField::Attends),
            "paid" => Ok(ExcursionField::Paid),
            other => Err(ExcursionInputError::UnknownField(other.to_string())),
        }
    }
}

/// Price as typed, comma or dot decimals. Blank means free.
pub fn parse_price(raw: &str) -> Result<Option<f64>, ExcursionInputError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let price = parse_score(raw).ok_or_else(|| ExcursionInputError::NotANumber(raw.to_string()))?;
    if price < 0.0 {
        return Err(ExcursionInputError::Negative(price));
    }
    Ok(Some(price))
}

pub fn summarize(statuses: &[ExcursionStatus], price: Option<f64>) -> ExcursionSummary {
    let total = statuses.len();
    let attending = statuses.iter().filter(|status| status.attends).count();
    let paid = statuses.iter().filter(|status| status.paid).count();
    let outstanding = statuses
        .iter()
        .filter(|status| status.attends && !status.paid)
        .count();

    ExcursionSummary {
        total,
        attending,
        paid,
        outstanding,
        attendance_rate: if total == 0 {
            None
        } else {
            Some(attending as f64 / total as f64)
        },
        collected: price.map(|price| price * paid as f64),
    }
}
