/// Series validation - gates cached and freshly fetched data alike
use std::collections::HashSet;

use crate::error::{DataLoaderError, Result, ValidationFailure};
use crate::types::{Field, PriceSeries};

type Checked = std::result::Result<(), ValidationFailure>;

/// Stateless series validator
#[derive(Debug, Clone, Copy, Default)]
pub struct SeriesValidator;

impl SeriesValidator {
    pub fn new() -> Self {
        SeriesValidator
    }

    /// Validate a series for `symbol`, stopping at the first failed check
    pub fn validate(&self, series: &PriceSeries, symbol: &str) -> Result<()> {
        self.check(series, symbol)
            .map_err(|reason| DataLoaderError::validation(symbol, reason))
    }

    fn check(&self, series: &PriceSeries, symbol: &str) -> Checked {
        // Check 1: Non-empty
        if series.is_empty() {
            return Err(ValidationFailure::Empty);
        }

        // Check 2: Required header fields
        Self::check_header(series, symbol)?;

        // Check 3: No missing values
        Self::check_missing(series)?;

        // Check 4: No negatives
        Self::check_negative(series)?;

        // Check 5: Unique, increasing timestamps
        Self::check_timestamps(series)?;

        // Check 6: Real numbers only
        Self::check_numeric(series)?;

        // Check 7: Bars inside the declared window
        Self::check_window(series)?;

        Ok(())
    }

    fn check_header(series: &PriceSeries, symbol: &str) -> Checked {
        if series.symbol.is_empty() {
            return Err(ValidationFailure::MissingField("symbol"));
        }

        if series.symbol != symbol {
            return Err(ValidationFailure::Malformed(format!(
                "series is for {}, requested {}",
                series.symbol, symbol
            )));
        }

        if series.end <= series.start {
            return Err(ValidationFailure::MissingField("date range"));
        }

        Ok(())
    }

    fn check_missing(series: &PriceSeries) -> Checked {
        for (index, bar) in series.bars.iter().enumerate() {
            for field in Field::ALL {
                if bar.value(field).is_nan() {
                    return Err(ValidationFailure::MissingValue { index, field });
                }
            }
        }
        Ok(())
    }

    fn check_negative(series: &PriceSeries) -> Checked {
        for (index, bar) in series.bars.iter().enumerate() {
            for field in Field::ALL {
                let value = bar.value(field);
                if value < 0.0 {
                    return Err(ValidationFailure::NegativeValue { index, field, value });
                }
            }
        }
        Ok(())
    }

    fn check_timestamps(series: &PriceSeries) -> Checked {
        let mut seen = HashSet::with_capacity(series.len());
        for bar in &series.bars {
            if !seen.insert(bar.timestamp) {
                return Err(ValidationFailure::DuplicateTimestamp(bar.timestamp));
            }
        }

        for pair in series.bars.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(ValidationFailure::Unordered {
                    previous: pair[0].timestamp,
                    current: pair[1].timestamp,
                });
            }
        }

        Ok(())
    }

    fn check_numeric(series: &PriceSeries) -> Checked {
        for (index, bar) in series.bars.iter().enumerate() {
            for field in Field::ALL {
                if !bar.value(field).is_finite() {
                    return Err(ValidationFailure::NonNumeric { index, field });
                }
            }
        }
        Ok(())
    }

    fn check_window(series: &PriceSeries) -> Checked {
        let outside = series
            .bars
            .iter()
            .find(|bar| bar.timestamp < series.start || bar.timestamp >= series.end);

        match outside {
            Some(bar) => Err(ValidationFailure::OutOfRange {
                timestamp: bar.timestamp,
                start: series.start,
                end: series.end,
            }),
            None => Ok(()),
        }
    }
}
