//! Cycle statistics.
//!
//! Everything here is a pure function of its input: an ascending history of
//! period observations for one user, that user's luteal phase length, and
//! the date the caller considers "today".

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// Number of most recent cycles averaged into `recent_average_cycle_length`.
pub const RECENT_CYCLE_WINDOW: usize = 6;

/// Length in days of the fertile window, which ends on the predicted ovulation date.
pub const FERTILE_WINDOW_DAYS: i64 = 5;

/// How many future cycles are projected into `predicted_events`.
pub const PROJECTED_CYCLES: i64 = 3;

/// Longest luteal phase accepted, in days.
pub const MAX_LUTEAL_PHASE_LENGTH: i32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub first_day: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StatisticsError {
    #[error("luteal phase length must be between 1 and {max} days, got {0}", max = MAX_LUTEAL_PHASE_LENGTH)]
    InvalidLutealPhase(i32),

    #[error("predicted dates after {last_period_start} fall outside the supported calendar range")]
    DateOutOfRange { last_period_start: NaiveDate },

    #[error("event at {current} comes after an event at {previous}; history must be in ascending order")]
    OutOfOrder {
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("more than one first-day event recorded on {date}")]
    DuplicateFirstDay { date: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleStatistics {
    /// Fewer than two first-day events; no cycle length can be measured yet.
    InsufficientData {
        first_day_count: usize,
        current_cycle_length: Option<i64>,
    },
    Computed(CycleSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
    pub cycle_count: usize,
    pub cycle_lengths: Vec<i64>,
    pub mean_cycle_length: f64,
    pub recent_average_cycle_length: f64,
    pub cycle_length_minimum: i64,
    pub cycle_length_maximum: i64,
    pub cycle_length_median: f64,
    pub cycle_length_mode: i64,
    /// Sample standard deviation; `None` when only one cycle has been observed.
    pub cycle_length_standard_deviation: Option<f64>,
    pub last_period_start: NaiveDate,
    pub predicted_next_period: NaiveDate,
    pub predicted_ovulation: NaiveDate,
    pub fertile_window: FertileWindow,
    pub predicted_events: Vec<PredictedEvent>,
    pub current_cycle_length: Option<i64>,
    pub days_until_next_period: i64,
    pub in_fertile_window: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FertileWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FertileWindow {
    fn ending_on(ovulation: NaiveDate) -> Option<Self> {
        Some(Self {
            start: ovulation.checked_sub_signed(Duration::days(FERTILE_WINDOW_DAYS - 1))?,
            end: ovulation,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.start..=self.end).contains(&date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictedEventKind {
    ProjectedOvulation,
    ProjectedPeriod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PredictedEvent {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: PredictedEventKind,
}

/// Derive cycle statistics from one user's history.
///
/// `events` must be in ascending timestamp order. Only `first_day` events
/// delimit cycles; a cycle's length is the difference between the UTC
/// calendar dates of two consecutive first-day events.
pub fn compute(
    events: &[Observation],
    luteal_phase_length: i32,
    today: NaiveDate,
) -> Result<CycleStatistics, StatisticsError> {
    if !(1..=MAX_LUTEAL_PHASE_LENGTH).contains(&luteal_phase_length) {
        return Err(StatisticsError::InvalidLutealPhase(luteal_phase_length));
    }

    let period_starts = first_day_dates(events)?;
    let current_cycle_length = period_starts
        .iter()
        .rev()
        .find(|date| **date <= today)
        .map(|date| (today - *date).num_days());

    if period_starts.len() < 2 {
        return Ok(CycleStatistics::InsufficientData {
            first_day_count: period_starts.len(),
            current_cycle_length,
        });
    }

    let cycle_lengths: Vec<i64> = period_starts
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_days())
        .collect();

    let mean_cycle_length = mean(&cycle_lengths);
    let recent = &cycle_lengths[cycle_lengths.len().saturating_sub(RECENT_CYCLE_WINDOW)..];
    let rounded_mean = mean_cycle_length.round() as i64;
    let luteal = Duration::days(i64::from(luteal_phase_length));

    // Non-empty: at least two period starts were checked above.
    let last_period_start = period_starts[period_starts.len() - 1];
    let out_of_range = || StatisticsError::DateOutOfRange { last_period_start };

    // Projects `cycles` cycles ahead: (ovulation, period start).
    let project = |cycles: i64| -> Result<(NaiveDate, NaiveDate), StatisticsError> {
        let period = last_period_start
            .checked_add_signed(Duration::days(cycles * rounded_mean))
            .ok_or_else(out_of_range)?;
        let ovulation = period.checked_sub_signed(luteal).ok_or_else(out_of_range)?;
        Ok((ovulation, period))
    };

    let (predicted_ovulation, predicted_next_period) = project(1)?;
    let fertile_window = FertileWindow::ending_on(predicted_ovulation).ok_or_else(out_of_range)?;

    let mut predicted_events = Vec::with_capacity(2 * PROJECTED_CYCLES as usize);
    for cycle in 1..=PROJECTED_CYCLES {
        let (ovulation, period) = project(cycle)?;
        predicted_events.push(PredictedEvent {
            date: ovulation,
            kind: PredictedEventKind::ProjectedOvulation,
        });
        predicted_events.push(PredictedEvent {
            date: period,
            kind: PredictedEventKind::ProjectedPeriod,
        });
    }

    let mut sorted = cycle_lengths.clone();
    sorted.sort_unstable();

    Ok(CycleStatistics::Computed(CycleSummary {
        cycle_count: cycle_lengths.len(),
        mean_cycle_length,
        recent_average_cycle_length: mean(recent),
        cycle_length_minimum: sorted[0],
        cycle_length_maximum: sorted[sorted.len() - 1],
        cycle_length_median: median(&sorted),
        cycle_length_mode: mode(&cycle_lengths),
        cycle_length_standard_deviation: sample_standard_deviation(&cycle_lengths, mean_cycle_length),
        last_period_start,
        predicted_next_period,
        predicted_ovulation,
        fertile_window,
        predicted_events,
        current_cycle_length,
        days_until_next_period: (predicted_next_period - today).num_days(),
        in_fertile_window: fertile_window.contains(today),
        cycle_lengths,
    }))
}

/// Validates ordering and reduces the history to the dates of first-day events.
fn first_day_dates(events: &[Observation]) -> Result<Vec<NaiveDate>, StatisticsError> {
    let mut dates: Vec<NaiveDate> = Vec::new();
    let mut previous: Option<DateTime<Utc>> = None;

    for event in events {
        if let Some(previous) = previous {
            if event.timestamp < previous {
                return Err(StatisticsError::OutOfOrder {
                    previous,
                    current: event.timestamp,
                });
            }
        }
        previous = Some(event.timestamp);

        if !event.first_day {
            continue;
        }
        let date = event.timestamp.date_naive();
        if dates.last() == Some(&date) {
            return Err(StatisticsError::DuplicateFirstDay { date });
        }
        dates.push(date);
    }

    Ok(dates)
}

fn mean(values: &[i64]) -> f64 {
    values.iter().sum::<i64>() as f64 / values.len() as f64
}

fn median(sorted: &[i64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    } else {
        sorted[mid] as f64
    }
}

/// Most frequent value; ties go to whichever value appears first.
fn mode(values: &[i64]) -> i64 {
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for value in values {
        *counts.entry(*value).or_default() += 1;
    }

    let mut best = values[0];
    let mut best_count = 0;
    for value in values {
        let count = counts[value];
        if count > best_count {
            best = *value;
            best_count = count;
        }
    }
    best
}

fn sample_standard_deviation(values: &[i64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let sum_of_squares: f64 = values.iter().map(|v| (*v as f64 - mean).powi(2)).sum();
    Some((sum_of_squares / (values.len() - 1) as f64).sqrt())
}
