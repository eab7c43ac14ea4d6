// libs/appointment-cell/src/services/calendar.rs
use std::collections::HashMap;

use chrono::{Datelike, Days, NaiveDate};
use tracing::debug;

use crate::models::{Appointment, AppointmentError, DayCell};

const DAYS_PER_WEEK: u32 = 7;
pub const MAX_VISIBLE_LIMIT: usize = 10;

/// Builds a Sunday-first month grid. Leading and trailing cells from the
/// adjacent months pad the grid to whole weeks and stay empty.
#[derive(Debug, Clone, Copy)]
pub struct CalendarBuilder {
    visible_limit: usize,
}

impl CalendarBuilder {
    pub fn new(visible_limit: usize) -> Self {
        Self {
            visible_limit: visible_limit.clamp(1, MAX_VISIBLE_LIMIT),
        }
    }

    pub fn visible_limit(&self) -> usize {
        self.visible_limit
    }

    pub fn build_month(
        &self,
        year: i32,
        month: u32,
        appointments: &[Appointment],
        today: NaiveDate,
    ) -> Result<Vec<DayCell>, AppointmentError> {
        let first = first_of_month(year, month)?;
        let days_in_month = days_in_month(first)?;
        let leading = first.weekday().num_days_from_sunday();
        let trailing = (DAYS_PER_WEEK - (leading + days_in_month) % DAYS_PER_WEEK) % DAYS_PER_WEEK;

        let mut by_day: HashMap<u32, Vec<&Appointment>> = HashMap::new();
        for appointment in appointments {
            if appointment.date.year() == year && appointment.date.month() == month {
                by_day.entry(appointment.date.day()).or_default().push(appointment);
            }
        }

        let mut cells = Vec::with_capacity((leading + days_in_month + trailing) as usize);

        for offset in (1..=leading).rev() {
            let date = shift_back(first, offset)?;
            cells.push(padding_cell(date));
        }

        for day in 1..=days_in_month {
            let date = first.with_day(day).ok_or_else(|| invalid_month(year, month))?;
            let mut day_appointments: Vec<Appointment> = by_day
                .remove(&day)
                .unwrap_or_default()
                .into_iter()
                .cloned()
                .collect();
            day_appointments.sort_by_key(|appointment| appointment.time);
            cells.push(self.month_cell(date, day_appointments, today));
        }

        let last = first
            .checked_add_days(Days::new(u64::from(days_in_month - 1)))
            .ok_or_else(|| invalid_month(year, month))?;
        for offset in 1..=trailing {
            let date = last
                .checked_add_days(Days::new(u64::from(offset)))
                .ok_or_else(|| invalid_month(year, month))?;
            cells.push(padding_cell(date));
        }

        debug!("Built {}-{:02} grid: {} cells ({} leading, {} trailing), {} appointments",
               year, month, cells.len(), leading, trailing, appointments.len());

        Ok(cells)
    }

    fn month_cell(&self, date: NaiveDate, appointments: Vec<Appointment>, today: NaiveDate) -> DayCell {
        let has_more = appointments.len() > self.visible_limit;
        let hidden_count = appointments.len().saturating_sub(self.visible_limit);
        let visible_appointments = appointments.iter().take(self.visible_limit).cloned().collect();

        DayCell {
            day: date.day(),
            date: iso_date(date),
            is_other_month: false,
            is_today: date == today,
            appointments,
            visible_appointments,
            has_more,
            hidden_count,
        }
    }
}

fn padding_cell(date: NaiveDate) -> DayCell {
    DayCell {
        day: date.day(),
        date: iso_date(date),
        is_other_month: true,
        is_today: false,
        appointments: Vec::new(),
        visible_appointments: Vec::new(),
        has_more: false,
        hidden_count: 0,
    }
}

fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn first_of_month(year: i32, month: u32) -> Result<NaiveDate, AppointmentError> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| invalid_month(year, month))
}

pub fn last_of_month(year: i32, month: u32) -> Result<NaiveDate, AppointmentError> {
    let first = first_of_month(year, month)?;
    let days = days_in_month(first)?;
    first.with_day(days).ok_or_else(|| invalid_month(year, month))
}

fn days_in_month(first: NaiveDate) -> Result<u32, AppointmentError> {
    let next_first = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    }
    .ok_or_else(|| invalid_month(first.year(), first.month()))?;

    Ok(next_first.signed_duration_since(first).num_days() as u32)
}

fn shift_back(date: NaiveDate, days: u32) -> Result<NaiveDate, AppointmentError> {
    date.checked_sub_days(Days::new(u64::from(days)))
        .ok_or_else(|| invalid_month(date.year(), date.month()))
}

fn invalid_month(year: i32, month: u32) -> AppointmentError {
    AppointmentError::ValidationFailed(format!("{}-{} is not a valid calendar month", year, month))
}
