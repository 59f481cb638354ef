use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

/// South African public holidays that always fall on the same date.
const FIXED_HOLIDAYS: [(u32, u32, &str); 10] = [
    (1, 1, "New Year's Day"),
    (3, 21, "Human Rights Day"),
    (4, 27, "Freedom Day"),
    (5, 1, "Workers' Day"),
    (6, 16, "Youth Day"),
    (8, 9, "National Women's Day"),
    (9, 24, "Heritage Day"),
    (12, 16, "Day of Reconciliation"),
    (12, 25, "Christmas Day"),
    (12, 26, "Day of Goodwill"),
];

const GOOD_FRIDAY: &str = "Good Friday";
const FAMILY_DAY: &str = "Family Day";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: &'static str,
}

/// Easter Sunday for a Gregorian year (anonymous Gregorian algorithm).
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year.rem_euclid(19);
    let b = year.div_euclid(100);
    let c = year.rem_euclid(100);
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15).rem_euclid(30);
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k).rem_euclid(7);
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;

    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

pub fn holidays_for_year(year: i32) -> Vec<Holiday> {
    let mut holidays: Vec<Holiday> = FIXED_HOLIDAYS
        .iter()
        .filter_map(|&(month, day, name)| {
            NaiveDate::from_ymd_opt(year, month, day).map(|date| Holiday { date, name })
        })
        .collect();

    if let Some(easter) = easter_sunday(year) {
        holidays.push(Holiday {
            date: easter - Duration::days(2),
            name: GOOD_FRIDAY,
        });
        holidays.push(Holiday {
            date: easter + Duration::days(1),
            name: FAMILY_DAY,
        });
    }

    holidays.sort_by_key(|holiday| holiday.date);
    holidays
}

/// Non-working dates for an inclusive span of years.
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    holidays: BTreeMap<NaiveDate, &'static str>,
}

impl HolidayCalendar {
    pub fn for_years(first_year: i32, last_year: i32) -> Self {
        let (first, last) = if first_year <= last_year {
            (first_year, last_year)
        } else {
            (last_year, first_year)
        };

        let holidays = (first..=last)
            .flat_map(holidays_for_year)
            .map(|holiday| (holiday.date, holiday.name))
            .collect();

        Self { holidays }
    }

    pub fn for_range(start: NaiveDate, end: NaiveDate) -> Self {
        Self::for_years(start.year(), end.year())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.holidays.contains_key(&date)
    }

    pub fn name_of(&self, date: NaiveDate) -> Option<&'static str> {
        self.holidays.get(&date).copied()
    }

    pub fn holidays_in(&self, start: NaiveDate, end: NaiveDate) -> Vec<Holiday> {
        if end < start {
            return Vec::new();
        }
        self.holidays
            .range(start..=end)
            .map(|(date, name)| Holiday {
                date: *date,
                name: *name,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.holidays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holidays.is_empty()
    }
}
