use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;

use chrono::{NaiveTime, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::db::repositories::settings_repository::{SchedulerSettingRow, SettingsRepository};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::settings::{
    default_alternate_times, SchedulerSettings, DEFAULT_SAME_WEEKDAY_WEEKS,
    DEFAULT_SEARCH_HORIZON_DAYS, DEFAULT_TERM_WEEKS, DEFAULT_TIMEZONE, DEFAULT_WEEKLY_CAP,
};

const KEY_TIMEZONE: &str = "timezone";
const KEY_DEFAULT_TERM_WEEKS: &str = "default_term_weeks";
const KEY_WEEKLY_CAP: &str = "weekly_cap";
const KEY_SAME_WEEKDAY_WEEKS: &str = "same_weekday_search_weeks";
const KEY_SEARCH_HORIZON_DAYS: &str = "search_horizon_days";
const KEY_ALTERNATE_TIMES: &str = "alternate_times";

const MAX_TERM_WEEKS: u32 = 104;
const MAX_SEARCH_HORIZON_DAYS: u32 = 90;

#[derive(Debug, Default, Clone)]
pub struct SettingsUpdateInput {
    pub timezone: Option<String>,
    pub default_term_weeks: Option<u32>,
    pub weekly_cap: Option<usize>,
    pub same_weekday_search_weeks: Option<u32>,
    pub search_horizon_days: Option<u32>,
    pub alternate_times: Option<Vec<String>>,
}

pub struct SettingsService {
    db: DbPool,
    cache: RwLock<Option<SchedulerSettings>>,
}

impl SettingsService {
    pub fn new(db: DbPool) -> Self {
        Self {
            db,
            cache: RwLock::new(None),
        }
    }

    pub fn get(&self) -> AppResult<SchedulerSettings> {
        if let Ok(guard) = self.cache.read() {
            if let Some(settings) = guard.as_ref() {
                return Ok(settings.clone());
            }
        }

        let settings = self.load_settings_from_db()?;
        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(settings.clone());
        }
        Ok(settings)
    }

    pub fn update(&self, input: SettingsUpdateInput) -> AppResult<SchedulerSettings> {
        let mut current = self.get()?;

        if let Some(timezone) = input.timezone.as_ref() {
            let trimmed = timezone.trim();
            Tz::from_str(trimmed)
                .map_err(|_| AppError::validation(format!("unknown time zone: {trimmed}")))?;
            current.timezone = trimmed.to_string();
        }

        if let Some(weeks) = input.default_term_weeks {
            if weeks == 0 || weeks > MAX_TERM_WEEKS {
                return Err(AppError::validation(format!(
                    "default term length must be between 1 and {MAX_TERM_WEEKS} weeks"
                )));
            }
            current.default_term_weeks = weeks;
        }

        if let Some(cap) = input.weekly_cap {
            if cap == 0 || cap > 7 {
                return Err(AppError::validation("weekly cap must be between 1 and 7"));
            }
            current.weekly_cap = cap;
        }

        if let Some(weeks) = input.same_weekday_search_weeks {
            if weeks == 0 || weeks > 12 {
                return Err(AppError::validation(
                    "same weekday search must cover between 1 and 12 weeks",
                ));
            }
            current.same_weekday_search_weeks = weeks;
        }

        if let Some(days) = input.search_horizon_days {
            if days == 0 || days > MAX_SEARCH_HORIZON_DAYS {
                return Err(AppError::validation(format!(
                    "search horizon must be between 1 and {MAX_SEARCH_HORIZON_DAYS} days"
                )));
            }
            current.search_horizon_days = days;
        }

        if let Some(times) = input.alternate_times.as_ref() {
            current.alternate_times = parse_alternate_times(times)?;
        }

        self.persist_changes(&current, &input)?;
        current.updated_at = Utc::now().to_rfc3339();
        info!(target: "app::settings", timezone = %current.timezone, "scheduler settings updated");

        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(current.clone());
        }

        Ok(current)
    }

    pub fn reset(&self) -> AppResult<SchedulerSettings> {
        self.db.with_connection(|conn| {
            for row in SettingsRepository::list(conn)? {
                SettingsRepository::delete(conn, &row.key)?;
            }
            Ok(())
        })?;

        if let Ok(mut guard) = self.cache.write() {
            *guard = None;
        }
        self.get()
    }

    fn persist_changes(
        &self,
        settings: &SchedulerSettings,
        input: &SettingsUpdateInput,
    ) -> AppResult<()> {
        self.db.with_connection(|conn| {
            if input.timezone.is_some() {
                SettingsRepository::upsert(conn, KEY_TIMEZONE, &settings.timezone)?;
            }
            if input.default_term_weeks.is_some() {
                SettingsRepository::upsert(
                    conn,
                    KEY_DEFAULT_TERM_WEEKS,
                    &settings.default_term_weeks.to_string(),
                )?;
            }
            if input.weekly_cap.is_some() {
                SettingsRepository::upsert(conn, KEY_WEEKLY_CAP, &settings.weekly_cap.to_string())?;
            }
            if input.same_weekday_search_weeks.is_some() {
                SettingsRepository::upsert(
                    conn,
                    KEY_SAME_WEEKDAY_WEEKS,
                    &settings.same_weekday_search_weeks.to_string(),
                )?;
            }
            if input.search_horizon_days.is_some() {
                SettingsRepository::upsert(
                    conn,
                    KEY_SEARCH_HORIZON_DAYS,
                    &settings.search_horizon_days.to_string(),
                )?;
            }
            if input.alternate_times.is_some() {
                let formatted: Vec<String> = settings
                    .alternate_times
                    .iter()
                    .map(|time| time.format("%H:%M").to_string())
                    .collect();
                SettingsRepository::upsert(
                    conn,
                    KEY_ALTERNATE_TIMES,
                    &serde_json::to_string(&formatted)?,
                )?;
            }
            Ok(())
        })
    }

    fn load_settings_from_db(&self) -> AppResult<SchedulerSettings> {
        self.db.with_connection(|conn| {
            let rows = SettingsRepository::list(conn)?;
            let mut map: HashMap<String, SchedulerSettingRow> = HashMap::new();
            let mut latest_updated_at: Option<String> = None;

            for row in rows {
                latest_updated_at = match latest_updated_at {
                    Some(ref current) if current >= &row.updated_at => Some(current.clone()),
                    _ => Some(row.updated_at.clone()),
                };
                map.insert(row.key.clone(), row);
            }

            let timezone = map
                .get(KEY_TIMEZONE)
                .map(|row| row.value.trim().to_string())
                .filter(|value| {
                    let known = Tz::from_str(value).is_ok();
                    if !known {
                        warn!(
                            target: "app::settings",
                            timezone = %value,
                            "stored time zone unknown, falling back to default"
                        );
                    }
                    known
                })
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());

            let default_term_weeks = parse_positive(&map, KEY_DEFAULT_TERM_WEEKS)
                .unwrap_or(DEFAULT_TERM_WEEKS);
            let weekly_cap = parse_positive::<usize>(&map, KEY_WEEKLY_CAP)
                .unwrap_or(DEFAULT_WEEKLY_CAP);
            let same_weekday_search_weeks = parse_positive(&map, KEY_SAME_WEEKDAY_WEEKS)
                .unwrap_or(DEFAULT_SAME_WEEKDAY_WEEKS);
            let search_horizon_days = parse_positive(&map, KEY_SEARCH_HORIZON_DAYS)
                .unwrap_or(DEFAULT_SEARCH_HORIZON_DAYS);

            let alternate_times = match map.get(KEY_ALTERNATE_TIMES) {
                Some(row) => serde_json::from_str::<Vec<String>>(&row.value)
                    .map_err(AppError::from)
                    .and_then(|values| parse_alternate_times(&values))
                    .unwrap_or_else(|err| {
                        warn!(
                            target: "app::settings",
                            error = %err,
                            "stored alternate times invalid, falling back to defaults"
                        );
                        default_alternate_times()
                    }),
                None => default_alternate_times(),
            };

            let updated_at = latest_updated_at.unwrap_or_else(|| Utc::now().to_rfc3339());

            Ok(SchedulerSettings {
                timezone,
                default_term_weeks,
                weekly_cap,
                same_weekday_search_weeks,
                search_horizon_days,
                alternate_times,
                updated_at,
            })
        })
    }
}

fn parse_positive<T>(map: &HashMap<String, SchedulerSettingRow>, key: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    map.get(key)
        .and_then(|row| row.value.trim().parse::<T>().ok())
        .filter(|value| *value > T::default())
}

fn parse_alternate_times(values: &[String]) -> AppResult<Vec<NaiveTime>> {
    if values.is_empty() {
        return Err(AppError::validation("at least one alternate time is required"));
    }

    let mut times = Vec::with_capacity(values.len());
    for value in values {
        let time = NaiveTime::parse_from_str(value.trim(), "%H:%M")
            .map_err(|_| AppError::validation(format!("invalid alternate time: {value}")))?;
        if !times.contains(&time) {
            times.push(time);
        }
    }
    Ok(times)
}
