pub mod candidate_generator;
pub mod conflict_detector;
pub mod holiday_calendar;
pub mod lesson_calendar;
pub mod lesson_planner;
pub mod lesson_service;
pub mod notification_service;
pub mod party_locks;
pub mod reschedule_resolver;
pub mod schedule_parser;
pub mod schedule_utils;
pub mod settings_service;
pub mod weekly_cap;
