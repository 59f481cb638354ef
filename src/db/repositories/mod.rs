pub mod lesson_repository;
pub mod notification_repository;
pub mod settings_repository;
