pub mod lesson;
pub mod notification;
pub mod request;
pub mod schedule;
pub mod settings;
