pub mod database;
pub mod event_log;
pub mod migrations;
pub mod path_utils;
