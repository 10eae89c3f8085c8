pub mod boards;
pub mod config;
pub mod error;
pub mod grades;
pub mod http;
pub mod humanize;
pub mod logbook;
pub mod observability;
pub mod sink;
