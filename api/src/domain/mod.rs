//! Domain models and their SQL queries

pub mod platform;
pub mod publications;
pub mod schedules;
pub mod tokens;
pub mod videos;

#[cfg(test)]
pub mod test_db;

pub use platform::Platform;
