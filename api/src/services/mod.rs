pub mod dispatcher;
pub mod error;
pub mod platform;
pub mod publish;
pub mod tiktok;
pub mod youtube;

#[cfg(test)]
pub mod testing;
