// src/lib.rs

pub mod config;
pub mod credentials;
pub mod fetch;
pub mod months;
pub mod pipeline;
pub mod warehouse;

#[cfg(test)]
mod testing;
