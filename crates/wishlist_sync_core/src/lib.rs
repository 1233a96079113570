pub mod cache;
pub mod catalog;
pub mod colors;
pub mod config;
pub mod input;
pub mod parts;
pub mod reconcile;
pub mod sync;

#[cfg(test)]
mod testing;
