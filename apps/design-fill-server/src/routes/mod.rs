//! Route modules for the Design Fill server

pub mod admin;
pub mod files;
pub mod health;
pub mod preview;
