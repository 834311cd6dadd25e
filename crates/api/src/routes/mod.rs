//! HTTP Route Handlers

pub mod bins;
pub mod notifications;
pub mod settings;
