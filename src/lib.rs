pub mod alerts;
pub mod chart;
pub mod cli;
pub mod constants;
pub mod feed;
pub mod indicators;
pub mod logging;
pub mod model;
pub mod scanner;
pub mod service;
pub mod session;
pub mod settings;
pub mod signal;
pub mod tail;
