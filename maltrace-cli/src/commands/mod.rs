//! Command handlers -- one module per subcommand

pub mod config;
pub mod detect;
pub mod evaluate;
pub mod rules;
pub mod scan;
