//! Configuration and CLI argument handling

use std::path::PathBuf;

use clap::Parser;

use crate::state::ModeDurations;

/// Longest accepted mode duration: one day
pub const MAX_MODE_MINUTES: u32 = 24 * 60;

fn minutes_parser() -> clap::builder::RangedI64ValueParser<u32> {
    clap::value_parser!(u32).range(1..=i64::from(MAX_MODE_MINUTES))
}

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "pomodoro-sync")]
#[command(about = "A state-managed pomodoro timer with cross-view synchronization")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20525")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Focus duration in minutes (1-1440)
    #[arg(long, default_value = "25", value_parser = minutes_parser())]
    pub focus_minutes: u32,

    /// Short break duration in minutes (1-1440)
    #[arg(long, default_value = "5", value_parser = minutes_parser())]
    pub short_break_minutes: u32,

    /// Long break duration in minutes (1-1440)
    #[arg(long, default_value = "15", value_parser = minutes_parser())]
    pub long_break_minutes: u32,

    /// File holding the persisted timer keys
    #[arg(long, default_value = "pomodoro-state.json")]
    pub state_file: PathBuf,

    /// File completed sessions are appended to
    #[arg(long, default_value = "pomodoro-sessions.jsonl")]
    pub sessions_file: PathBuf,

    /// Shell command played when a session completes
    #[arg(long)]
    pub completion_sound: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn durations(&self) -> ModeDurations {
        ModeDurations::from_minutes(self.focus_minutes, self.short_break_minutes, self.long_break_minutes)
    }
}
