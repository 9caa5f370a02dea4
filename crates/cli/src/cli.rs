use clap::{Parser, Subcommand};
use lexio_core::DifficultyLevel;

/// Literacy exercise engine: generate, grade and track exercises.
#[derive(Parser, Debug)]
#[command(name = "lexio", about = "Literacy exercise engine")]
pub struct CliArgs {
    /// Evaluation worker threads (overrides POOL_WORKERS)
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run simulated students through generated exercises and print their progress
    Simulate {
        /// Number of concurrent students
        #[arg(long, default_value = "4")]
        students: usize,

        /// Difficulty level: beginner, intermediate or advanced
        #[arg(long, default_value = "beginner")]
        level: DifficultyLevel,

        /// Exercises generated per student
        #[arg(long, default_value = "5")]
        exercises: usize,

        /// Probability that a simulated student answers correctly
        #[arg(long, default_value = "0.7")]
        accuracy: f64,
    },

    /// List the exercise template catalogue as JSON
    Templates {
        /// Only show templates of this level
        #[arg(long)]
        level: Option<DifficultyLevel>,
    },
}
