pub mod answer;
pub mod config;
pub mod error;
pub mod exercise;
pub mod student;

pub use answer::{answers_match, normalize_answer};
pub use config::Config;
pub use error::*;
pub use exercise::*;
pub use student::*;
