pub mod comparison;
pub mod evaluation;
mod lenient;
