pub mod filters;
pub mod negation;
pub mod vector;
