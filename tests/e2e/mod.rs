pub mod commands;
pub mod grouping;
pub mod named;
