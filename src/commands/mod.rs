pub mod counters;
pub mod counts;
pub mod db;
pub mod settings;
