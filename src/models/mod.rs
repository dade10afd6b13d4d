pub mod count;
pub mod counter;
