pub mod errors;
pub mod sets;
