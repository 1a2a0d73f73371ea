pub mod export;
pub mod lookup;
