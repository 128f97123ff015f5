pub mod attacks;
pub mod loader;
pub mod magics;
pub mod structs;

pub use structs::MagicTables;
