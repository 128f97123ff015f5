pub mod context;
pub mod eval;
pub mod ordering;
pub mod params;
pub mod pawn_cache;
pub mod search;
pub mod see;
pub mod tt;
