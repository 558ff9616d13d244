pub mod fitting;
pub mod lll;
pub mod transform;
