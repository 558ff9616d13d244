pub mod connectivity;
pub mod spatial;
pub mod structure;
