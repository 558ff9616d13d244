pub mod assembler;
pub mod placer;
