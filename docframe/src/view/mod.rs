mod filtered;

pub use filtered::*;
