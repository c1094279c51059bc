mod enermon;

pub use enermon::*;
