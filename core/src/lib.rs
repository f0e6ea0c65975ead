#![no_std]

extern crate alloc;

pub use board::*;
pub use error::*;
pub use generator::*;
pub use hint::*;
pub use round::*;
pub use services::*;
pub use tile::*;
pub use types::*;

mod board;
mod error;
mod generator;
mod hint;
mod round;
mod services;
mod tile;
mod types;
