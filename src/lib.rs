#[macro_use]
extern crate serde;

mod ballot;
mod ecies_ed25519;
mod election;
mod error;
mod merkle;
mod serde_hex;
mod store;
mod tally;

pub use ballot::*;
pub use ecies_ed25519::*;
pub use election::*;
pub use error::*;
pub use merkle::*;
pub use serde_hex::*;
pub use store::*;
pub use tally::*;
