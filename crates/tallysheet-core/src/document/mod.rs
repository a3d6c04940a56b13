//! Document state and logic (UI-agnostic).

mod io;
mod ops;
mod range;
mod state;

pub use ops::Placement;
pub use state::{Clipboard, Document};
