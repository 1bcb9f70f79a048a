// Input module - keyboard and mouse synthesis for the game window
// The engine only speaks `InputCommand`; the enigo backend turns those into
// real OS events on its own thread.

pub mod enigo_impl;
pub mod error;
pub mod types;

pub use enigo_impl::EnigoInput;
pub use error::{InputError, InputResult};
pub use types::{InputCommand, InputSynthesizer, Key};
