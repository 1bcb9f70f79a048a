// Window module - locating the game window and capturing its pixels
// The accessor is resolved by title and re-reads geometry on every call,
// so the game window may move or resize between ticks.

pub mod error;
pub mod types;
pub mod xcap_impl;


// Re-export the main types for easy access
pub use error::{WindowError, WindowResult};
pub use types::{Frame, WindowAccessor, WindowGeometry};
pub use xcap_impl::XcapWindow;
