//! View models for a search-and-play front end.
//!
//! Nothing here renders; hosts read these types and draw them however they
//! like. [`search::SearchView`] follows a search through to its rows,
//! [`transport::TransportView`] derives the player bar from a controller
//! snapshot and [`keys`] maps keyboard shortcuts to transport commands.

pub mod keys;
pub mod search;
pub mod transport;

pub use keys::{Focus, Key, KeyInput, TransportCommand};
pub use search::{ResultRow, RowAction, SearchState, SearchTicket, SearchView};
pub use transport::{format_time, TransportIcon, TransportView, VolumeIcon};
