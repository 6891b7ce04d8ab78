//! Plain data types shared by the client, the dispatcher and the display layer

pub mod entry;

pub use entry::ContentEntry;
