//! Markdown previewer: heading outline extraction, scroll-synchronized
//! active-heading tracking, and the egui front end built on them.

pub mod app;
pub mod error;
pub mod file;
pub mod layout;
pub mod outline;
pub mod preview;
pub mod render;
pub mod scroll;
pub mod watch;
