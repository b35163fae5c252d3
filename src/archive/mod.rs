//! Archive access: layout, traversal, threads, calendar.

pub mod authors;
pub mod calendar;
pub mod ident;
pub mod layout;
pub mod threads;
pub mod walker;
