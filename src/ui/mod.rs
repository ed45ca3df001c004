//! Chat reply texts.

pub mod replies;
