//! Sensor log input schema
//!
//! This module defines the event record read from a delimited sensor log and
//! the reader that turns raw text into an ordered event stream. Only the
//! sensor id field carries meaning for segmentation; the remaining fields are
//! preserved so segments can be written back out verbatim.

mod event;
mod reader;

pub use event::*;
pub use reader::*;
