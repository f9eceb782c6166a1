// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A reader for Java Flight Recorder (JFR) recordings produced by
//! async-profiler.
//!
//! A recording is a concatenation of self-describing *chunks*
//! ([chunk::locate_chunks]); each chunk carries its own type schema
//! ([metadata::parse_metadata]) and constant pool
//! ([constant_pool::read_chunk_pools]) ahead of its event body. [reader::JfrReader::open]
//! memory-maps a file and indexes every chunk up front, so that once it
//! returns, [reader::JfrReader::read_event] only has to walk already-typed event
//! records and resolve them against the dictionaries on [reader::JfrReader].
//!
//! ```no_run
//! # fn main() -> jfr_reader::error::Result<()> {
//! let mut reader = jfr_reader::reader::JfrReader::open("profile.jfr")?;
//!
//! while let Some(sample) = reader.read_event::<jfr_reader::entities::ExecutionSample>()? {
//!     let thread = reader.threads.get(sample.tid);
//!     println!("{:?} on {:?}", sample.time, thread);
//! }
//! # Ok(())
//! # }
//! ```

pub mod chunk;
pub mod constant_pool;
pub mod cursor;
pub mod dictionary;
pub mod entities;
pub mod error;
pub mod event;
pub mod metadata;
pub mod reader;

pub use error::{Error, Result};
pub use reader::JfrReader;
