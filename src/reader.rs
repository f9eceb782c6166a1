// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [JfrReader]: the top-level entry point tying the chunk locator, metadata
//! interpreter, constant pool reader, and event stream reader together.

use crate::chunk::{self, ChunkLocation};
use crate::constant_pool;
use crate::cursor::Cursor;
use crate::dictionary::Dictionary;
use crate::entities::{
    AllocationSample, ClassRef, ContendedLock, Event, ExecutionSample, FromEvent, MethodRef,
    StackTrace, Timed,
};
use crate::error::Result;
use crate::event::{self, EventHeader};
use crate::metadata::TypeRegistry;
use memmap2::Mmap;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::path::Path;

/// The backing byte image a [JfrReader] reads from: either a memory mapping
/// of an on-disk file, or a caller-supplied owned buffer.
enum Image {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Image {
    fn as_slice(&self) -> &[u8] {
        match self {
            Self::Mapped(mmap) => &mmap[..],
            Self::Owned(bytes) => &bytes[..],
        }
    }
}

/// Numeric type ids for the six event-type names this reader recognizes,
/// memoized once after every chunk's metadata has been merged into the type
/// registry. A name absent from the recording's schema resolves to `-1`,
/// which a record's type id (always non-negative on the wire) never equals.
#[derive(Clone, Copy, Debug, Default)]
struct RecognizedTypeIds {
    execution_sample: i64,
    native_method_sample: i64,
    allocation_in_new_tlab: i64,
    allocation_outside_tlab: i64,
    java_monitor_enter: i64,
    thread_park: i64,
}

impl RecognizedTypeIds {
    fn resolve(registry: &TypeRegistry) -> Self {
        let id = |name: &str| registry.by_name(name).map(|c| c.id).unwrap_or(-1);

        Self {
            execution_sample: id("jdk.ExecutionSample"),
            native_method_sample: id("jdk.NativeMethodSample"),
            allocation_in_new_tlab: id("jdk.ObjectAllocationInNewTLAB"),
            allocation_outside_tlab: id("jdk.ObjectAllocationOutsideTLAB"),
            java_monitor_enter: id("jdk.JavaMonitorEnter"),
            thread_park: id("jdk.ThreadPark"),
        }
    }
}

/// A fully indexed JFR recording: one memory-mapped (or owned) byte image,
/// the type registry and reference dictionaries accumulated across every
/// chunk, and a moving position into the event stream.
///
/// Construction does all the up-front work: every chunk's metadata and
/// constant pools are parsed before this type is ever handed to a caller, so
/// that once [JfrReader::open] returns, `read_event` only ever has to walk
/// already-typed event records.
pub struct JfrReader {
    image: Image,
    chunks: Vec<ChunkLocation>,
    recognized: RecognizedTypeIds,

    pub threads: Dictionary<String>,
    pub classes: Dictionary<ClassRef>,
    pub methods: Dictionary<MethodRef>,
    pub symbols: Dictionary<Vec<u8>>,
    pub stack_traces: Dictionary<StackTrace>,
    pub frame_types: FxHashMap<i32, String>,
    pub thread_states: FxHashMap<i32, String>,

    pub start_nanos: u64,
    pub duration_nanos: u64,
    pub start_ticks: u64,
    pub ticks_per_sec: u64,

    /// Index of the chunk `position`/`limit` currently refer to.
    chunk_index: usize,
    /// Absolute offset of the next unread event record.
    position: usize,
    /// Absolute offset one past the end of the current chunk's event body.
    limit: usize,
}

impl JfrReader {
    /// Open and fully index a JFR recording from a file path.
    ///
    /// The file is memory-mapped read-only; this function returns once every
    /// chunk's metadata and constant pools have been parsed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        Self::from_image(Image::Mapped(mmap))
    }

    /// Index a JFR recording already fully resident in memory.
    ///
    /// Equivalent to [Self::open] for callers who have buffered the file
    /// themselves rather than mapping it.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_image(Image::Owned(data))
    }

    /// Release the underlying mapping and file handle early.
    ///
    /// Dropping a [JfrReader] does the same thing; this is offered as an
    /// explicit, named operation for callers who want to free the mapping
    /// before the reader otherwise goes out of scope.
    pub fn close(self) {}

    fn from_image(image: Image) -> Result<Self> {
        let chunks = chunk::locate_chunks(image.as_slice())?;

        let mut registry = TypeRegistry::new();
        let mut threads = Dictionary::new();
        let mut classes = Dictionary::new();
        let mut methods = Dictionary::new();
        let mut symbols = Dictionary::new();
        let mut stack_traces = Dictionary::new();
        let mut frame_types = FxHashMap::default();
        let mut thread_states = FxHashMap::default();

        for location in &chunks {
            let mut cursor = Cursor::new(image.as_slice());
            cursor.set_position(location.metadata_offset);
            cursor.set_limit(location.end);
            crate::metadata::parse_metadata(&mut cursor, &mut registry)?;

            let mut cursor = Cursor::new(image.as_slice());
            cursor.set_position(location.constant_pool_offset);
            cursor.set_limit(location.end);
            constant_pool::read_chunk_pools(
                &mut cursor,
                &registry,
                &mut threads,
                &mut classes,
                &mut methods,
                &mut symbols,
                &mut stack_traces,
                &mut frame_types,
                &mut thread_states,
            )?;
        }

        let (start_nanos, duration_nanos, start_ticks, ticks_per_sec) = match (
            chunks.first(),
            chunks.last(),
        ) {
            (Some(first), Some(last)) => {
                let start_nanos = first.header.start_nanos;
                let end_nanos = last.header.start_nanos + last.header.duration_nanos;

                (
                    start_nanos,
                    end_nanos.saturating_sub(start_nanos),
                    first.header.start_ticks,
                    first.header.ticks_per_second,
                )
            }
            _ => (0, 0, 0, 0),
        };

        let recognized = RecognizedTypeIds::resolve(&registry);

        let (position, limit) = chunks
            .first()
            .map(|c| (c.body_start, c.end))
            .unwrap_or((0, 0));

        Ok(Self {
            image,
            chunks,
            recognized,
            threads,
            classes,
            methods,
            symbols,
            stack_traces,
            frame_types,
            thread_states,
            start_nanos,
            duration_nanos,
            start_ticks,
            ticks_per_sec,
            chunk_index: 0,
            position,
            limit,
        })
    }

    /// Narrow the cursor window to the next chunk's event body.
    ///
    /// Returns `false` once every chunk has been consumed.
    fn advance_chunk(&mut self) -> bool {
        self.chunk_index += 1;

        match self.chunks.get(self.chunk_index) {
            Some(location) => {
                self.position = location.body_start;
                self.limit = location.end;
                true
            }
            None => {
                self.position = self.limit;
                false
            }
        }
    }

    /// Read the next record of any of the six recognized wire types,
    /// skipping unrecognized records by their declared `size` without
    /// attempting to decode them. Returns `None` once every chunk's event
    /// body has been exhausted.
    fn next_recognized_event(&mut self) -> Result<Option<Event>> {
        loop {
            while self.position >= self.limit {
                if !self.advance_chunk() {
                    return Ok(None);
                }
            }

            let data = self.image.as_slice();
            let mut cursor = Cursor::new(data);
            cursor.set_position(self.position);
            cursor.set_limit(self.limit);

            let start = cursor.position() as i64;
            let header = EventHeader::parse(&mut cursor)?;
            let next_position = (start + header.size) as usize;

            let event = if header.event_type == self.recognized.execution_sample
                || header.event_type == self.recognized.native_method_sample
            {
                Some(Event::ExecutionSample(event::decode_execution_sample(
                    &mut cursor,
                )?))
            } else if header.event_type == self.recognized.allocation_in_new_tlab {
                Some(Event::AllocationSample(event::decode_allocation_sample(
                    &mut cursor,
                    true,
                )?))
            } else if header.event_type == self.recognized.allocation_outside_tlab {
                Some(Event::AllocationSample(event::decode_allocation_sample(
                    &mut cursor,
                    false,
                )?))
            } else if header.event_type == self.recognized.java_monitor_enter {
                Some(Event::ContendedLock(event::decode_contended_lock(
                    &mut cursor,
                    false,
                )?))
            } else if header.event_type == self.recognized.thread_park {
                Some(Event::ContendedLock(event::decode_contended_lock(
                    &mut cursor,
                    true,
                )?))
            } else {
                None
            };

            // Always reposition from the declared record size rather than
            // trusting how many bytes the decoder actually consumed; this
            // keeps framing correct even for records we chose not to decode.
            self.position = next_position;

            if let Some(event) = event {
                return Ok(Some(event));
            }
        }
    }

    /// Read the next event of kind `K`, skipping events of any other kind.
    ///
    /// `K` is [Event] itself to accept any recognized kind, or one of
    /// [ExecutionSample], [AllocationSample], [ContendedLock] to filter to
    /// just that kind.
    pub fn read_event<K: FromEvent>(&mut self) -> Result<Option<K>> {
        loop {
            match self.next_recognized_event()? {
                None => return Ok(None),
                Some(event) => {
                    if let Some(matched) = K::from_event(event) {
                        return Ok(Some(matched));
                    }
                }
            }
        }
    }

    /// Drain the remaining event stream, returning every event of kind `K`
    /// sorted by `time` ascending.
    ///
    /// Events are not guaranteed to be time-ordered on the wire within a
    /// chunk, so this always sorts rather than assuming input order.
    pub fn read_all_events<K: FromEvent + Timed>(&mut self) -> Result<Vec<K>> {
        let mut out = Vec::new();

        while let Some(event) = self.read_event::<K>()? {
            out.push(event);
        }

        out.sort_by_key(Timed::time);

        Ok(out)
    }
}
