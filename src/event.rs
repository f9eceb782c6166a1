// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Event record framing and the three recognized event body decoders.
//!
//! Every record in a chunk's event body, recognized or not, shares the same
//! two-field header: a byte size (inclusive of the header) and a type id
//! referencing a class declared in the chunk's metadata. [crate::reader::JfrReader]
//! uses `size` to skip unrecognized records without understanding their fields.

use crate::cursor::Cursor;
use crate::entities::{AllocationSample, ContendedLock, ExecutionSample};
use crate::error::Result;

/// The common `(size, type)` pair that begins every event record.
#[derive(Clone, Copy, Debug)]
pub(crate) struct EventHeader {
    /// Total byte size of this record, including the header itself.
    pub size: i64,
    pub event_type: i64,
}

impl EventHeader {
    pub(crate) fn parse(cursor: &mut Cursor) -> Result<Self> {
        let size = cursor.read_varint()? as i64;
        let event_type = cursor.read_varlong()?;

        Ok(Self { size, event_type })
    }
}

/// `jdk.ExecutionSample` and `jdk.NativeMethodSample` share this layout:
/// time, sampled thread, stack trace, thread state.
pub(crate) fn decode_execution_sample(cursor: &mut Cursor) -> Result<ExecutionSample> {
    let time = cursor.read_varlong()?;
    let tid = cursor.read_varlong()? as u64;
    let stack_trace_id = cursor.read_varlong()? as u64;
    let thread_state = cursor.read_varint()?;

    Ok(ExecutionSample {
        time,
        tid,
        stack_trace_id,
        thread_state,
    })
}

/// `jdk.ObjectAllocationInNewTLAB` and `jdk.ObjectAllocationOutsideTLAB`
/// share a prefix; only the in-TLAB variant carries a trailing TLAB size.
pub(crate) fn decode_allocation_sample(
    cursor: &mut Cursor,
    in_new_tlab: bool,
) -> Result<AllocationSample> {
    let time = cursor.read_varlong()?;
    let tid = cursor.read_varlong()? as u64;
    let stack_trace_id = cursor.read_varlong()? as u64;
    let class_id = cursor.read_varlong()? as u64;
    let allocation_size = cursor.read_varlong()? as u64;

    let tlab_size = if in_new_tlab {
        cursor.read_varlong()? as u64
    } else {
        0
    };

    Ok(AllocationSample {
        time,
        tid,
        stack_trace_id,
        class_id,
        allocation_size,
        tlab_size,
    })
}

/// `jdk.JavaMonitorEnter` and `jdk.ThreadPark` share a prefix of time,
/// duration, thread, stack trace, and the contended class; `ThreadPark`
/// additionally carries a `timeout` field ahead of the trailing `address`,
/// which every variant reads and discards.
pub(crate) fn decode_contended_lock(cursor: &mut Cursor, is_park: bool) -> Result<ContendedLock> {
    let time = cursor.read_varlong()?;
    let duration = cursor.read_varlong()?;
    let tid = cursor.read_varlong()? as u64;
    let stack_trace_id = cursor.read_varlong()? as u64;
    let class_id = cursor.read_varlong()? as u64;

    if is_park {
        let _timeout = cursor.read_varlong()?;
    }

    let _address = cursor.read_varlong()?;

    Ok(ContendedLock {
        time,
        tid,
        stack_trace_id,
        duration,
        class_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encodes `v` the same way [Cursor::read_varlong] decodes it: up to
    /// eight 7-bit continuation groups, falling back to a raw 9th byte for
    /// values whose top bit stays set through all eight.
    fn varint(buf: &mut Vec<u8>, v: i64) {
        let mut u = v as u64;

        for _ in 0..8 {
            let byte = (u & 0x7f) as u8;
            u >>= 7;

            if u == 0 {
                buf.push(byte);
                return;
            }

            buf.push(byte | 0x80);
        }

        buf.push(u as u8);
    }

    #[test]
    fn header_reads_size_and_type() {
        let mut data = Vec::new();
        varint(&mut data, 37);
        varint(&mut data, 4);

        let mut cursor = Cursor::new(&data);
        let header = EventHeader::parse(&mut cursor).unwrap();

        assert_eq!(header.size, 37);
        assert_eq!(header.event_type, 4);
    }

    #[test]
    fn execution_sample_decodes_in_field_order() {
        let mut data = Vec::new();
        varint(&mut data, 1000); // time
        varint(&mut data, 7); // tid
        varint(&mut data, 42); // stackTraceId
        varint(&mut data, 3); // threadState

        let mut cursor = Cursor::new(&data);
        let sample = decode_execution_sample(&mut cursor).unwrap();

        assert_eq!(
            sample,
            ExecutionSample {
                time: 1000,
                tid: 7,
                stack_trace_id: 42,
                thread_state: 3,
            }
        );
    }

    #[test]
    fn allocation_outside_tlab_has_zero_tlab_size() {
        let mut data = Vec::new();
        varint(&mut data, 6); // time
        varint(&mut data, 1); // tid
        varint(&mut data, 2); // stackTraceId
        varint(&mut data, 9); // classId
        varint(&mut data, 200); // allocationSize

        let mut cursor = Cursor::new(&data);
        let sample = decode_allocation_sample(&mut cursor, false).unwrap();

        assert_eq!(sample.tlab_size, 0);
        assert_eq!(sample.allocation_size, 200);
    }

    #[test]
    fn java_monitor_enter_has_no_timeout_field() {
        let mut data = Vec::new();
        varint(&mut data, 10); // time
        varint(&mut data, 500); // duration
        varint(&mut data, 2); // tid
        varint(&mut data, 3); // stackTraceId
        varint(&mut data, 4); // classId
        varint(&mut data, 0xdead); // address (discarded)

        let mut cursor = Cursor::new(&data);
        let lock = decode_contended_lock(&mut cursor, false).unwrap();

        assert_eq!(
            lock,
            ContendedLock {
                time: 10,
                tid: 2,
                stack_trace_id: 3,
                duration: 500,
                class_id: 4,
            }
        );
    }

    #[test]
    fn thread_park_reads_and_discards_timeout_before_address() {
        let mut data = Vec::new();
        varint(&mut data, 11); // time
        varint(&mut data, 0); // duration
        varint(&mut data, 2); // tid
        varint(&mut data, 3); // stackTraceId
        varint(&mut data, 0); // classId
        varint(&mut data, -1); // timeout (discarded)
        varint(&mut data, 0); // address (discarded)

        let mut cursor = Cursor::new(&data);
        let lock = decode_contended_lock(&mut cursor, true).unwrap();

        assert_eq!(
            lock,
            ContendedLock {
                time: 11,
                tid: 2,
                stack_trace_id: 3,
                duration: 0,
                class_id: 0,
            }
        );
    }
}
