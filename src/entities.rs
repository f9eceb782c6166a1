// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Immutable value records produced by the constant pool reader and the
//! event stream reader.
//!
//! These mirror the handful of async-profiler JFR record shapes this crate
//! cares about: reference data (threads, classes, methods, symbols, stack
//! traces) lives in [crate::dictionary::Dictionary]s keyed by id, while
//! events are produced one at a time from the event stream.

/// A resolved reference to a `java.lang.Class` constant pool entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClassRef {
    /// Id of the `jdk.types.Symbol` entry holding the class name.
    pub name_symbol_id: u64,
}

/// A resolved reference to a `jdk.types.Method` constant pool entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MethodRef {
    pub class_id: u64,
    pub name_symbol_id: u64,
    pub signature_symbol_id: u64,
}

/// A resolved reference to a `jdk.types.StackTrace` constant pool entry.
///
/// `method_ids` and `frame_types` are parallel sequences; frame 0 is the
/// deepest frame, per JFR convention.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StackTrace {
    pub method_ids: Vec<u64>,
    pub frame_types: Vec<u8>,
}

/// `jdk.ExecutionSample` / `jdk.NativeMethodSample`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ExecutionSample {
    pub time: i64,
    pub tid: u64,
    pub stack_trace_id: u64,
    pub thread_state: i32,
}

/// `jdk.ObjectAllocationInNewTLAB` / `jdk.ObjectAllocationOutsideTLAB`.
///
/// `tlab_size` is 0 when the source event was the "outside TLAB" variant,
/// which carries no TLAB size field on the wire.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AllocationSample {
    pub time: i64,
    pub tid: u64,
    pub stack_trace_id: u64,
    pub class_id: u64,
    pub allocation_size: u64,
    pub tlab_size: u64,
}

/// `jdk.JavaMonitorEnter` / `jdk.ThreadPark`, unified into one shape.
///
/// The park-specific `timeout` field is read and discarded at decode time;
/// it has no counterpart for monitor-enter events.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ContendedLock {
    pub time: i64,
    pub tid: u64,
    pub stack_trace_id: u64,
    pub duration: i64,
    pub class_id: u64,
}

/// Any one of the recognized event kinds this crate decodes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Event {
    ExecutionSample(ExecutionSample),
    AllocationSample(AllocationSample),
    ContendedLock(ContendedLock),
}

impl Event {
    /// The writer-tick timestamp common to every event kind, used to sort
    /// [crate::reader::JfrReader::read_all_events] output.
    pub fn time(&self) -> i64 {
        match self {
            Self::ExecutionSample(e) => e.time,
            Self::AllocationSample(e) => e.time,
            Self::ContendedLock(e) => e.time,
        }
    }
}

/// Exposes the writer-tick timestamp common to every event kind, so
/// [crate::reader::JfrReader::read_all_events] can sort heterogeneous result
/// sequences without matching on [Event] itself.
pub trait Timed {
    fn time(&self) -> i64;
}

impl Timed for Event {
    fn time(&self) -> i64 {
        Event::time(self)
    }
}

impl Timed for ExecutionSample {
    fn time(&self) -> i64 {
        self.time
    }
}

impl Timed for AllocationSample {
    fn time(&self) -> i64 {
        self.time
    }
}

impl Timed for ContendedLock {
    fn time(&self) -> i64 {
        self.time
    }
}

/// Narrows an [Event] to one concrete kind.
///
/// `JfrReader::read_event::<K>()` is generic over this trait rather than
/// over a runtime kind enum, so each kind-specific read call is monomorphized
/// and the caller never handles an impossible variant.
pub trait FromEvent: Sized {
    fn from_event(event: Event) -> Option<Self>;
}

impl FromEvent for Event {
    fn from_event(event: Event) -> Option<Self> {
        Some(event)
    }
}

impl FromEvent for ExecutionSample {
    fn from_event(event: Event) -> Option<Self> {
        match event {
            Event::ExecutionSample(e) => Some(e),
            _ => None,
        }
    }
}

impl FromEvent for AllocationSample {
    fn from_event(event: Event) -> Option<Self> {
        match event {
            Event::AllocationSample(e) => Some(e),
            _ => None,
        }
    }
}

impl FromEvent for ContendedLock {
    fn from_event(event: Event) -> Option<Self> {
        match event {
            Event::ContendedLock(e) => Some(e),
            _ => None,
        }
    }
}
