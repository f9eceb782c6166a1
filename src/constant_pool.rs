// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The per-chunk constant pool: a linked list of pool blocks, each holding
//! entries for one or more declared types.
//!
//! A fixed set of well-known types get hand-written decoders that populate
//! the reference dictionaries directly; every other type is consumed by a
//! generic reader driven by its field schema so the cursor stays in sync
//! without this crate needing to understand the type's semantics.

use crate::chunk::ChunkHeader;
use crate::cursor::Cursor;
use crate::dictionary::Dictionary;
use crate::entities::{ClassRef, MethodRef, StackTrace};
use crate::error::{Error, Result};
use crate::metadata::{JfrClass, TypeRegistry};
use rustc_hash::FxHashMap;

fn skip_chunk_header_entry(cursor: &mut Cursor) -> Result<()> {
    // An embedded copy of this chunk's own header, plus a 3-byte tag
    // preamble ahead of it.
    cursor.read_bytes(ChunkHeader::HEADER_SIZE + 3)?;
    Ok(())
}

fn read_thread_pool(
    cursor: &mut Cursor,
    class: &JfrClass,
    threads: &mut Dictionary<String>,
) -> Result<()> {
    let count = cursor.read_varint()?;
    let has_group = class.field("group").is_some();

    threads.preallocate(count.max(0) as usize);

    for _ in 0..count {
        let id = cursor.read_varlong()? as u64;
        let os_name = cursor.read_string()?;
        let _os_thread_id = cursor.read_varint()?;
        let java_name = cursor.read_string()?;
        let _java_thread_id = cursor.read_varlong()?;

        if has_group {
            cursor.read_varlong()?;
        }

        threads.insert(id, java_name.or(os_name).unwrap_or_default());
    }

    Ok(())
}

fn read_class_pool(
    cursor: &mut Cursor,
    class: &JfrClass,
    classes: &mut Dictionary<ClassRef>,
) -> Result<()> {
    let count = cursor.read_varint()?;
    let has_hidden = class.field("hidden").is_some();

    classes.preallocate(count.max(0) as usize);

    for _ in 0..count {
        let id = cursor.read_varlong()? as u64;
        let _loader = cursor.read_varlong()?;
        let name_symbol_id = cursor.read_varlong()? as u64;
        let _package = cursor.read_varlong()?;
        let _modifiers = cursor.read_varint()?;

        if has_hidden {
            cursor.read_varint()?;
        }

        classes.insert(id, ClassRef { name_symbol_id });
    }

    Ok(())
}

fn read_symbol_pool(cursor: &mut Cursor, symbols: &mut Dictionary<Vec<u8>>) -> Result<()> {
    let count = cursor.read_varint()?;
    symbols.preallocate(count.max(0) as usize);

    for _ in 0..count {
        let id = cursor.read_varlong()? as u64;
        let bytes = cursor.read_symbol_bytes()?;

        symbols.insert(id, bytes.to_vec());
    }

    Ok(())
}

fn read_method_pool(cursor: &mut Cursor, methods: &mut Dictionary<MethodRef>) -> Result<()> {
    let count = cursor.read_varint()?;
    methods.preallocate(count.max(0) as usize);

    for _ in 0..count {
        let id = cursor.read_varlong()? as u64;
        let class_id = cursor.read_varlong()? as u64;
        let name_symbol_id = cursor.read_varlong()? as u64;
        let signature_symbol_id = cursor.read_varlong()? as u64;
        let _modifiers = cursor.read_varint()?;
        let _hidden = cursor.read_varint()?;

        methods.insert(
            id,
            MethodRef {
                class_id,
                name_symbol_id,
                signature_symbol_id,
            },
        );
    }

    Ok(())
}

fn read_stack_trace_pool(
    cursor: &mut Cursor,
    stack_traces: &mut Dictionary<StackTrace>,
) -> Result<()> {
    let count = cursor.read_varint()?;
    stack_traces.preallocate(count.max(0) as usize);

    for _ in 0..count {
        let id = cursor.read_varlong()? as u64;
        let _truncated = cursor.read_varint()?;
        let depth = cursor.read_varint()?;

        let mut method_ids = Vec::with_capacity(depth.max(0) as usize);
        let mut frame_types = Vec::with_capacity(depth.max(0) as usize);

        for _ in 0..depth {
            let method = cursor.read_varlong()? as u64;
            let _line = cursor.read_varint()?;
            let _bci = cursor.read_varint()?;
            let frame_type = cursor.read_u8()?;

            method_ids.push(method);
            frame_types.push(frame_type);
        }

        stack_traces.insert(
            id,
            StackTrace {
                method_ids,
                frame_types,
            },
        );
    }

    Ok(())
}

fn read_label_map(cursor: &mut Cursor, labels: &mut FxHashMap<i32, String>) -> Result<()> {
    let count = cursor.read_varint()?;

    for _ in 0..count {
        let key = cursor.read_varint()?;
        let value = cursor.read_string()?.unwrap_or_default();

        labels.insert(key, value);
    }

    Ok(())
}

/// Decode an unrecognized type's pool entries using only its field schema:
/// constant-pool-reference fields and non-string fields are varlongs,
/// everything else is a string. Values are read to keep the cursor in sync
/// but otherwise discarded, since this reader has no typed destination for
/// arbitrary async-profiler/JDK event types.
fn read_generic_pool(cursor: &mut Cursor, class: &JfrClass, registry: &TypeRegistry) -> Result<()> {
    let string_type_id = registry
        .by_name("java.lang.String")
        .map(|c| c.id)
        .unwrap_or(-1);

    let numeric: Vec<bool> = class
        .fields
        .iter()
        .map(|f| f.constant_pool || f.type_id != string_type_id)
        .collect();

    let count = cursor.read_varint()?;

    for _ in 0..count {
        let _id = cursor.read_varlong()?;

        for is_numeric in &numeric {
            if *is_numeric {
                cursor.read_varlong()?;
            } else {
                cursor.read_string()?;
            }
        }
    }

    Ok(())
}

/// Dispatch one pool entry's body to the appropriate decoder based on its
/// declared type's name.
#[allow(clippy::too_many_arguments)]
fn read_pool_entry(
    cursor: &mut Cursor,
    class: &JfrClass,
    registry: &TypeRegistry,
    threads: &mut Dictionary<String>,
    classes: &mut Dictionary<ClassRef>,
    methods: &mut Dictionary<MethodRef>,
    symbols: &mut Dictionary<Vec<u8>>,
    stack_traces: &mut Dictionary<StackTrace>,
    frame_types: &mut FxHashMap<i32, String>,
    thread_states: &mut FxHashMap<i32, String>,
) -> Result<()> {
    match class.name.as_str() {
        "jdk.types.ChunkHeader" => skip_chunk_header_entry(cursor),
        "java.lang.Thread" => read_thread_pool(cursor, class, threads),
        "java.lang.Class" => read_class_pool(cursor, class, classes),
        "jdk.types.Symbol" => read_symbol_pool(cursor, symbols),
        "jdk.types.Method" => read_method_pool(cursor, methods),
        "jdk.types.StackTrace" => read_stack_trace_pool(cursor, stack_traces),
        "jdk.types.FrameType" => read_label_map(cursor, frame_types),
        "jdk.types.ThreadState" => read_label_map(cursor, thread_states),
        _ => read_generic_pool(cursor, class, registry),
    }
}

/// Walk the chunk-local linked list of pool blocks starting at `cursor`'s
/// current position (the chunk's constant-pool section offset), populating
/// every reference dictionary as entries are decoded.
#[allow(clippy::too_many_arguments)]
pub fn read_chunk_pools(
    cursor: &mut Cursor,
    registry: &TypeRegistry,
    threads: &mut Dictionary<String>,
    classes: &mut Dictionary<ClassRef>,
    methods: &mut Dictionary<MethodRef>,
    symbols: &mut Dictionary<Vec<u8>>,
    stack_traces: &mut Dictionary<StackTrace>,
    frame_types: &mut FxHashMap<i32, String>,
    thread_states: &mut FxHashMap<i32, String>,
) -> Result<()> {
    loop {
        let block_start = cursor.position();

        // Event-record preamble shared with every chunk event: size, the
        // record's own type id, timestamp, and duration. None are needed to
        // walk pool entries; `delta` is the distance to the next block, with
        // zero marking the last one.
        let _size = cursor.read_varint()?;
        let _pool_event_type = cursor.read_varlong()?;
        let _timestamp = cursor.read_varlong()?;
        let _duration = cursor.read_varlong()?;
        let delta = cursor.read_varlong()?;

        // A flags/mask value with no semantics this reader depends on.
        let _flags = cursor.read_varint()?;

        let pool_count = cursor.read_varint()?;

        for _ in 0..pool_count {
            let type_id = cursor.read_varint()? as i64;

            let class = registry.by_id(type_id).ok_or_else(|| {
                Error::InvalidFormat(format!(
                    "constant pool references unknown type id {type_id}"
                ))
            })?;

            read_pool_entry(
                cursor,
                class,
                registry,
                threads,
                classes,
                methods,
                symbols,
                stack_traces,
                frame_types,
                thread_states,
            )?;
        }

        if delta == 0 {
            break;
        }

        cursor.set_position((block_start as i64 + delta) as usize);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::JfrField;

    fn varint(buf: &mut Vec<u8>, mut v: i64) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;

            if v == 0 {
                buf.push(byte);
                break;
            } else {
                buf.push(byte | 0x80);
            }
        }
    }

    fn string(buf: &mut Vec<u8>, s: &str) {
        buf.push(3);
        varint(buf, s.len() as i64);
        buf.extend_from_slice(s.as_bytes());
    }

    #[test]
    fn symbol_pool_rejects_non_utf8_tag() {
        let mut data = Vec::new();
        varint(&mut data, 1); // count = 1
        varint(&mut data, 1); // id
        data.push(4); // wrong tag: not 3 (UTF-8)

        let mut cursor = Cursor::new(&data);
        let mut symbols = Dictionary::new();

        let err = read_symbol_pool(&mut cursor, &mut symbols).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(m) if m == "Invalid symbol encoding"));
    }

    #[test]
    fn symbol_pool_decodes_entries() {
        let mut data = Vec::new();
        varint(&mut data, 1);
        varint(&mut data, 7);
        string(&mut data, "hello");

        let mut cursor = Cursor::new(&data);
        let mut symbols = Dictionary::new();
        read_symbol_pool(&mut cursor, &mut symbols).unwrap();

        assert_eq!(symbols.get(7).unwrap(), b"hello");
    }

    #[test]
    fn thread_display_name_prefers_java_name() {
        let mut data = Vec::new();
        varint(&mut data, 2); // count
                              // entry 1: has both names
        varint(&mut data, 1); // id
        string(&mut data, "os-1");
        varint(&mut data, 11); // os thread id
        string(&mut data, "java-1");
        varint(&mut data, 21); // java thread id
                                // entry 2: only os name
        varint(&mut data, 2);
        string(&mut data, "os-2");
        varint(&mut data, 12);
        data.push(0); // java name: null tag
        varint(&mut data, 22);

        let class = JfrClass {
            id: 1,
            name: "java.lang.Thread".to_string(),
            simple_name: "Thread".to_string(),
            super_type: None,
            fields: vec![],
        };

        let mut cursor = Cursor::new(&data);
        let mut threads = Dictionary::new();
        read_thread_pool(&mut cursor, &class, &mut threads).unwrap();

        assert_eq!(threads.get(1).unwrap(), "java-1");
        assert_eq!(threads.get(2).unwrap(), "os-2");
    }

    #[test]
    fn generic_pool_reads_schema_driven_values_and_stays_in_sync() {
        let mut registry = TypeRegistry::new();
        registry.types_by_name.insert(
            "java.lang.String".to_string(),
            JfrClass {
                id: 99,
                name: "java.lang.String".to_string(),
                simple_name: "String".to_string(),
                super_type: None,
                fields: vec![],
            },
        );

        let class = JfrClass {
            id: 5,
            name: "jdk.types.Custom".to_string(),
            simple_name: "Custom".to_string(),
            super_type: None,
            fields: vec![
                JfrField {
                    name: "label".to_string(),
                    type_id: 99,
                    constant_pool: false,
                },
                JfrField {
                    name: "value".to_string(),
                    type_id: 1,
                    constant_pool: false,
                },
            ],
        };

        let mut data = Vec::new();
        varint(&mut data, 1); // count
        varint(&mut data, 42); // id (discarded)
        string(&mut data, "a label"); // string field
        varint(&mut data, 1234); // numeric field
        data.push(9); // trailing sentinel byte proving we stopped exactly in sync

        let mut cursor = Cursor::new(&data);
        read_generic_pool(&mut cursor, &class, &registry).unwrap();

        assert_eq!(cursor.read_u8().unwrap(), 9);
    }
}
