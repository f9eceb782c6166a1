// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The per-chunk metadata event: a string pool plus a recursive element tree
//! declaring the type/field schema used to decode that chunk's constant
//! pools and events.
//!
//! The element tree is rooted well below a `class`/`field` element (real
//! recordings nest them under `root` > `metadata` > `class`), but this
//! reader only cares about `class` and `field` elements wherever they occur;
//! everything else collapses to an opaque [Element::Generic] container that
//! is walked but never interpreted. This mirrors the "only a fixed set of
//! element kinds carry meaning" shape of the wire format without needing to
//! model `annotation`/`settings`/`region` elements that the constant-pool
//! reader never consults.

use crate::cursor::Cursor;
use crate::error::{Error, Result};
use rustc_hash::FxHashMap;

/// A field declared on a [JfrClass].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JfrField {
    pub name: String,

    /// Type id of this field's declared type.
    pub type_id: i64,

    /// True if the field's value on the wire is a 64-bit constant pool
    /// reference rather than an inline value.
    pub constant_pool: bool,
}

impl JfrField {
    fn from_attributes(attrs: &[(String, String)]) -> Result<Self> {
        let mut name = None;
        let mut type_id = None;
        let mut constant_pool = false;

        for (k, v) in attrs {
            match k.as_str() {
                "name" => name = Some(v.clone()),
                "class" => {
                    type_id = Some(v.parse::<i64>().map_err(|_| {
                        Error::InvalidFormat(format!("field class attribute not an integer: {v}"))
                    })?)
                }
                "constantPool" => constant_pool = v == "true",
                _ => {}
            }
        }

        Ok(Self {
            name: name
                .ok_or_else(|| Error::InvalidFormat("field element lacks name attribute".into()))?,
            type_id: type_id
                .ok_or_else(|| Error::InvalidFormat("field element lacks class attribute".into()))?,
            constant_pool,
        })
    }
}

/// A type declared in a chunk's metadata.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JfrClass {
    pub id: i64,
    pub name: String,
    pub simple_name: String,
    pub super_type: Option<String>,
    pub fields: Vec<JfrField>,
}

impl JfrClass {
    fn from_attributes_and_children(
        attrs: &[(String, String)],
        children: &[Element],
    ) -> Result<Self> {
        let mut id = None;
        let mut name = None;
        let mut super_type = None;

        for (k, v) in attrs {
            match k.as_str() {
                "id" => {
                    id = Some(v.parse::<i64>().map_err(|_| {
                        Error::InvalidFormat(format!("class id attribute not an integer: {v}"))
                    })?)
                }
                "name" => name = Some(v.clone()),
                "superType" => super_type = Some(v.clone()),
                _ => {}
            }
        }

        let id =
            id.ok_or_else(|| Error::InvalidFormat("class element lacks id attribute".into()))?;
        let name = name
            .ok_or_else(|| Error::InvalidFormat("class element lacks name attribute".into()))?;
        let simple_name = name
            .rsplit('.')
            .next()
            .map(str::to_string)
            .unwrap_or_else(|| name.clone());

        let fields = children
            .iter()
            .filter_map(|c| match c {
                Element::Field(f) => Some(f.clone()),
                _ => None,
            })
            .collect();

        Ok(Self {
            id,
            name,
            simple_name,
            super_type,
            fields,
        })
    }

    /// Look up a declared field by name.
    pub fn field(&self, name: &str) -> Option<&JfrField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A fully parsed metadata element.
///
/// Only `class` and `field` elements carry meaning for this reader; every
/// other element name (`root`, `metadata`, `annotation`, `settings`,
/// `region`, ...) collapses into [Element::Generic] and is walked solely to
/// discover nested `class` elements.
#[derive(Clone, Debug)]
pub enum Element {
    Class(JfrClass),
    Field(JfrField),
    Generic { name: String, children: Vec<Element> },
}

impl Element {
    fn children(&self) -> &[Element] {
        match self {
            Self::Generic { children, .. } => children,
            Self::Class(_) | Self::Field(_) => &[],
        }
    }
}

fn read_attribute_string<'a>(strings: &'a [String], index: i32) -> Result<&'a str> {
    strings
        .get(index as usize)
        .map(String::as_str)
        .ok_or_else(|| Error::InvalidFormat(format!("string pool index out of range: {index}")))
}

/// Read one element and its full subtree: an index into `strings` naming the
/// element, its attribute pairs, then its children recursively.
fn read_element(cursor: &mut Cursor, strings: &[String]) -> Result<Element> {
    let name_index = cursor.read_varint()?;
    let name = read_attribute_string(strings, name_index)?.to_string();

    let attr_count = cursor.read_varint()?;
    let mut attrs = Vec::with_capacity(attr_count.max(0) as usize);

    for _ in 0..attr_count {
        let key_index = cursor.read_varint()?;
        let value_index = cursor.read_varint()?;

        attrs.push((
            read_attribute_string(strings, key_index)?.to_string(),
            read_attribute_string(strings, value_index)?.to_string(),
        ));
    }

    let child_count = cursor.read_varint()?;
    let mut children = Vec::with_capacity(child_count.max(0) as usize);

    for _ in 0..child_count {
        children.push(read_element(cursor, strings)?);
    }

    Ok(match name.as_str() {
        "class" => Element::Class(JfrClass::from_attributes_and_children(&attrs, &children)?),
        "field" => Element::Field(JfrField::from_attributes(&attrs)?),
        _ => Element::Generic { name, children },
    })
}

fn collect_classes<'a>(element: &'a Element, out: &mut Vec<&'a JfrClass>) {
    if let Element::Class(class) = element {
        out.push(class);
    }

    for child in element.children() {
        collect_classes(child, out);
    }
}

/// The accumulated type registry, built across every chunk's metadata.
///
/// `types` indexes only top-level classes (no `superType`), matching the
/// set the constant-pool reader dispatches on; `typesByName` indexes every
/// class seen, last-writer-wins, since schemas agree across chunks in
/// practice.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    pub types: FxHashMap<i64, JfrClass>,
    pub types_by_name: FxHashMap<String, JfrClass>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(&self, id: i64) -> Option<&JfrClass> {
        self.types.get(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<&JfrClass> {
        self.types_by_name.get(name)
    }

    fn merge(&mut self, class: JfrClass) {
        if class.super_type.is_none() {
            self.types.insert(class.id, class.clone());
        }

        self.types_by_name.insert(class.name.clone(), class);
    }
}

/// Parse one chunk's metadata section and fold its classes into `registry`.
///
/// `cursor` must be positioned at the start of the metadata section (the
/// chunk header's `metadata_position` offset).
pub fn parse_metadata(cursor: &mut Cursor, registry: &mut TypeRegistry) -> Result<()> {
    // Event-kind header and timestamps: size, event type, start time,
    // duration, and a metadata id that mirrors the event type. Not needed to
    // decode the schema that follows.
    for _ in 0..5 {
        cursor.read_varlong()?;
    }

    let string_count = cursor.read_varint()?;
    let mut strings = Vec::with_capacity(string_count.max(0) as usize);

    for _ in 0..string_count {
        strings.push(cursor.read_string()?.unwrap_or_default());
    }

    let root = read_element(cursor, &strings)?;

    let mut classes = Vec::new();
    collect_classes(&root, &mut classes);

    for class in classes {
        registry.merge(class.clone());
    }

    Ok(())
}
