//! Dynamic vectors, sets and maps.
//!
//! Elements arrive as 64-bit slots: integers sign-extended, floats as `f64`
//! bits, bools and enums zero-extended, strings as the address of a string
//! handle. Strings are deep-copied on the way in and handed out as fresh
//! owned handles on the way out. Sets and maps keep insertion order, which
//! is also their iteration order.

#![allow(clippy::not_unsafe_ptr_arg_deref)]

use indexmap::{IndexMap, IndexSet};

use super::{
    enum_name, record_fault,
    strings::{as_str, format_float, into_handle},
    track_allocation, track_release, SlotKind,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Enum(i32),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Int(i64),
    Str(String),
}

impl Element {
    pub fn default_of(kind: SlotKind) -> Element {
        match kind {
            SlotKind::Int => Element::Int(0),
            SlotKind::Float => Element::Float(0.0),
            SlotKind::Str => Element::Str(String::new()),
            SlotKind::Bool => Element::Bool(false),
            SlotKind::Enum => Element::Enum(0),
        }
    }

    pub fn from_bits(kind: SlotKind, bits: u64) -> Element {
        match kind {
            SlotKind::Int => Element::Int(bits as i64),
            SlotKind::Float => Element::Float(f64::from_bits(bits)),
            SlotKind::Str => Element::Str(String::from(as_str(bits as usize as *const String))),
            SlotKind::Bool => Element::Bool(bits != 0),
            SlotKind::Enum => Element::Enum(bits as i32),
        }
    }

    /// Slot for the generated code; strings become a new owned handle.
    pub fn to_bits(&self) -> u64 {
        match self {
            Element::Int(value) => *value as u64,
            Element::Float(value) => value.to_bits(),
            Element::Str(value) => into_handle(value.clone()) as usize as u64,
            Element::Bool(value) => *value as u64,
            Element::Enum(value) => *value as u32 as u64,
        }
    }

    pub fn key(&self) -> SlotKey {
        match self {
            Element::Int(value) => SlotKey::Int(*value),
            Element::Float(value) => SlotKey::Int(value.to_bits() as i64),
            Element::Str(value) => SlotKey::Str(value.clone()),
            Element::Bool(value) => SlotKey::Int(*value as i64),
            Element::Enum(value) => SlotKey::Int(*value as i64),
        }
    }

    pub fn from_key(kind: SlotKind, key: &SlotKey) -> Element {
        match (kind, key) {
            (_, SlotKey::Str(value)) => Element::Str(value.clone()),
            (SlotKind::Bool, SlotKey::Int(value)) => Element::Bool(*value != 0),
            (SlotKind::Enum, SlotKey::Int(value)) => Element::Enum(*value as i32),
            (SlotKind::Float, SlotKey::Int(value)) => Element::Float(f64::from_bits(*value as u64)),
            (_, SlotKey::Int(value)) => Element::Int(*value),
        }
    }

    pub fn display(&self) -> String {
        match self {
            Element::Int(value) => value.to_string(),
            Element::Float(value) => format_float(*value),
            Element::Str(value) => value.clone(),
            Element::Bool(value) => value.to_string(),
            Element::Enum(value) => enum_name(*value),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RtVec {
    pub kind: SlotKind,
    pub items: Vec<Element>,
}

#[derive(Debug, Clone)]
pub struct RtSet {
    pub kind: SlotKind,
    pub keys: IndexSet<SlotKey>,
    cursor: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct RtMap {
    pub key_kind: SlotKind,
    pub value_kind: SlotKind,
    pub entries: IndexMap<SlotKey, Element>,
    cursor: Option<usize>,
}

fn get<'a, T>(handle: *const T) -> Option<&'a T> {
    unsafe { handle.as_ref() }
}

fn get_mut<'a, T>(handle: *mut T) -> Option<&'a mut T> {
    unsafe { handle.as_mut() }
}

fn free<T>(handle: *mut T) {
    if !handle.is_null() && track_release(handle) {
        drop(unsafe { Box::from_raw(handle) });
    }
}

fn advance(cursor: &mut Option<usize>, len: usize) -> i32 {
    let next = cursor.map_or(0, |index| index + 1);
    *cursor = Some(next);
    (next < len) as i32
}

/// Replaces `dest` by a copy of `src`, allocating when `dest` is null.
///
/// A null `src` reads as an empty container shaped like `dest`.
fn assign<T: Clone>(
    dest: *mut T,
    src: *const T,
    empty: impl FnOnce(Option<&T>) -> T,
) -> *mut T {
    let value = match get(src) {
        Some(src) => src.clone(),
        None => empty(get(dest)),
    };
    match get_mut(dest) {
        Some(dest_ref) => {
            if dest as *const T != src {
                *dest_ref = value;
            }
            dest
        }
        None => track_allocation(Box::into_raw(Box::new(value))),
    }
}

// Dynamic vectors

#[no_mangle]
pub extern "C" fn rt_vec_new(kind: i32) -> *mut RtVec {
    track_allocation(Box::into_raw(Box::new(RtVec {
        kind: SlotKind::from_raw(kind),
        items: vec![],
    })))
}

#[no_mangle]
pub extern "C" fn rt_vec_free(handle: *mut RtVec) {
    free(handle);
}

#[no_mangle]
pub extern "C" fn rt_vec_len(handle: *const RtVec) -> i64 {
    get(handle).map_or(0, |vec| vec.items.len() as i64)
}

#[no_mangle]
pub extern "C" fn rt_vec_push(handle: *mut RtVec, bits: u64) {
    if let Some(vec) = get_mut(handle) {
        let element = Element::from_bits(vec.kind, bits);
        vec.items.push(element);
    }
}

#[no_mangle]
pub extern "C" fn rt_vec_get(handle: *const RtVec, index: i64) -> u64 {
    let Some(vec) = get(handle) else {
        record_fault(String::from("read from an unallocated vector"));
        return 0;
    };

    match usize::try_from(index).ok().and_then(|i| vec.items.get(i)) {
        Some(element) => element.to_bits(),
        None => {
            record_fault(format!(
                "index {} out of bounds for length {}",
                index,
                vec.items.len()
            ));
            Element::default_of(vec.kind).to_bits()
        }
    }
}

#[no_mangle]
pub extern "C" fn rt_vec_set(handle: *mut RtVec, index: i64, bits: u64) {
    let Some(vec) = get_mut(handle) else {
        return;
    };

    let element = Element::from_bits(vec.kind, bits);
    let len = vec.items.len();
    match usize::try_from(index).ok().and_then(|i| vec.items.get_mut(i)) {
        Some(slot) => *slot = element,
        None => record_fault(format!("index {} out of bounds for length {}", index, len)),
    }
}

/// Linear membership test. Generated code never asks this of a float vector.
#[no_mangle]
pub extern "C" fn rt_vec_contains(handle: *const RtVec, bits: u64) -> i32 {
    get(handle).map_or(0, |vec| {
        let needle = Element::from_bits(vec.kind, bits);
        vec.items.contains(&needle) as i32
    })
}

/// Structural replace: `dest` becomes a copy of `src`.
#[no_mangle]
pub extern "C" fn rt_vec_assign(dest: *mut RtVec, src: *const RtVec) -> *mut RtVec {
    assign(dest, src, |shape| RtVec {
        kind: shape.map_or(SlotKind::Int, |vec| vec.kind),
        items: vec![],
    })
}

/// `[value; count]`
#[no_mangle]
pub extern "C" fn rt_vec_fill(kind: i32, bits: u64, count: i64) -> *mut RtVec {
    let kind = SlotKind::from_raw(kind);
    let element = Element::from_bits(kind, bits);
    track_allocation(Box::into_raw(Box::new(RtVec {
        kind,
        items: vec![element; count.max(0) as usize],
    })))
}

/// `start..end`, end exclusive
#[no_mangle]
pub extern "C" fn rt_vec_range(start: i64, end: i64) -> *mut RtVec {
    track_allocation(Box::into_raw(Box::new(RtVec {
        kind: SlotKind::Int,
        items: (start..end).map(Element::Int).collect(),
    })))
}

#[no_mangle]
pub extern "C" fn rt_vec_to_string(handle: *const RtVec) -> *mut String {
    let items = get(handle).map_or(vec![], |vec| {
        vec.items.iter().map(Element::display).collect::<Vec<String>>()
    });
    into_handle(format!("[{}]", items.join(", ")))
}

// Sets

#[no_mangle]
pub extern "C" fn rt_set_new(kind: i32) -> *mut RtSet {
    track_allocation(Box::into_raw(Box::new(RtSet {
        kind: SlotKind::from_raw(kind),
        keys: IndexSet::new(),
        cursor: None,
    })))
}

#[no_mangle]
pub extern "C" fn rt_set_free(handle: *mut RtSet) {
    free(handle);
}

#[no_mangle]
pub extern "C" fn rt_set_len(handle: *const RtSet) -> i64 {
    get(handle).map_or(0, |set| set.keys.len() as i64)
}

#[no_mangle]
pub extern "C" fn rt_set_insert(handle: *mut RtSet, bits: u64) {
    if let Some(set) = get_mut(handle) {
        let key = Element::from_bits(set.kind, bits).key();
        set.keys.insert(key);
    }
}

#[no_mangle]
pub extern "C" fn rt_set_contains(handle: *const RtSet, bits: u64) -> i32 {
    get(handle).map_or(0, |set| {
        set.keys
            .contains(&Element::from_bits(set.kind, bits).key()) as i32
    })
}

#[no_mangle]
pub extern "C" fn rt_set_assign(dest: *mut RtSet, src: *const RtSet) -> *mut RtSet {
    assign(dest, src, |shape| RtSet {
        kind: shape.map_or(SlotKind::Int, |set| set.kind),
        keys: IndexSet::new(),
        cursor: None,
    })
}

#[no_mangle]
pub extern "C" fn rt_set_iter_start(handle: *mut RtSet) {
    if let Some(set) = get_mut(handle) {
        set.cursor = None;
    }
}

/// Moves the cursor forward; returns 1 while it points at a key.
#[no_mangle]
pub extern "C" fn rt_set_iter_next(handle: *mut RtSet) -> i32 {
    get_mut(handle).map_or(0, |set| advance(&mut set.cursor, set.keys.len()))
}

#[no_mangle]
pub extern "C" fn rt_set_iter_key(handle: *const RtSet) -> u64 {
    let Some(set) = get(handle) else {
        return 0;
    };

    match set.cursor.and_then(|index| set.keys.get_index(index)) {
        Some(key) => Element::from_key(set.kind, key).to_bits(),
        None => {
            record_fault(String::from("set iterator is not positioned on a key"));
            Element::default_of(set.kind).to_bits()
        }
    }
}

#[no_mangle]
pub extern "C" fn rt_set_to_string(handle: *const RtSet) -> *mut String {
    let keys = get(handle).map_or(vec![], |set| {
        set.keys
            .iter()
            .map(|key| Element::from_key(set.kind, key).display())
            .collect::<Vec<String>>()
    });
    into_handle(format!("{{{}}}", keys.join(", ")))
}

// Maps

#[no_mangle]
pub extern "C" fn rt_map_new(key_kind: i32, value_kind: i32) -> *mut RtMap {
    track_allocation(Box::into_raw(Box::new(RtMap {
        key_kind: SlotKind::from_raw(key_kind),
        value_kind: SlotKind::from_raw(value_kind),
        entries: IndexMap::new(),
        cursor: None,
    })))
}

#[no_mangle]
pub extern "C" fn rt_map_free(handle: *mut RtMap) {
    free(handle);
}

#[no_mangle]
pub extern "C" fn rt_map_len(handle: *const RtMap) -> i64 {
    get(handle).map_or(0, |map| map.entries.len() as i64)
}

/// Inserts or overwrites the value stored under a key.
#[no_mangle]
pub extern "C" fn rt_map_insert(handle: *mut RtMap, key: u64, value: u64) {
    if let Some(map) = get_mut(handle) {
        let key = Element::from_bits(map.key_kind, key).key();
        let value = Element::from_bits(map.value_kind, value);
        map.entries.insert(key, value);
    }
}

#[no_mangle]
pub extern "C" fn rt_map_get(handle: *const RtMap, key: u64) -> u64 {
    let Some(map) = get(handle) else {
        return 0;
    };

    let element = Element::from_bits(map.key_kind, key);
    match map.entries.get(&element.key()) {
        Some(value) => value.to_bits(),
        None => {
            record_fault(format!("key {} not found in map", element.display()));
            Element::default_of(map.value_kind).to_bits()
        }
    }
}

#[no_mangle]
pub extern "C" fn rt_map_contains(handle: *const RtMap, key: u64) -> i32 {
    get(handle).map_or(0, |map| {
        map.entries
            .contains_key(&Element::from_bits(map.key_kind, key).key()) as i32
    })
}

#[no_mangle]
pub extern "C" fn rt_map_assign(dest: *mut RtMap, src: *const RtMap) -> *mut RtMap {
    assign(dest, src, |shape| RtMap {
        key_kind: shape.map_or(SlotKind::Int, |map| map.key_kind),
        value_kind: shape.map_or(SlotKind::Int, |map| map.value_kind),
        entries: IndexMap::new(),
        cursor: None,
    })
}

#[no_mangle]
pub extern "C" fn rt_map_iter_start(handle: *mut RtMap) {
    if let Some(map) = get_mut(handle) {
        map.cursor = None;
    }
}

#[no_mangle]
pub extern "C" fn rt_map_iter_next(handle: *mut RtMap) -> i32 {
    get_mut(handle).map_or(0, |map| advance(&mut map.cursor, map.entries.len()))
}

#[no_mangle]
pub extern "C" fn rt_map_iter_key(handle: *const RtMap) -> u64 {
    let Some(map) = get(handle) else {
        return 0;
    };

    match map.cursor.and_then(|index| map.entries.get_index(index)) {
        Some((key, _)) => Element::from_key(map.key_kind, key).to_bits(),
        None => {
            record_fault(String::from("map iterator is not positioned on an entry"));
            Element::default_of(map.key_kind).to_bits()
        }
    }
}

#[no_mangle]
pub extern "C" fn rt_map_iter_value(handle: *const RtMap) -> u64 {
    let Some(map) = get(handle) else {
        return 0;
    };

    match map.cursor.and_then(|index| map.entries.get_index(index)) {
        Some((_, value)) => value.to_bits(),
        None => {
            record_fault(String::from("map iterator is not positioned on an entry"));
            Element::default_of(map.value_kind).to_bits()
        }
    }
}

#[no_mangle]
pub extern "C" fn rt_map_to_string(handle: *const RtMap) -> *mut String {
    let entries = get(handle).map_or(vec![], |map| {
        map.entries
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}: {}",
                    Element::from_key(map.key_kind, key).display(),
                    value.display()
                )
            })
            .collect::<Vec<String>>()
    });
    into_handle(format!("{{{}}}", entries.join(", ")))
}
