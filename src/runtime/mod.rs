//! Runtime primitives for compiled programs.
//!
//! Generated code calls these `extern "C"` functions through opaque `i8*`
//! handles: owned strings, dynamic vectors, sets and maps. Container
//! elements cross the boundary as 64-bit slots whose meaning depends on the
//! container's [`SlotKind`].
//!
//! Faults (bad indices, missing keys) never unwind. The first one is
//! recorded in thread-local state and a default value is returned, so a
//! faulting program runs to completion and [`jit::execute`] reports it.
//!
//! Submodules:
//! - strings: String construction, comparison, case, trim, parsing, printing
//! - containers: Dynamic vectors, sets and maps
//! - numeric: Math helpers and the runtime index check
//! - jit: JIT execution of a compiled module

use std::{cell::RefCell, collections::HashSet};

pub mod containers;
pub mod jit;
pub mod numeric;
pub mod strings;

pub use jit::{execute, RuntimeError};

#[cfg(test)]
mod tests;

/// Element kind of a runtime container.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Int = 0,
    Float = 1,
    Str = 2,
    Bool = 3,
    Enum = 4,
}

impl SlotKind {
    pub fn from_raw(raw: i32) -> SlotKind {
        match raw {
            1 => SlotKind::Float,
            2 => SlotKind::Str,
            3 => SlotKind::Bool,
            4 => SlotKind::Enum,
            _ => SlotKind::Int,
        }
    }
}

// Thread-local so parallel tests each get their own program state.
thread_local! {
    static FAULT: RefCell<Option<String>> = const { RefCell::new(None) };
    static OUTPUT: RefCell<Option<String>> = const { RefCell::new(None) };
    static ENUM_NAMES: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    static HANDLES: RefCell<HandleTracker> = RefCell::new(HandleTracker::default());
}

/// Heap handles handed out and released on the current thread since the
/// last [`reset`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HandleStats {
    pub allocated: u64,
    pub released: u64,
}

impl HandleStats {
    pub fn live(&self) -> u64 {
        self.allocated.saturating_sub(self.released)
    }
}

#[derive(Debug, Default)]
struct HandleTracker {
    live: HashSet<usize>,
    stats: HandleStats,
}

pub fn handle_stats() -> HandleStats {
    HANDLES.with(|handles| handles.borrow().stats)
}

pub(crate) fn track_allocation<T>(handle: *mut T) -> *mut T {
    HANDLES.with(|handles| {
        let mut handles = handles.borrow_mut();
        handles.live.insert(handle as usize);
        handles.stats.allocated += 1;
    });
    handle
}

/// Marks a handle as released. A handle that is not live (already
/// released, or never handed out) records a fault and must not be freed.
pub(crate) fn track_release<T>(handle: *mut T) -> bool {
    let known = HANDLES.with(|handles| {
        let mut handles = handles.borrow_mut();
        let known = handles.live.remove(&(handle as usize));
        if known {
            handles.stats.released += 1;
        }
        known
    });
    if !known {
        record_fault(format!("release of unknown handle {:p}", handle));
    }
    known
}

/// Records a runtime fault; only the first one is kept.
pub fn record_fault(message: String) {
    FAULT.with(|fault| {
        let mut fault = fault.borrow_mut();
        if fault.is_none() {
            *fault = Some(message);
        }
    });
}

pub fn take_fault() -> Option<String> {
    FAULT.with(|fault| fault.borrow_mut().take())
}

/// Starts capturing printed output instead of writing to stdout.
pub fn begin_capture() {
    OUTPUT.with(|output| *output.borrow_mut() = Some(String::new()));
}

/// Stops capturing and returns everything printed since `begin_capture`.
pub fn end_capture() -> String {
    OUTPUT.with(|output| output.borrow_mut().take().unwrap_or_default())
}

pub(crate) fn write_output(text: &str) {
    let captured = OUTPUT.with(|output| match output.borrow_mut().as_mut() {
        Some(buffer) => {
            buffer.push_str(text);
            true
        }
        None => false,
    });

    if !captured {
        print!("{}", text);
    }
}

pub(crate) fn register_enum_name(id: i32, name: String) {
    ENUM_NAMES.with(|names| {
        let mut names = names.borrow_mut();
        let index = id.max(0) as usize;
        if names.len() <= index {
            names.resize(index + 1, String::new());
        }
        names[index] = name;
    });
}

pub(crate) fn enum_name(id: i32) -> String {
    ENUM_NAMES.with(|names| {
        names
            .borrow()
            .get(id.max(0) as usize)
            .filter(|name| !name.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("enum#{}", id))
    })
}

/// Clears every piece of thread-local program state.
pub fn reset() {
    take_fault();
    ENUM_NAMES.with(|names| names.borrow_mut().clear());
    OUTPUT.with(|output| *output.borrow_mut() = None);
    HANDLES.with(|handles| *handles.borrow_mut() = HandleTracker::default());
}
