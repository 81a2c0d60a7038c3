//! Symbol environment.
//!
//! A stack of scope frames with explicit parent links. Function bodies push
//! a frame whose parent is the global frame, so the frames of the code that
//! happens to be lowered around them stay invisible. Every frame keeps its
//! definitions keyed by namespace and then by plain name.

use std::collections::HashMap;

use inkwell::{
    basic_block::BasicBlock,
    values::{FunctionValue, PointerValue},
};
use tracing::trace;

use crate::{errors::errors::ErrorImpl, types::types::Type};

use super::{
    aggregates::{FunctionDescriptor, StructDescriptor},
    compiler::Compiler,
    value::Value,
};

/// Name that binds nothing.
pub const DISCARD: &str = "_";

pub const SEPARATOR: &str = "::";

/// A heap resource owned by a frame.
///
/// Not `Clone`: the frame that registered it is the only one releasing it.
/// The slot is nulled on release, so releasing an already released slot on
/// another exit path does nothing.
#[derive(Debug)]
pub struct OwnedResource<'ctx> {
    slot: PointerValue<'ctx>,
    ty: Type,
}

impl<'ctx> OwnedResource<'ctx> {
    pub fn new(slot: PointerValue<'ctx>, ty: Type) -> Self {
        OwnedResource { slot, ty }
    }

    /// Releases the resource when its frame is popped.
    pub fn release(self, compiler: &Compiler<'_, 'ctx>) {
        compiler.release_storage(self.slot, &self.ty);
    }

    /// Releases the resource on a jump out of its frame; the frame itself
    /// stays alive for the code lowered after the jump.
    pub fn release_on_exit(&self, compiler: &Compiler<'_, 'ctx>) {
        compiler.release_storage(self.slot, &self.ty);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LoopTargets<'ctx> {
    pub break_block: BasicBlock<'ctx>,
    pub continue_block: BasicBlock<'ctx>,
}

/// The function whose body is being lowered.
#[derive(Debug, Clone)]
pub struct FunctionContext<'ctx> {
    /// Fully qualified name, used as diagnostic context
    pub name: String,
    /// `None` where `return` is not allowed (the top level)
    pub returns: Option<Type>,
    pub ret_slot: Option<PointerValue<'ctx>>,
    pub llvm: FunctionValue<'ctx>,
    /// Block holding every stack slot of the function
    pub entry: BasicBlock<'ctx>,
}

type Table<T> = HashMap<String, HashMap<String, T>>;

#[derive(Debug)]
pub struct ScopeFrame<'ctx> {
    pub parent: Option<usize>,
    pub namespace: Vec<String>,
    variables: Table<Value<'ctx>>,
    functions: Table<FunctionDescriptor<'ctx>>,
    structs: Table<StructDescriptor<'ctx>>,
    pub cleanup: Vec<OwnedResource<'ctx>>,
    pub loop_targets: Option<LoopTargets<'ctx>>,
    pub function: Option<FunctionContext<'ctx>>,
    pub is_function_root: bool,
}

impl<'ctx> ScopeFrame<'ctx> {
    fn new(
        parent: Option<usize>,
        namespace: Vec<String>,
        function: Option<FunctionContext<'ctx>>,
        is_function_root: bool,
    ) -> Self {
        ScopeFrame {
            parent,
            namespace,
            variables: HashMap::new(),
            functions: HashMap::new(),
            structs: HashMap::new(),
            cleanup: vec![],
            loop_targets: None,
            function,
            is_function_root,
        }
    }
}

/// Splits `a::b::name` into its namespace segments and the plain name.
pub fn split_path(path: &str) -> (Vec<String>, String) {
    let mut segments: Vec<String> = path.split(SEPARATOR).map(String::from).collect();
    let name = segments.pop().unwrap_or_default();
    (segments, name)
}

pub fn join_path(namespace: &[String], name: &str) -> String {
    if namespace.is_empty() {
        String::from(name)
    } else {
        format!("{}{}{}", namespace.join(SEPARATOR), SEPARATOR, name)
    }
}

#[derive(Debug)]
pub struct Environment<'ctx> {
    frames: Vec<ScopeFrame<'ctx>>,
    external_namespaces: Vec<String>,
}

impl<'ctx> Environment<'ctx> {
    /// Creates the environment with its global frame.
    pub fn new(external_namespaces: Vec<String>, main: Option<FunctionContext<'ctx>>) -> Self {
        Environment {
            frames: vec![ScopeFrame::new(None, vec![], main, true)],
            external_namespaces,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Index of the innermost frame. The global frame is never removed, so
    /// the stack is never empty.
    pub fn top_index(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    pub fn is_global(&self) -> bool {
        self.frames.len() == 1
    }

    pub fn frame(&self, index: usize) -> &ScopeFrame<'ctx> {
        &self.frames[index]
    }

    fn top(&self) -> &ScopeFrame<'ctx> {
        &self.frames[self.top_index()]
    }

    fn top_mut(&mut self) -> &mut ScopeFrame<'ctx> {
        let index = self.top_index();
        &mut self.frames[index]
    }

    pub fn set_main(&mut self, main: FunctionContext<'ctx>) {
        self.frames[0].function = Some(main);
    }

    /// Pushes a block frame inheriting namespace and function.
    pub fn push(&mut self) {
        let parent = self.top_index();
        let frame = ScopeFrame::new(
            Some(parent),
            self.top().namespace.clone(),
            self.top().function.clone(),
            false,
        );
        self.frames.push(frame);
        trace!(depth = self.frames.len(), "push scope");
    }

    /// Pushes the root frame of a function body; its parent is the global
    /// frame.
    pub fn push_function(&mut self, function: FunctionContext<'ctx>, namespace: Vec<String>) {
        self.frames
            .push(ScopeFrame::new(Some(0), namespace, Some(function), true));
        trace!(depth = self.frames.len(), "push function scope");
    }

    /// Removes the top frame; the caller releases its resources.
    pub fn pop(&mut self) -> Option<ScopeFrame<'ctx>> {
        if self.frames.len() == 1 {
            return None;
        }
        trace!(depth = self.frames.len(), "pop scope");
        self.frames.pop()
    }

    /// Empties the cleanup list of the top frame, which stays on the stack
    /// so member types stay resolvable while the resources are released.
    pub fn take_cleanup(&mut self) -> Vec<OwnedResource<'ctx>> {
        std::mem::take(&mut self.top_mut().cleanup)
    }

    pub fn namespace(&self) -> &[String] {
        &self.top().namespace
    }

    pub fn push_namespace(&mut self, segment: &str) {
        self.top_mut().namespace.push(String::from(segment));
    }

    pub fn pop_namespace(&mut self) {
        self.top_mut().namespace.pop();
    }

    /// Replaces the namespace of the top frame, returning the previous one.
    pub fn set_namespace(&mut self, namespace: Vec<String>) -> Vec<String> {
        std::mem::replace(&mut self.top_mut().namespace, namespace)
    }

    pub fn function(&self) -> Option<&FunctionContext<'ctx>> {
        self.top().function.as_ref()
    }

    pub fn register_cleanup(&mut self, resource: OwnedResource<'ctx>) {
        trace!(ty = %resource.ty, depth = self.frames.len(), "register cleanup");
        self.top_mut().cleanup.push(resource);
    }

    fn check_name(name: &str) -> Result<(), ErrorImpl> {
        if name.contains(SEPARATOR) || name == DISCARD || name.is_empty() {
            return Err(ErrorImpl::InvalidName {
                name: String::from(name),
            });
        }
        Ok(())
    }

    fn define<T>(
        table: &mut Table<T>,
        namespace: &[String],
        name: &str,
        item: T,
    ) -> Result<(), ErrorImpl> {
        Environment::check_name(name)?;
        let entries = table.entry(namespace.join(SEPARATOR)).or_default();
        if entries.contains_key(name) {
            return Err(ErrorImpl::DuplicateDefinition {
                name: join_path(namespace, name),
            });
        }
        entries.insert(String::from(name), item);
        Ok(())
    }

    pub fn define_variable(&mut self, name: &str, value: Value<'ctx>) -> Result<(), ErrorImpl> {
        let frame = self.top_mut();
        Environment::define(&mut frame.variables, &frame.namespace, name, value)
    }

    /// Functions and structs always live in the global frame.
    pub fn define_function(
        &mut self,
        namespace: &[String],
        function: FunctionDescriptor<'ctx>,
    ) -> Result<(), ErrorImpl> {
        let name = function.name.clone();
        Environment::define(&mut self.frames[0].functions, namespace, &name, function)
    }

    pub fn define_struct(
        &mut self,
        namespace: &[String],
        descriptor: StructDescriptor<'ctx>,
    ) -> Result<(), ErrorImpl> {
        let name = descriptor.name.clone();
        Environment::define(&mut self.frames[0].structs, namespace, &name, descriptor)
    }

    /// Replaces a registered struct once its members are known.
    pub fn update_struct(&mut self, namespace: &[String], descriptor: StructDescriptor<'ctx>) {
        if let Some(entry) = self.frames[0]
            .structs
            .get_mut(&namespace.join(SEPARATOR))
            .and_then(|entries| entries.get_mut(&descriptor.name))
        {
            *entry = descriptor;
        }
    }

    /// Namespaces a path may live in, nearest first.
    ///
    /// `global::` makes a path absolute, external namespaces are taken
    /// verbatim, anything else is tried relative to the current namespace
    /// and then to each of its parents.
    pub fn candidate_namespaces(&self, qualifier: &[String]) -> Vec<String> {
        if qualifier.first().map(String::as_str) == Some("global") {
            return vec![qualifier[1..].join(SEPARATOR)];
        }

        if let Some(first) = qualifier.first() {
            if self.external_namespaces.contains(first) {
                return vec![qualifier.join(SEPARATOR)];
            }
        }

        let current = self.namespace();
        (0..=current.len())
            .rev()
            .map(|keep| {
                current[..keep]
                    .iter()
                    .chain(qualifier.iter())
                    .cloned()
                    .collect::<Vec<String>>()
                    .join(SEPARATOR)
            })
            .collect()
    }

    /// Indices of the frames visible from the top, innermost first.
    fn visible_frames(&self) -> Vec<usize> {
        let mut visible = vec![];
        let mut index = Some(self.top_index());
        while let Some(current) = index {
            visible.push(current);
            index = self.frames[current].parent;
        }
        visible
    }

    fn lookup<T: Clone>(
        &self,
        path: &str,
        table: impl for<'f> Fn(&'f ScopeFrame<'ctx>) -> &'f Table<T>,
    ) -> Option<(T, String)> {
        let (qualifier, name) = split_path(path);
        let frames = self.visible_frames();

        for namespace in self.candidate_namespaces(&qualifier) {
            for &index in frames.iter() {
                let found = table(&self.frames[index])
                    .get(&namespace)
                    .and_then(|entries| entries.get(&name));
                if let Some(found) = found {
                    return Some((found.clone(), namespace));
                }
            }
        }

        None
    }

    /// Resolves a variable path; `None` when nothing matches.
    pub fn get_variable(&self, path: &str) -> Option<Value<'ctx>> {
        self.lookup(path, |frame| &frame.variables)
            .map(|(value, _)| value)
    }

    pub fn get_function(&self, path: &str) -> Option<FunctionDescriptor<'ctx>> {
        self.lookup(path, |frame| &frame.functions)
            .map(|(function, _)| function)
    }

    pub fn get_struct(&self, path: &str) -> Option<StructDescriptor<'ctx>> {
        self.lookup(path, |frame| &frame.structs)
            .map(|(descriptor, _)| descriptor)
    }

    pub fn set_loop_targets(&mut self, targets: LoopTargets<'ctx>) {
        self.top_mut().loop_targets = Some(targets);
    }

    pub fn clear_loop_targets(&mut self) {
        self.top_mut().loop_targets = None;
    }

    /// Nearest loop targets and the index of the frame holding them; the
    /// search stops at the root frame of the current function.
    pub fn loop_targets(&self) -> Option<(LoopTargets<'ctx>, usize)> {
        for index in self.visible_frames() {
            let frame = &self.frames[index];
            if let Some(targets) = frame.loop_targets {
                return Some((targets, index));
            }
            if frame.is_function_root {
                break;
            }
        }
        None
    }

    /// Frames a jump leaves: every visible frame above `stop`, innermost
    /// first. `stop` itself is included when `inclusive` is set.
    pub fn frames_until(&self, stop: usize, inclusive: bool) -> Vec<usize> {
        let mut leaving = vec![];
        for index in self.visible_frames() {
            if index == stop {
                if inclusive {
                    leaving.push(index);
                }
                break;
            }
            leaving.push(index);
        }
        leaving
    }

    /// Index of the root frame of the current function.
    pub fn function_root(&self) -> usize {
        self.visible_frames()
            .into_iter()
            .find(|&index| self.frames[index].is_function_root)
            .unwrap_or(0)
    }
}
