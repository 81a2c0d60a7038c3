//! Struct and function descriptors, and the storage operations shared by
//! every aggregate: structural copy, initialisation, release and member
//! access.

use std::collections::{HashMap, HashSet};

use inkwell::{
    types::{BasicMetadataTypeEnum, BasicType, FunctionType, StructType},
    values::{BasicMetadataValueEnum, CallableValue, FunctionValue, IntValue, PointerValue},
    AddressSpace,
};
use tracing::debug;

use crate::{
    ast::{
        ast::{ExprId, StmtId, TokenId},
        statements::{FunctionDecl, Stmt},
    },
    errors::errors::ErrorImpl,
    types::types::{Type, TypeKind},
};

use super::{
    builtins::Intrinsic,
    compiler::Compiler,
    environment::{join_path, FunctionContext},
    expr::gen_expression,
    runtime_abi::RuntimeFn,
    stmt::{gen_statement, Flow},
    value::Value,
};

/// A named struct layout.
#[derive(Debug, Clone)]
pub struct StructDescriptor<'ctx> {
    pub name: String,
    pub namespace: Vec<String>,
    /// Members in declaration order
    pub members: Vec<(String, Type)>,
    pub llvm: StructType<'ctx>,
    pub size: u32,
    pub is_valid: bool,
}

impl<'ctx> StructDescriptor<'ctx> {
    pub fn qualified_name(&self) -> String {
        join_path(&self.namespace, &self.name)
    }

    pub fn member(&self, name: &str) -> Option<(u32, &Type)> {
        self.members
            .iter()
            .enumerate()
            .find(|(_, (member, _))| member == name)
            .map(|(index, (_, ty))| (index as u32, ty))
    }
}

/// How a function is lowered when called.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FunctionBody {
    /// Direct call of a runtime primitive
    Native(RuntimeFn),
    /// Lowered inline through the value model
    Intrinsic(Intrinsic),
    /// User function declared by the statement; its body is generated in
    /// pass two
    Deferred(StmtId),
}

#[derive(Debug, Clone)]
pub struct FunctionDescriptor<'ctx> {
    pub name: String,
    pub namespace: Vec<String>,
    pub params: Vec<(String, Type)>,
    pub ret: Type,
    pub is_valid: bool,
    pub body: FunctionBody,
    pub llvm: Option<FunctionValue<'ctx>>,
}

impl<'ctx> FunctionDescriptor<'ctx> {
    pub fn qualified_name(&self) -> String {
        join_path(&self.namespace, &self.name)
    }

    pub fn has_ret_slot(&self) -> bool {
        self.ret.kind != TypeKind::Void
    }
}

/// Struct names a type holds by value.
fn struct_dependencies(ty: &Type, out: &mut Vec<String>) {
    match ty.kind {
        TypeKind::Struct => out.push(ty.name.clone()),
        TypeKind::FixedVec | TypeKind::Tuple => {
            for inner in ty.inner.iter() {
                struct_dependencies(inner, out);
            }
        }
        _ => {}
    }
}

struct PendingStruct {
    qualified: String,
    namespace: Vec<String>,
    name: String,
    token: TokenId,
    members: Vec<(String, Type)>,
    is_valid: bool,
}

impl<'a, 'ctx> Compiler<'a, 'ctx> {
    /// Creates the opaque LLVM struct for a declaration and registers its
    /// name, so later member lists can refer to it.
    pub fn declare_struct(&mut self, name: TokenId) {
        let plain = self.ast.lexeme(name);
        let namespace = self.env.namespace().to_vec();
        let qualified = join_path(&namespace, plain);
        let llvm = self
            .context
            .opaque_struct_type(&format!("struct.{}", qualified));

        let descriptor = StructDescriptor {
            name: String::from(plain),
            namespace: namespace.clone(),
            members: vec![],
            llvm,
            size: 0,
            is_valid: true,
        };

        match self.env.define_struct(&namespace, descriptor) {
            Ok(()) => {
                self.named_structs.insert(qualified, llvm);
            }
            Err(error) => self.report(error, name),
        }
    }

    /// Resolves member lists of the declared structs, rejects empty and
    /// self-containing structs, computes sizes and sets the LLVM bodies.
    pub fn resolve_structs(&mut self, declarations: &[(Vec<String>, StmtId)]) {
        let ast = self.ast;
        let mut pending: Vec<PendingStruct> = vec![];

        for (namespace, id) in declarations {
            let Stmt::StructDecl { name, members } = ast.stmt(*id) else {
                continue;
            };
            let qualified = join_path(namespace, ast.lexeme(*name));
            if pending.iter().any(|other| other.qualified == qualified) {
                continue;
            }

            let previous = self.env.set_namespace(namespace.clone());
            let mut resolved: Vec<(String, Type)> = vec![];
            let mut is_valid = true;

            for (ty, member) in members {
                let member_name = ast.lexeme(*member);
                let member_type = self.resolve_type(ty);
                if !member_type.is_valid {
                    is_valid = false;
                    continue;
                }
                if member_type.kind == TypeKind::Void {
                    self.report(
                        ErrorImpl::UnsupportedElementType {
                            ty: member_type.to_string(),
                        },
                        *member,
                    );
                    is_valid = false;
                    continue;
                }
                if resolved.iter().any(|(existing, _)| existing == member_name) {
                    self.report(
                        ErrorImpl::DuplicateDefinition {
                            name: format!("{}.{}", qualified, member_name),
                        },
                        *member,
                    );
                    is_valid = false;
                    continue;
                }
                resolved.push((String::from(member_name), member_type));
            }
            self.env.set_namespace(previous);

            if resolved.is_empty() && is_valid {
                self.report(
                    ErrorImpl::EmptyStruct {
                        name: qualified.clone(),
                    },
                    *name,
                );
                is_valid = false;
            }

            pending.push(PendingStruct {
                qualified,
                namespace: namespace.clone(),
                name: String::from(ast.lexeme(*name)),
                token: *name,
                members: resolved,
                is_valid,
            });
        }

        let dependencies: HashMap<String, Vec<String>> = pending
            .iter()
            .map(|item| {
                let mut deps = vec![];
                for (_, ty) in item.members.iter() {
                    struct_dependencies(ty, &mut deps);
                }
                (item.qualified.clone(), deps)
            })
            .collect();

        // A struct reaching itself through by-value members has no size.
        for item in pending.iter_mut() {
            let mut stack = dependencies
                .get(&item.qualified)
                .cloned()
                .unwrap_or_default();
            let mut seen = HashSet::new();
            while let Some(next) = stack.pop() {
                if next == item.qualified {
                    self.report(
                        ErrorImpl::RecursiveStruct {
                            name: item.qualified.clone(),
                        },
                        item.token,
                    );
                    item.is_valid = false;
                    break;
                }
                if seen.insert(next.clone()) {
                    stack.extend(dependencies.get(&next).cloned().unwrap_or_default());
                }
            }
        }

        // Structs holding an invalid struct are invalid too.
        loop {
            let invalid: HashSet<String> = pending
                .iter()
                .filter(|item| !item.is_valid)
                .map(|item| item.qualified.clone())
                .collect();
            let mut changed = false;
            for item in pending.iter_mut().filter(|item| item.is_valid) {
                let holds_invalid = dependencies
                    .get(&item.qualified)
                    .map(|deps| deps.iter().any(|dep| invalid.contains(dep)))
                    .unwrap_or(false);
                if holds_invalid {
                    item.is_valid = false;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let mut sizes: HashMap<String, u32> = HashMap::new();
        let valid: HashMap<String, &PendingStruct> = pending
            .iter()
            .filter(|item| item.is_valid)
            .map(|item| (item.qualified.clone(), item))
            .collect();
        for item in pending.iter().filter(|item| item.is_valid) {
            struct_size(&item.qualified, &valid, &mut sizes);
        }

        for item in pending.iter() {
            let Some(llvm) = self.named_structs.get(&item.qualified).copied() else {
                continue;
            };
            let members = item
                .members
                .iter()
                .map(|(name, ty)| (name.clone(), with_sizes(ty, &sizes)))
                .collect::<Vec<(String, Type)>>();

            let descriptor = StructDescriptor {
                name: item.name.clone(),
                namespace: item.namespace.clone(),
                size: sizes.get(&item.qualified).copied().unwrap_or(0),
                members,
                llvm,
                is_valid: item.is_valid,
            };
            self.env.update_struct(&item.namespace, descriptor);
        }

        for item in pending.iter().filter(|item| item.is_valid) {
            let Some(llvm) = self.named_structs.get(&item.qualified).copied() else {
                continue;
            };
            let fields = item
                .members
                .iter()
                .map(|(_, ty)| self.llvm_type(ty))
                .collect::<Vec<_>>();
            llvm.set_body(&fields, false);
            debug!(name = %item.qualified, size = sizes.get(&item.qualified).copied().unwrap_or(0), "struct resolved");
        }
    }

    /// Descriptor of a struct type.
    pub fn struct_descriptor(&self, ty: &Type) -> Option<StructDescriptor<'ctx>> {
        if ty.kind != TypeKind::Struct {
            return None;
        }
        self.env
            .get_struct(&format!("global::{}", ty.name))
            .filter(|descriptor| descriptor.is_valid)
    }

    /// Component types of a struct or tuple, in layout order.
    pub fn member_types(&self, ty: &Type) -> Vec<Type> {
        match ty.kind {
            TypeKind::Tuple => ty.inner.clone(),
            TypeKind::Struct => self
                .struct_descriptor(ty)
                .map(|descriptor| descriptor.members.into_iter().map(|(_, ty)| ty).collect())
                .unwrap_or_default(),
            _ => vec![],
        }
    }

    /// Whether values of the type own heap resources, directly or through
    /// their members.
    pub fn needs_cleanup(&self, ty: &Type) -> bool {
        match ty.kind {
            TypeKind::String | TypeKind::DynVec | TypeKind::Set | TypeKind::Map => true,
            TypeKind::FixedVec => ty
                .inner
                .first()
                .map(|element| self.needs_cleanup(element))
                .unwrap_or(false),
            TypeKind::Tuple | TypeKind::Struct => self
                .member_types(ty)
                .iter()
                .any(|member| self.needs_cleanup(member)),
            _ => false,
        }
    }

    /// Address of the `index`-th member of a struct or tuple in storage.
    pub fn field_address(
        &self,
        base: PointerValue<'ctx>,
        ty: &Type,
        index: u32,
    ) -> PointerValue<'ctx> {
        let base = self.typed_base(base, ty);
        self.builder
            .build_struct_gep(base, index, "field")
            .unwrap()
    }

    /// Address of an element of a fixed vector in storage. The index is not
    /// checked here.
    pub fn element_address(
        &self,
        base: PointerValue<'ctx>,
        ty: &Type,
        index: IntValue<'ctx>,
    ) -> PointerValue<'ctx> {
        let base = self.typed_base(base, ty);
        let zero = self.context.i64_type().const_zero();
        unsafe {
            self.builder
                .build_in_bounds_gep(base, &[zero, index], "element")
                .unwrap()
        }
    }

    /// `base` as a pointer to the layout of `ty`.
    fn typed_base(&self, base: PointerValue<'ctx>, ty: &Type) -> PointerValue<'ctx> {
        let pointer_type = self.llvm_type(ty).ptr_type(AddressSpace::default());
        if base.get_type() == pointer_type {
            return base;
        }
        self.builder
            .build_pointer_cast(base, pointer_type, "typed")
            .unwrap()
    }

    fn const_index(&self, index: u32) -> IntValue<'ctx> {
        self.context.i64_type().const_int(index as u64, false)
    }

    /// Releases whatever the storage owns and nulls the handles, so a
    /// second release is a no-op.
    pub fn release_storage(&self, slot: PointerValue<'ctx>, ty: &Type) {
        let free = match ty.kind {
            TypeKind::String => Some(RuntimeFn::StringFree),
            TypeKind::DynVec => Some(RuntimeFn::VecFree),
            TypeKind::Set => Some(RuntimeFn::SetFree),
            TypeKind::Map => Some(RuntimeFn::MapFree),
            _ => None,
        };

        if let Some(free) = free {
            let handle = self
                .builder
                .build_load(slot, "handle")
                .unwrap();
            self.call_rt(free, &[handle.into()]);
            self.builder
                .build_store(slot, self.handle_type().const_null())
                .unwrap();
            return;
        }

        match ty.kind {
            TypeKind::FixedVec => {
                let Some(element) = ty.inner.first() else {
                    return;
                };
                if !self.needs_cleanup(element) {
                    return;
                }
                for index in 0..ty.count {
                    let address = self.element_address(slot, ty, self.const_index(index));
                    self.release_storage(address, element);
                }
            }
            TypeKind::Tuple | TypeKind::Struct => {
                for (index, member) in self.member_types(ty).iter().enumerate() {
                    if self.needs_cleanup(member) {
                        let address = self.field_address(slot, ty, index as u32);
                        self.release_storage(address, member);
                    }
                }
            }
            _ => {}
        }
    }

    /// Gives freshly declared storage its empty state: empty runtime
    /// containers, recursively through aggregates. Strings stay null,
    /// which reads as the empty string.
    pub fn init_storage(&self, slot: PointerValue<'ctx>, ty: &Type) {
        let kind_of = |ty: Option<&Type>| {
            let kind = ty.and_then(|ty| ty.slot_kind()).map(|kind| kind as i32);
            self.context
                .i32_type()
                .const_int(kind.unwrap_or(0) as u64, false)
        };

        let created = match ty.kind {
            TypeKind::DynVec => self.call_rt(RuntimeFn::VecNew, &[kind_of(ty.inner.first()).into()]),
            TypeKind::Set => self.call_rt(RuntimeFn::SetNew, &[kind_of(ty.inner.first()).into()]),
            TypeKind::Map => self.call_rt(
                RuntimeFn::MapNew,
                &[
                    kind_of(ty.inner.first()).into(),
                    kind_of(ty.inner.get(1)).into(),
                ],
            ),
            TypeKind::FixedVec => {
                if let Some(element) = ty.inner.first() {
                    if self.needs_cleanup(element) {
                        for index in 0..ty.count {
                            let address = self.element_address(slot, ty, self.const_index(index));
                            self.init_storage(address, element);
                        }
                    }
                }
                None
            }
            TypeKind::Tuple | TypeKind::Struct => {
                for (index, member) in self.member_types(ty).iter().enumerate() {
                    if self.needs_cleanup(member) {
                        let address = self.field_address(slot, ty, index as u32);
                        self.init_storage(address, member);
                    }
                }
                None
            }
            _ => None,
        };

        if let Some(handle) = created {
            self.store_handle(slot, handle, ty);
        }
    }

    /// Structural copy of `src` into the storage at `dest`, the one copy
    /// primitive behind declarations, assignment, argument binding and
    /// returns.
    ///
    /// `src` must already have the type `ty`. Strings and runtime
    /// containers are deep-copied in place through their assign
    /// primitives; aggregates are copied member by member.
    pub fn copy_storage(&self, dest: PointerValue<'ctx>, src: &Value<'ctx>, ty: &Type) {
        if !src.is_valid() || !ty.is_valid {
            return;
        }

        let assign = match ty.kind {
            TypeKind::String => Some(RuntimeFn::StringAssign),
            TypeKind::DynVec => Some(RuntimeFn::VecAssign),
            TypeKind::Set => Some(RuntimeFn::SetAssign),
            TypeKind::Map => Some(RuntimeFn::MapAssign),
            _ => None,
        };

        if let Some(assign) = assign {
            let Some(handle) = self.materialize(src) else {
                return;
            };
            let current = self
                .builder
                .build_load(dest, "current")
                .unwrap();
            if let Some(copied) = self.call_rt(assign, &[current.into(), handle.into()]) {
                self.builder.build_store(dest, copied).unwrap();
            }
            return;
        }

        if !ty.is_aggregate() {
            if let Some(materialized) = self.materialize(src) {
                self.builder.build_store(dest, materialized).unwrap();
            }
            return;
        }

        let Some(source) = src.address() else {
            return;
        };
        if source == dest {
            return;
        }

        match ty.kind {
            TypeKind::FixedVec => {
                let Some(element) = ty.inner.first() else {
                    return;
                };
                if !element.is_heap() && !element.is_aggregate() {
                    let whole = self
                        .builder
                        .build_load(source, "array")
                        .unwrap();
                    self.builder.build_store(dest, whole).unwrap();
                    return;
                }
                for index in 0..ty.count {
                    let from = self.element_address(source, ty, self.const_index(index));
                    let to = self.element_address(dest, ty, self.const_index(index));
                    self.copy_storage(to, &Value::storage(element.clone(), from), element);
                }
            }
            _ => {
                for (index, member) in self.member_types(ty).iter().enumerate() {
                    let from = self.field_address(source, ty, index as u32);
                    let to = self.field_address(dest, ty, index as u32);
                    self.copy_storage(to, &Value::storage(member.clone(), from), member);
                }
            }
        }
    }

    /// Typed address of a struct member.
    pub fn member_address(
        &mut self,
        object: &Value<'ctx>,
        member: &str,
        token: TokenId,
    ) -> Value<'ctx> {
        if !object.is_valid() {
            return Value::invalid();
        }

        let descriptor = match self.struct_descriptor(&object.ty) {
            Some(descriptor) => descriptor,
            None => {
                self.report(
                    ErrorImpl::UnknownMember {
                        ty: object.ty.to_string(),
                        member: String::from(member),
                    },
                    token,
                );
                return Value::invalid();
            }
        };

        let Some((index, member_type)) = descriptor.member(member) else {
            self.report(
                ErrorImpl::UnknownMember {
                    ty: descriptor.qualified_name(),
                    member: String::from(member),
                },
                token,
            );
            return Value::invalid();
        };

        let Some(base) = object.address() else {
            return Value::invalid();
        };

        let address = self.field_address(base, &object.ty, index);
        Value::storage(
            member_type.clone().with_const(object.ty.is_const),
            address,
        )
        .with_token(token)
    }

    /// Inline stringification of fixed vectors, tuples and structs.
    pub fn aggregate_to_string(&mut self, value: &Value<'ctx>, token: TokenId) -> Value<'ctx> {
        let Some(base) = value.address() else {
            return Value::invalid();
        };
        let ty = value.ty.clone();

        let (open, close, items): (String, &str, Vec<(Option<String>, Value<'ctx>)>) = match ty
            .kind
        {
            TypeKind::FixedVec => {
                let element = ty.inner.first().cloned().unwrap_or_else(Type::invalid);
                let items = (0..ty.count)
                    .map(|index| {
                        let address = self.element_address(base, &ty, self.const_index(index));
                        (None, Value::storage(element.clone(), address))
                    })
                    .collect();
                (String::from("["), "]", items)
            }
            TypeKind::Tuple => {
                let items = ty
                    .inner
                    .iter()
                    .enumerate()
                    .map(|(index, item)| {
                        let address = self.field_address(base, &ty, index as u32);
                        (None, Value::storage(item.clone(), address))
                    })
                    .collect();
                (String::from("("), ")", items)
            }
            _ => {
                let Some(descriptor) = self.struct_descriptor(&ty) else {
                    return Value::invalid();
                };
                let items = descriptor
                    .members
                    .iter()
                    .enumerate()
                    .map(|(index, (name, member))| {
                        let address = self.field_address(base, &ty, index as u32);
                        (Some(name.clone()), Value::storage(member.clone(), address))
                    })
                    .collect();
                (format!("{} {{ ", descriptor.name), " }", items)
            }
        };

        let mut parts = vec![self.string_literal(&open)];
        for (position, (label, item)) in items.into_iter().enumerate() {
            let mut prefix = String::new();
            if position > 0 {
                prefix.push_str(", ");
            }
            if let Some(label) = label {
                prefix.push_str(&label);
                prefix.push_str(": ");
            }
            if !prefix.is_empty() {
                parts.push(self.string_literal(&prefix));
            }
            parts.push(self.to_display_string(&item, token));
        }
        parts.push(self.string_literal(close));

        self.concat_strings(parts, token)
    }

    /// LLVM signature of the calling convention: `void (ret*?, params..)`.
    pub fn function_type(&self, ret: &Type, params: &[Type]) -> FunctionType<'ctx> {
        let mut llvm_params: Vec<BasicMetadataTypeEnum<'ctx>> = vec![];
        if ret.kind != TypeKind::Void {
            llvm_params.push(
                self.llvm_type(ret)
                    .ptr_type(AddressSpace::default())
                    .into(),
            );
        }
        for param in params {
            if param.is_reference || param.is_aggregate() {
                llvm_params.push(
                    self.llvm_type(param)
                        .ptr_type(AddressSpace::default())
                        .into(),
                );
            } else {
                llvm_params.push(self.llvm_type(param).into());
            }
        }
        self.context.void_type().fn_type(&llvm_params, false)
    }

    /// Registers the prototype of a user function in the current namespace.
    pub fn declare_function(
        &mut self,
        stmt: StmtId,
        decl: &FunctionDecl,
    ) -> Option<FunctionDescriptor<'ctx>> {
        let ast = self.ast;
        let name = ast.lexeme(decl.name);
        let namespace = self.env.namespace().to_vec();

        let mut params = vec![];
        for param in decl.params.iter() {
            let ty = self.resolve_type(&param.ty);
            if ty.kind == TypeKind::Void {
                self.report(
                    ErrorImpl::UnsupportedElementType { ty: ty.to_string() },
                    param.name,
                );
                params.push((String::from(ast.lexeme(param.name)), Type::invalid()));
                continue;
            }
            params.push((String::from(ast.lexeme(param.name)), ty));
        }
        let ret = match &decl.ret {
            Some(ret) => self.resolve_type(ret),
            None => Type::void(),
        };

        let is_valid = ret.is_valid && params.iter().all(|(_, ty)| ty.is_valid);
        let qualified = join_path(&namespace, name);

        let llvm = is_valid.then(|| {
            let param_types = params.iter().map(|(_, ty)| ty.clone()).collect::<Vec<_>>();
            self.module.add_function(
                &format!("lang.{}", qualified),
                self.function_type(&ret, &param_types),
                None,
            )
        });

        let descriptor = FunctionDescriptor {
            name: String::from(name),
            namespace: namespace.clone(),
            params,
            ret,
            is_valid,
            body: FunctionBody::Deferred(stmt),
            llvm,
        };

        if let Err(error) = self.env.define_function(&namespace, descriptor.clone()) {
            self.report(error, decl.name);
            return None;
        }

        debug!(name = %qualified, valid = is_valid, "function declared");
        self.functions_by_stmt.insert(stmt, descriptor.clone());
        Some(descriptor)
    }

    /// Generates the body of a function or functor: binds the parameters
    /// into the function's root frame, lowers the body and closes every
    /// path with a return.
    pub fn lower_function_body(
        &mut self,
        descriptor: &FunctionDescriptor<'ctx>,
        llvm: FunctionValue<'ctx>,
        body: StmtId,
        token: TokenId,
    ) {
        let saved = self.builder.get_insert_block();

        let entry = self.context.append_basic_block(llvm, "entry");
        let start = self.context.append_basic_block(llvm, "body");
        self.builder.position_at_end(entry);
        self.builder.build_unconditional_branch(start).unwrap();
        self.builder.position_at_end(start);

        let offset = u32::from(descriptor.has_ret_slot());
        let ret_slot = descriptor
            .has_ret_slot()
            .then(|| llvm.get_nth_param(0))
            .flatten()
            .map(|param| param.into_pointer_value());

        self.env.push_function(
            FunctionContext {
                name: descriptor.qualified_name(),
                returns: Some(descriptor.ret.clone()),
                ret_slot,
                llvm,
                entry,
            },
            descriptor.namespace.clone(),
        );

        for (index, (name, ty)) in descriptor.params.iter().enumerate() {
            let Some(param) = llvm.get_nth_param(index as u32 + offset) else {
                continue;
            };

            let bound = if ty.is_reference {
                Value::storage(ty.clone(), param.into_pointer_value())
            } else {
                let slot = self.entry_alloca(self.llvm_type(ty), name);
                let incoming = if ty.is_aggregate() {
                    Value::storage(ty.clone(), param.into_pointer_value())
                } else {
                    Value::materialized(ty.clone(), param)
                };
                self.copy_storage(slot, &incoming, ty);
                self.register_cleanup(slot, ty);
                Value::storage(ty.clone(), slot)
            };

            if let Err(error) = self.env.define_variable(name, bound) {
                self.report(error, token);
            }
        }

        let flow = gen_statement(self, body);

        if flow != Flow::Returned && descriptor.has_ret_slot() {
            self.report(
                ErrorImpl::MissingReturn {
                    name: descriptor.qualified_name(),
                },
                token,
            );
        }

        self.pop_scope();
        self.builder.build_return(None).unwrap();

        if let Some(saved) = saved {
            self.builder.position_at_end(saved);
        }
    }

    /// Lowers call arguments against parameter types.
    ///
    /// Reference parameters take the address of the argument, aggregates
    /// pass a pointer to their storage, everything else passes by value.
    pub fn lower_call_args(
        &mut self,
        params: &[Type],
        args: &[ExprId],
        token: TokenId,
    ) -> Option<Vec<BasicMetadataValueEnum<'ctx>>> {
        if params.len() != args.len() {
            self.report(
                ErrorImpl::ArgumentCount {
                    expected: params.len(),
                    received: args.len(),
                },
                token,
            );
            return None;
        }

        let mut lowered = vec![];
        let mut is_valid = true;

        for (param, &arg) in params.iter().zip(args.iter()) {
            let value = gen_expression(self, arg, Some(param));
            let arg_token = self.ast.expr(arg).token();
            if !value.is_valid() {
                is_valid = false;
                continue;
            }

            if param.is_reference {
                if !value.ty.is_type_matched(param) {
                    self.report(
                        ErrorImpl::TypeMismatch {
                            expected: param.to_string(),
                            received: value.ty.to_string(),
                        },
                        arg_token,
                    );
                    is_valid = false;
                    continue;
                }
                if value.ty.is_const {
                    self.report(
                        ErrorImpl::ConstAssignment {
                            name: String::from(self.ast.lexeme(arg_token)),
                        },
                        arg_token,
                    );
                    is_valid = false;
                    continue;
                }
                match value.address() {
                    Some(address) => lowered.push(address.into()),
                    None => {
                        self.report(ErrorImpl::NotAssignable, arg_token);
                        is_valid = false;
                    }
                }
                continue;
            }

            let value = self.implicit_cast(&value, param, arg_token);
            if !value.is_valid() {
                is_valid = false;
                continue;
            }

            if param.is_aggregate() {
                match value.address() {
                    Some(address) => lowered.push(address.into()),
                    None => is_valid = false,
                }
            } else {
                match self.materialize(&value) {
                    Some(materialized) => lowered.push(materialized.into()),
                    None => is_valid = false,
                }
            }
        }

        is_valid.then_some(lowered)
    }

    /// Calls a user function or functor pointer with lowered arguments. The
    /// result lives in a return slot owned by the current frame.
    pub fn emit_call(
        &mut self,
        callee: CallTarget<'ctx>,
        ret: &Type,
        args: Vec<BasicMetadataValueEnum<'ctx>>,
    ) -> Value<'ctx> {
        let mut all_args = Vec::with_capacity(args.len() + 1);
        let ret_slot = (ret.kind != TypeKind::Void).then(|| self.temp_slot(ret));
        if let Some(slot) = ret_slot {
            all_args.push(slot.into());
        }
        all_args.extend(args);

        match callee {
            CallTarget::Direct(function) => {
                self.builder.build_call(function, &all_args, "").unwrap();
            }
            CallTarget::Indirect(pointer) => {
                let Ok(callable) = CallableValue::try_from(pointer) else {
                    return Value::invalid();
                };
                self.builder.build_call(callable, &all_args, "").unwrap();
            }
        }

        match ret_slot {
            Some(slot) => Value::storage(ret.clone(), slot),
            None => Value::void(),
        }
    }
}

/// Callee of a lowered call.
pub enum CallTarget<'ctx> {
    Direct(FunctionValue<'ctx>),
    /// Function type and pointer of a functor
    Indirect(PointerValue<'ctx>),
}

/// Size of a struct from the sizes of its members; memoized.
fn struct_size(
    qualified: &str,
    structs: &HashMap<String, &PendingStruct>,
    sizes: &mut HashMap<String, u32>,
) -> u32 {
    if let Some(size) = sizes.get(qualified) {
        return *size;
    }
    let Some(item) = structs.get(qualified) else {
        return 0;
    };
    // Recursive structs are never valid, so this terminates.
    let size = item
        .members
        .iter()
        .map(|(_, ty)| type_size(ty, structs, sizes))
        .sum();
    sizes.insert(String::from(qualified), size);
    size
}

fn type_size(
    ty: &Type,
    structs: &HashMap<String, &PendingStruct>,
    sizes: &mut HashMap<String, u32>,
) -> u32 {
    match ty.kind {
        TypeKind::Struct => struct_size(&ty.name, structs, sizes),
        TypeKind::FixedVec => {
            ty.count
                * ty.inner
                    .first()
                    .map(|element| type_size(element, structs, sizes))
                    .unwrap_or(0)
        }
        TypeKind::Tuple => ty
            .inner
            .iter()
            .map(|item| type_size(item, structs, sizes))
            .sum(),
        _ => ty.size,
    }
}

/// Rebuilds a member type with the final sizes of the structs it holds.
fn with_sizes(ty: &Type, sizes: &HashMap<String, u32>) -> Type {
    let rebuilt = match ty.kind {
        TypeKind::Struct => {
            Type::structure(&ty.name, sizes.get(&ty.name).copied().unwrap_or(ty.size))
        }
        TypeKind::FixedVec => match ty.inner.first() {
            Some(element) => Type::fixed_vec(with_sizes(element, sizes), ty.count),
            None => ty.clone(),
        },
        TypeKind::Tuple => Type::tuple(ty.inner.iter().map(|item| with_sizes(item, sizes)).collect()),
        _ => return ty.clone(),
    };
    rebuilt
        .with_const(ty.is_const)
        .with_reference(ty.is_reference)
}
