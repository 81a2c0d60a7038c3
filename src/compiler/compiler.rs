//! Main compiler module.
//!
//! Holds the `Compiler` structure and the two-pass pipeline lowering a
//! syntax tree into an LLVM module: pass one registers struct layouts and
//! function prototypes, pass two generates `main` and every function body.

use std::collections::HashMap;

use inkwell::{
    basic_block::BasicBlock,
    builder::Builder,
    context::Context,
    module::Module,
    types::{BasicType, BasicTypeEnum, StructType},
    values::{BasicValueEnum, FunctionValue, PointerValue},
};
use tracing::{debug, trace};

use crate::{
    ast::{
        ast::{Ast, StmtId, TokenId},
        statements::Stmt,
        types::TypeExpr,
    },
    errors::{
        diagnostics::Diagnostics,
        errors::{Error, ErrorImpl},
    },
    types::types::{Type, TypeKind},
};

use super::{
    aggregates::FunctionDescriptor,
    builtins::register_builtins,
    context::CompilationContext,
    environment::{join_path, Environment, FunctionContext, OwnedResource},
    options::CompileOptions,
    runtime_abi::RuntimeFn,
    stmt::gen_statement,
    value::{zero_value, Value},
};

/// Name of the generated function registering enum names with the runtime.
pub const INIT_ENUMS: &str = "__init_enums";

/// Label used as diagnostic context outside any function.
pub const GLOBAL_CONTEXT: &str = "<global>";

/// The state of one compilation.
///
/// # Lifetimes
///
/// * `'a` - Borrow of the syntax tree and the compilation context
/// * `'ctx` - Lifetime of the LLVM context
pub struct Compiler<'a, 'ctx> {
    /// Options, diagnostics and enum table of this compilation
    pub ctx: &'a mut CompilationContext,
    /// The syntax tree being lowered
    pub ast: &'a Ast,
    /// Scope frames with every visible definition
    pub env: Environment<'ctx>,

    /// LLVM struct types by fully qualified struct name
    pub named_structs: HashMap<String, StructType<'ctx>>,
    /// Prototypes of user functions by declaring statement
    pub functions_by_stmt: HashMap<StmtId, FunctionDescriptor<'ctx>>,
    /// Number of functors generated so far
    pub functor_count: u32,

    /// Reference to the LLVM context
    pub context: &'ctx Context,
    /// The LLVM module being built
    pub module: Module<'ctx>,
    /// The LLVM IR builder
    pub builder: Builder<'ctx>,
}

impl<'a, 'ctx> Compiler<'a, 'ctx> {
    pub fn new(ast: &'a Ast, ctx: &'a mut CompilationContext, context: &'ctx Context) -> Self {
        Compiler {
            env: Environment::new(ctx.options.external_namespaces.clone(), None),
            module: context.create_module(&ctx.options.module_name),
            builder: context.create_builder(),
            named_structs: HashMap::new(),
            functions_by_stmt: HashMap::new(),
            functor_count: 0,
            context,
            ast,
            ctx,
        }
    }

    fn context_label(&self) -> String {
        self.env
            .function()
            .map(|function| function.name.clone())
            .unwrap_or_else(|| String::from(GLOBAL_CONTEXT))
    }

    /// Reports a diagnostic attributed to a token.
    pub fn report(&mut self, error: ErrorImpl, token: TokenId) {
        let position = self.ast.get_token(token).position();
        let context = self.context_label();
        self.ctx
            .diagnostics
            .report(Error::new(error, position).with_context(&context));
    }

    /// Reports an already positioned error.
    pub fn report_error(&mut self, error: Error) {
        let context = self.context_label();
        self.ctx.diagnostics.report(error.with_context(&context));
    }

    pub fn is_saturated(&self) -> bool {
        self.ctx.diagnostics.is_saturated()
    }

    /// Builds a type descriptor from an annotation. Failures are reported
    /// and give an invalid type.
    pub fn resolve_type(&mut self, expr: &TypeExpr) -> Type {
        let resolved = {
            let env = &self.env;
            let resolve_struct = |name: &str| {
                env.get_struct(name)
                    .filter(|descriptor| descriptor.is_valid)
                    .map(|descriptor| (descriptor.qualified_name(), descriptor.size))
            };
            Type::from_syntax(expr, self.ast, &resolve_struct)
        };

        match resolved {
            Ok(ty) => ty,
            Err(error) => {
                self.report_error(error);
                Type::invalid()
            }
        }
    }

    /// Converts a type descriptor to its LLVM storage type.
    ///
    /// Every handle kind is an opaque `i8*`; fixed vectors are arrays and
    /// tuples are literal structs. Types without storage map to `i8`.
    pub fn llvm_type(&self, ty: &Type) -> BasicTypeEnum<'ctx> {
        match ty.kind {
            TypeKind::Int16 => self.context.i16_type().into(),
            TypeKind::Int32 | TypeKind::Enum => self.context.i32_type().into(),
            TypeKind::Int64 => self.context.i64_type().into(),
            TypeKind::Float32 => self.context.f32_type().into(),
            TypeKind::Float64 => self.context.f64_type().into(),
            TypeKind::Bool => self.context.bool_type().into(),
            TypeKind::String
            | TypeKind::Pointer
            | TypeKind::DynVec
            | TypeKind::Set
            | TypeKind::Map
            | TypeKind::Closure => self.handle_type().into(),
            TypeKind::FixedVec => match ty.inner.first() {
                Some(element) => self.llvm_type(element).array_type(ty.count).into(),
                None => self.context.i8_type().into(),
            },
            TypeKind::Tuple => {
                let fields = ty
                    .inner
                    .iter()
                    .map(|item| self.llvm_type(item))
                    .collect::<Vec<BasicTypeEnum<'ctx>>>();
                self.context.struct_type(&fields, false).into()
            }
            TypeKind::Struct => match self.named_structs.get(&ty.name) {
                Some(struct_type) => (*struct_type).into(),
                None => self.context.i8_type().into(),
            },
            TypeKind::Invalid | TypeKind::Void => self.context.i8_type().into(),
        }
    }

    /// Creates a zero-initialised stack slot in the entry block of the
    /// current function.
    pub fn entry_alloca(&self, ty: BasicTypeEnum<'ctx>, name: &str) -> PointerValue<'ctx> {
        let builder = self.context.create_builder();
        let entry = match self.env.function() {
            Some(function) => function.entry,
            None => match self.builder.get_insert_block() {
                Some(block) => block,
                None => unreachable!("no function to allocate in"),
            },
        };

        match entry.get_terminator() {
            Some(terminator) => builder.position_before(&terminator),
            None => builder.position_at_end(entry),
        }

        let slot = builder.build_alloca(ty, name).unwrap();
        builder.build_store(slot, zero_value(ty)).unwrap();
        slot
    }

    /// Storage for a variable declared in the current frame: a global in
    /// the global frame, a stack slot anywhere else.
    pub fn variable_slot(&self, ty: &Type, name: &str) -> PointerValue<'ctx> {
        let llvm_type = self.llvm_type(ty);

        if !self.env.is_global() {
            return self.entry_alloca(llvm_type, name);
        }

        let qualified = join_path(self.env.namespace(), name);
        let global = self
            .module
            .add_global(llvm_type, None, &format!("global.{}", qualified));
        global.set_initializer(&zero_value(llvm_type));
        global.as_pointer_value()
    }

    /// Registers a slot with the current frame when its type owns heap
    /// resources.
    pub fn register_cleanup(&mut self, slot: PointerValue<'ctx>, ty: &Type) {
        if self.needs_cleanup(ty) {
            self.env
                .register_cleanup(OwnedResource::new(slot, ty.clone()));
        }
    }

    /// Stores a freshly owned handle into a slot, releasing what the slot
    /// held before.
    pub fn store_handle(&self, slot: PointerValue<'ctx>, handle: BasicValueEnum<'ctx>, ty: &Type) {
        self.release_storage(slot, ty);
        self.builder.build_store(slot, handle).unwrap();
    }

    /// Wraps a freshly owned handle into a temporary slot owned by the
    /// current frame.
    pub fn owned_temp(&mut self, ty: Type, handle: BasicValueEnum<'ctx>) -> Value<'ctx> {
        let slot = self.entry_alloca(self.handle_type().into(), "tmp");
        self.store_handle(slot, handle, &ty);
        self.register_cleanup(slot, &ty);
        Value::storage(ty, slot)
    }

    /// Zeroed temporary storage for a value of any type, owned by the
    /// current frame.
    pub fn temp_slot(&mut self, ty: &Type) -> PointerValue<'ctx> {
        let slot = self.entry_alloca(self.llvm_type(ty), "tmp");
        self.register_cleanup(slot, ty);
        slot
    }

    pub fn push_scope(&mut self) {
        self.env.push();
    }

    /// Releases the top frame's resources, then pops it. The global frame
    /// is released but stays on the stack.
    pub fn pop_scope(&mut self) {
        for resource in self.env.take_cleanup() {
            resource.release(self);
        }
        self.env.pop();
    }

    /// Releases the resources of the given frames without popping them; used
    /// by `break`, `continue` and `return`.
    pub fn release_frames(&self, frames: &[usize]) {
        for &index in frames {
            for resource in self.env.frame(index).cleanup.iter() {
                resource.release_on_exit(self);
            }
        }
    }

    pub fn current_function(&self) -> Option<FunctionValue<'ctx>> {
        self.builder
            .get_insert_block()
            .and_then(|block| block.get_parent())
    }

    pub fn append_block(&self, name: &str) -> BasicBlock<'ctx> {
        match self.current_function() {
            Some(function) => self.context.append_basic_block(function, name),
            None => unreachable!("builder is not positioned inside a function"),
        }
    }

    /// Whether the block the builder is in already ends in a terminator.
    pub fn is_terminated(&self) -> bool {
        self.builder
            .get_insert_block()
            .and_then(|block| block.get_terminator())
            .is_some()
    }

    /// Branches to `target` unless the current block already terminated.
    pub fn branch_to(&self, target: BasicBlock<'ctx>) {
        if !self.is_terminated() {
            self.builder.build_unconditional_branch(target).unwrap();
        }
    }

    /// Opens an unreachable block for code following a terminator.
    pub fn open_dead_tail(&self) {
        let dead = self.append_block("dead");
        self.builder.position_at_end(dead);
    }

    /// Registers struct layouts and function prototypes of a statement
    /// list, recursing into namespaces.
    fn collect_declarations(
        &mut self,
        statements: &[StmtId],
        structs: &mut Vec<(Vec<String>, StmtId)>,
        functions: &mut Vec<(Vec<String>, StmtId)>,
    ) {
        let ast = self.ast;

        for &id in statements {
            match ast.stmt(id) {
                Stmt::StructDecl { name, .. } => {
                    self.declare_struct(*name);
                    structs.push((self.env.namespace().to_vec(), id));
                }
                Stmt::Function(_) => functions.push((self.env.namespace().to_vec(), id)),
                Stmt::Namespace { name, body } => {
                    self.env.push_namespace(ast.lexeme(*name));
                    self.collect_declarations(body, structs, functions);
                    self.env.pop_namespace();
                }
                _ => {}
            }
        }
    }

    /// Pass one: structs are created opaque, then resolved, then every
    /// function prototype is declared.
    fn declare_pass(&mut self) {
        let ast = self.ast;
        let mut structs = vec![];
        let mut functions = vec![];

        self.collect_declarations(&ast.root, &mut structs, &mut functions);
        self.resolve_structs(&structs);

        for (namespace, id) in functions {
            if let Stmt::Function(decl) = ast.stmt(id) {
                let previous = self.env.set_namespace(namespace);
                self.declare_function(id, decl);
                self.env.set_namespace(previous);
            }
        }

        debug!(
            structs = self.named_structs.len(),
            functions = self.functions_by_stmt.len(),
            "declarations registered"
        );
    }

    /// Pass two: lowers the top level into `main`.
    fn generate_pass(&mut self) {
        let ast = self.ast;

        let main = self
            .module
            .add_function("main", self.context.i32_type().fn_type(&[], false), None);
        let entry = self.context.append_basic_block(main, "entry");
        let body = self.context.append_basic_block(main, "body");
        self.builder.position_at_end(entry);
        self.builder.build_unconditional_branch(body).unwrap();
        self.builder.position_at_end(body);

        self.env.set_main(FunctionContext {
            name: String::from(GLOBAL_CONTEXT),
            returns: None,
            ret_slot: None,
            llvm: main,
            entry,
        });

        let init_enums = self
            .module
            .add_function(INIT_ENUMS, self.context.void_type().fn_type(&[], false), None);
        self.builder.build_call(init_enums, &[], "").unwrap();

        for &id in ast.root.iter() {
            if self.is_saturated() {
                debug!("diagnostic limit reached, stopping");
                break;
            }
            gen_statement(self, id);
        }

        self.pop_scope();
        self.builder
            .build_return(Some(&self.context.i32_type().const_zero()))
            .unwrap();

        self.fill_init_enums(init_enums);
    }

    fn fill_init_enums(&self, function: FunctionValue<'ctx>) {
        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);

        for (id, name) in self.ctx.enums.iter() {
            let text = self
                .builder
                .build_global_string_ptr(name, "enum")
                .unwrap()
                .as_pointer_value();
            self.call_rt(
                RuntimeFn::EnumRegister,
                &[
                    self.context.i32_type().const_int(id as u64, true).into(),
                    text.into(),
                ],
            );
        }

        self.builder.build_return(None).unwrap();
    }

    fn run(&mut self) {
        register_builtins(self);
        self.declare_pass();
        if !self.is_saturated() {
            self.generate_pass();
        }
        trace!(ir = %self.module.print_to_string().to_string_lossy(), "generated module");
    }
}

/// Compiles a syntax tree into an LLVM module.
///
/// No module is produced once any diagnostic exists; the diagnostics are
/// returned instead, in the order they were reported.
///
/// # Arguments
///
/// * `ast` - The syntax tree, with its top-level statements in `ast.root`
/// * `context` - The LLVM context owning every generated type and value
/// * `options` - Module naming, error limit and verification settings
pub fn compile<'ctx>(
    ast: &Ast,
    context: &'ctx Context,
    options: CompileOptions,
) -> Result<Module<'ctx>, Diagnostics> {
    let verify = options.verify;
    let mut ctx = CompilationContext::new(options);

    let module = {
        let mut compiler = Compiler::new(ast, &mut ctx, context);
        compiler.run();
        compiler.module
    };

    if verify && ctx.diagnostics.is_empty() {
        if let Err(message) = module.verify() {
            ctx.diagnostics.report(Error::new(
                ErrorImpl::Internal {
                    message: message.to_string(),
                },
                crate::Position(0, ast.file().clone()),
            ));
        }
    }

    if ctx.diagnostics.is_empty() {
        debug!(module = %ctx.options.module_name, "compilation succeeded");
        Ok(module)
    } else {
        debug!(errors = ctx.diagnostics.len(), "compilation failed");
        Err(ctx.diagnostics)
    }
}
