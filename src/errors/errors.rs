use std::fmt::Display;

use thiserror::Error;

use crate::Position;

/// Broad category of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operand kinds incompatible for an operation or cast
    TypeMismatch,
    /// Unknown variable, function, struct, member or type
    Resolution,
    /// Argument counts, duplicates, malformed literals, constant bounds
    Structural,
    /// `break`, `continue` or `return` in the wrong place, missing returns
    ControlFlow,
    Limit,
    Internal,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::TypeMismatch => "type error",
            ErrorKind::Resolution => "resolution error",
            ErrorKind::Structural => "structural error",
            ErrorKind::ControlFlow => "control-flow error",
            ErrorKind::Limit => "limit",
            ErrorKind::Internal => "internal error",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct Error {
    internal_error: ErrorImpl,
    position: Position,
    context: String,
}

impl Error {
    pub fn new(error_impl: ErrorImpl, position: Position) -> Self {
        Error {
            internal_error: error_impl,
            position,
            context: String::from("<global>"),
        }
    }

    /// Attaches the context label, usually the enclosing function.
    pub fn with_context(mut self, context: &str) -> Self {
        self.context = String::from(context);
        self
    }

    pub fn get_position(&self) -> &Position {
        &self.position
    }

    pub fn get_context(&self) -> &str {
        &self.context
    }

    pub fn get_impl(&self) -> &ErrorImpl {
        &self.internal_error
    }

    pub fn kind(&self) -> ErrorKind {
        match &self.internal_error {
            ErrorImpl::TypeMismatch { .. }
            | ErrorImpl::InvalidOperands { .. }
            | ErrorImpl::InvalidCast { .. }
            | ErrorImpl::FloatEquality
            | ErrorImpl::InvalidKeyType { .. }
            | ErrorImpl::UnsupportedElementType { .. }
            | ErrorImpl::ContainerAppend
            | ErrorImpl::NotCallable { .. }
            | ErrorImpl::NotIterable { .. }
            | ErrorImpl::NotIndexable { .. }
            | ErrorImpl::ReturnTypeMismatch { .. } => ErrorKind::TypeMismatch,
            ErrorImpl::UnknownVariable { .. }
            | ErrorImpl::UnknownFunction { .. }
            | ErrorImpl::UnknownStruct { .. }
            | ErrorImpl::UnknownMember { .. }
            | ErrorImpl::UnknownType { .. } => ErrorKind::Resolution,
            ErrorImpl::ArgumentCount { .. }
            | ErrorImpl::DuplicateDefinition { .. }
            | ErrorImpl::InvalidName { .. }
            | ErrorImpl::MalformedContainer { .. }
            | ErrorImpl::IndexOutOfBounds { .. }
            | ErrorImpl::MissingTypeArguments { .. }
            | ErrorImpl::TypeArgumentCount { .. }
            | ErrorImpl::EmptyStruct { .. }
            | ErrorImpl::RecursiveStruct { .. }
            | ErrorImpl::ConstAssignment { .. }
            | ErrorImpl::NotAssignable
            | ErrorImpl::ExpectedExplicitValue => ErrorKind::Structural,
            ErrorImpl::BreakOutsideLoop
            | ErrorImpl::ContinueOutsideLoop
            | ErrorImpl::ReturnOutsideFunction
            | ErrorImpl::MissingReturn { .. } => ErrorKind::ControlFlow,
            ErrorImpl::ErrorLimitExceeded { .. } => ErrorKind::Limit,
            ErrorImpl::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn get_error_name(&self) -> &str {
        match &self.internal_error {
            ErrorImpl::TypeMismatch { .. } => "TypeMismatch",
            ErrorImpl::InvalidOperands { .. } => "InvalidOperands",
            ErrorImpl::InvalidCast { .. } => "InvalidCast",
            ErrorImpl::FloatEquality => "FloatEquality",
            ErrorImpl::UnknownVariable { .. } => "UnknownVariable",
            ErrorImpl::UnknownFunction { .. } => "UnknownFunction",
            ErrorImpl::UnknownStruct { .. } => "UnknownStruct",
            ErrorImpl::UnknownMember { .. } => "UnknownMember",
            ErrorImpl::UnknownType { .. } => "UnknownType",
            ErrorImpl::ArgumentCount { .. } => "ArgumentCount",
            ErrorImpl::DuplicateDefinition { .. } => "DuplicateDefinition",
            ErrorImpl::InvalidName { .. } => "InvalidName",
            ErrorImpl::MalformedContainer { .. } => "MalformedContainer",
            ErrorImpl::IndexOutOfBounds { .. } => "IndexOutOfBounds",
            ErrorImpl::MissingTypeArguments { .. } => "MissingTypeArguments",
            ErrorImpl::TypeArgumentCount { .. } => "TypeArgumentCount",
            ErrorImpl::InvalidKeyType { .. } => "InvalidKeyType",
            ErrorImpl::EmptyStruct { .. } => "EmptyStruct",
            ErrorImpl::RecursiveStruct { .. } => "RecursiveStruct",
            ErrorImpl::UnsupportedElementType { .. } => "UnsupportedElementType",
            ErrorImpl::ContainerAppend => "ContainerAppend",
            ErrorImpl::ConstAssignment { .. } => "ConstAssignment",
            ErrorImpl::NotAssignable => "NotAssignable",
            ErrorImpl::NotCallable { .. } => "NotCallable",
            ErrorImpl::NotIterable { .. } => "NotIterable",
            ErrorImpl::NotIndexable { .. } => "NotIndexable",
            ErrorImpl::BreakOutsideLoop => "BreakOutsideLoop",
            ErrorImpl::ContinueOutsideLoop => "ContinueOutsideLoop",
            ErrorImpl::ReturnOutsideFunction => "ReturnOutsideFunction",
            ErrorImpl::MissingReturn { .. } => "MissingReturn",
            ErrorImpl::ReturnTypeMismatch { .. } => "ReturnTypeMismatch",
            ErrorImpl::ExpectedExplicitValue => "ExpectedExplicitValue",
            ErrorImpl::ErrorLimitExceeded { .. } => "ErrorLimitExceeded",
            ErrorImpl::Internal { .. } => "Internal",
        }
    }

    pub fn get_tip(&self) -> ErrorTip {
        match &self.internal_error {
            ErrorImpl::TypeMismatch { expected, received } => ErrorTip::Suggestion(format!(
                "Expected type `{}`, received `{}`",
                expected, received
            )),
            ErrorImpl::InvalidOperands { .. } => ErrorTip::None,
            ErrorImpl::InvalidCast { from, to } => ErrorTip::Suggestion(format!(
                "There is no conversion from `{}` to `{}`",
                from, to
            )),
            ErrorImpl::FloatEquality => ErrorTip::Suggestion(String::from(
                "Compare floats with `~=`, exact float equality is unreliable",
            )),
            ErrorImpl::UnknownVariable { name } => {
                ErrorTip::Suggestion(format!("Variable `{}` not declared", name))
            }
            ErrorImpl::UnknownFunction { name } => {
                ErrorTip::Suggestion(format!("Function `{}` not declared", name))
            }
            ErrorImpl::UnknownStruct { name } => {
                ErrorTip::Suggestion(format!("Struct `{}` not declared", name))
            }
            ErrorImpl::UnknownMember { .. } => ErrorTip::None,
            ErrorImpl::UnknownType { name } => {
                ErrorTip::Suggestion(format!("Unknown type `{}` found", name))
            }
            ErrorImpl::ArgumentCount { expected, received } => ErrorTip::Suggestion(format!(
                "Expected {} arguments, received {}",
                expected, received
            )),
            ErrorImpl::DuplicateDefinition { name } => ErrorTip::Suggestion(format!(
                "`{}` is already defined in this namespace",
                name
            )),
            ErrorImpl::InvalidName { .. } => ErrorTip::Suggestion(String::from(
                "Definitions cannot contain `::` or be named `_`",
            )),
            ErrorImpl::MalformedContainer { .. } => ErrorTip::Suggestion(String::from(
                "Every element of a container literal must have the same type",
            )),
            ErrorImpl::IndexOutOfBounds { .. } => ErrorTip::None,
            ErrorImpl::MissingTypeArguments { name } => {
                ErrorTip::Suggestion(format!("`{}` needs type arguments, e.g. `{}<i32>`", name, name))
            }
            ErrorImpl::TypeArgumentCount { .. } => ErrorTip::None,
            ErrorImpl::InvalidKeyType { .. } => ErrorTip::Suggestion(String::from(
                "Set and map keys must be integers, strings or enums",
            )),
            ErrorImpl::EmptyStruct { .. } => ErrorTip::None,
            ErrorImpl::RecursiveStruct { .. } => ErrorTip::Suggestion(String::from(
                "A struct cannot contain itself by value",
            )),
            ErrorImpl::UnsupportedElementType { .. } => ErrorTip::Suggestion(String::from(
                "Dynamic containers hold numbers, bools, enums and strings",
            )),
            ErrorImpl::ContainerAppend => ErrorTip::Suggestion(String::from(
                "Use `vec::replace` to copy one container into another",
            )),
            ErrorImpl::ConstAssignment { name } => {
                ErrorTip::Suggestion(format!("`{}` is declared const", name))
            }
            ErrorImpl::NotAssignable => ErrorTip::None,
            ErrorImpl::NotCallable { .. } => ErrorTip::None,
            ErrorImpl::NotIterable { .. } => ErrorTip::None,
            ErrorImpl::NotIndexable { .. } => ErrorTip::None,
            ErrorImpl::BreakOutsideLoop | ErrorImpl::ContinueOutsideLoop => {
                ErrorTip::Suggestion(String::from("Only valid inside a loop body"))
            }
            ErrorImpl::ReturnOutsideFunction => {
                ErrorTip::Suggestion(String::from("Only valid inside a function body"))
            }
            ErrorImpl::MissingReturn { name } => ErrorTip::Suggestion(format!(
                "Not every path through `{}` returns a value",
                name
            )),
            ErrorImpl::ReturnTypeMismatch { expected, received } => ErrorTip::Suggestion(
                format!("Expected return type `{}`, received `{}`", expected, received),
            ),
            ErrorImpl::ExpectedExplicitValue => ErrorTip::Suggestion(String::from(
                "Expected explicit value when no type is given",
            )),
            ErrorImpl::ErrorLimitExceeded { .. } => ErrorTip::None,
            ErrorImpl::Internal { .. } => ErrorTip::Suggestion(String::from(
                "This is a compiler bug, the generated module did not verify",
            )),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} [{}] {}: {}",
            self.position.1, self.position.0, self.context, self.kind(), self.internal_error
        )
    }
}

pub enum ErrorTip {
    None,
    Suggestion(String),
}

impl Display for ErrorTip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorTip::None => write!(f, ""),
            ErrorTip::Suggestion(suggestion) => write!(f, "{}", suggestion),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ErrorImpl {
    #[error("types do not match: expected {expected}, received {received}")]
    TypeMismatch { expected: String, received: String },
    #[error("invalid operands to `{op}`: {left} and {right}")]
    InvalidOperands {
        op: String,
        left: String,
        right: String,
    },
    #[error("cannot cast {from} to {to}")]
    InvalidCast { from: String, to: String },
    #[error("exact equality on floating point values is not allowed")]
    FloatEquality,
    #[error("variable {name:?} not declared")]
    UnknownVariable { name: String },
    #[error("function {name:?} not declared")]
    UnknownFunction { name: String },
    #[error("struct {name:?} not declared")]
    UnknownStruct { name: String },
    #[error("{ty} has no member {member:?}")]
    UnknownMember { ty: String, member: String },
    #[error("unknown type {name}")]
    UnknownType { name: String },
    #[error("wrong number of arguments: expected {expected}, received {received}")]
    ArgumentCount { expected: usize, received: usize },
    #[error("{name:?} already defined")]
    DuplicateDefinition { name: String },
    #[error("{name:?} is not a valid definition name")]
    InvalidName { name: String },
    #[error("malformed container literal: {reason}")]
    MalformedContainer { reason: String },
    #[error("index {index} out of bounds for length {length}")]
    IndexOutOfBounds { index: i64, length: u32 },
    #[error("type {name} requires type arguments")]
    MissingTypeArguments { name: String },
    #[error("type {name} takes {expected} type arguments, received {received}")]
    TypeArgumentCount {
        name: String,
        expected: usize,
        received: usize,
    },
    #[error("{ty} cannot be used as a key")]
    InvalidKeyType { ty: String },
    #[error("struct {name:?} has no valid members")]
    EmptyStruct { name: String },
    #[error("struct {name:?} contains itself")]
    RecursiveStruct { name: String },
    #[error("{ty} cannot be stored in a dynamic container")]
    UnsupportedElementType { ty: String },
    #[error("cannot append a container to a container")]
    ContainerAppend,
    #[error("cannot assign to const {name:?}")]
    ConstAssignment { name: String },
    #[error("expression is not assignable")]
    NotAssignable,
    #[error("{ty} is not callable")]
    NotCallable { ty: String },
    #[error("{ty} is not iterable")]
    NotIterable { ty: String },
    #[error("{ty} cannot be indexed")]
    NotIndexable { ty: String },
    #[error("break outside of a loop")]
    BreakOutsideLoop,
    #[error("continue outside of a loop")]
    ContinueOutsideLoop,
    #[error("return outside of a function")]
    ReturnOutsideFunction,
    #[error("function {name:?} does not return a value on every path")]
    MissingReturn { name: String },
    #[error("return type mismatch: expected {expected}, received {received}")]
    ReturnTypeMismatch { expected: String, received: String },
    #[error("expected explicit value when no type is given")]
    ExpectedExplicitValue,
    #[error("error limit of {limit} exceeded")]
    ErrorLimitExceeded { limit: usize },
    #[error("internal error: {message}")]
    Internal { message: String },
}
