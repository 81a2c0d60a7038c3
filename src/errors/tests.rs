//! Unit tests for error handling.
//!
//! This module contains tests for error types and the diagnostic sink.

use crate::errors::diagnostics::Diagnostics;
use crate::errors::errors::{Error, ErrorImpl, ErrorKind, ErrorTip};
use crate::Position;
use std::rc::Rc;

fn position(line: u32) -> Position {
    Position(line, Rc::new("test.lang".to_string()))
}

#[test]
fn test_error_creation() {
    let error = Error::new(
        ErrorImpl::UnknownVariable {
            name: "foo".to_string(),
        },
        position(10),
    );

    assert_eq!(error.get_error_name(), "UnknownVariable");
    assert_eq!(error.kind(), ErrorKind::Resolution);
    assert_eq!(error.get_context(), "<global>");
}

#[test]
fn test_error_position() {
    let error = Error::new(ErrorImpl::BreakOutsideLoop, position(42));

    assert_eq!(error.get_position().0, 42);
    assert_eq!(error.kind(), ErrorKind::ControlFlow);
}

#[test]
fn test_error_context() {
    let error = Error::new(
        ErrorImpl::MissingReturn {
            name: "area".to_string(),
        },
        position(3),
    )
    .with_context("geo::area");

    assert_eq!(error.get_context(), "geo::area");
    assert_eq!(
        error.to_string(),
        "test.lang:3 [geo::area] control-flow error: function \"area\" does not return a value on every path"
    );
}

#[test]
fn test_type_mismatch_error() {
    let error = Error::new(
        ErrorImpl::TypeMismatch {
            expected: "i32".to_string(),
            received: "string".to_string(),
        },
        position(0),
    );

    assert_eq!(error.get_error_name(), "TypeMismatch");
    assert_eq!(error.kind(), ErrorKind::TypeMismatch);
    match error.get_tip() {
        ErrorTip::Suggestion(tip) => assert_eq!(tip, "Expected type `i32`, received `string`"),
        ErrorTip::None => panic!("expected a suggestion"),
    }
}

#[test]
fn test_float_equality_is_type_error() {
    let error = Error::new(ErrorImpl::FloatEquality, position(0));

    assert_eq!(error.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn test_structural_errors() {
    let errors = [
        ErrorImpl::ArgumentCount {
            expected: 2,
            received: 1,
        },
        ErrorImpl::DuplicateDefinition {
            name: "x".to_string(),
        },
        ErrorImpl::MalformedContainer {
            reason: "mixed element types".to_string(),
        },
        ErrorImpl::IndexOutOfBounds {
            index: 4,
            length: 4,
        },
    ];

    for error in errors {
        assert_eq!(Error::new(error, position(0)).kind(), ErrorKind::Structural);
    }
}

#[test]
fn test_tip_display() {
    let error = Error::new(ErrorImpl::InvalidOperands {
        op: "+".to_string(),
        left: "bool".to_string(),
        right: "i32".to_string(),
    }, position(0));

    assert_eq!(error.get_tip().to_string(), "");
}

#[test]
fn test_diagnostics_cap() {
    let mut diagnostics = Diagnostics::new(10);

    for line in 0..15 {
        diagnostics.report(Error::new(ErrorImpl::BreakOutsideLoop, position(line)));
    }

    assert_eq!(diagnostics.len(), 11);
    assert!(diagnostics.is_saturated());
    assert_eq!(
        diagnostics.records()[10].get_error_name(),
        "ErrorLimitExceeded"
    );
    assert_eq!(diagnostics.count_kind(ErrorKind::Limit), 1);
}

#[test]
fn test_diagnostics_under_cap() {
    let mut diagnostics = Diagnostics::new(3);

    diagnostics.report(Error::new(ErrorImpl::ContinueOutsideLoop, position(1)));
    diagnostics.report(Error::new(ErrorImpl::ReturnOutsideFunction, position(2)));

    assert_eq!(diagnostics.len(), 2);
    assert!(!diagnostics.is_saturated());
    assert_eq!(diagnostics.count_kind(ErrorKind::ControlFlow), 2);
}

#[test]
fn test_diagnostics_default_limit() {
    let mut diagnostics = Diagnostics::default();

    for line in 0..10 {
        diagnostics.report(Error::new(ErrorImpl::NotAssignable, position(line)));
    }

    assert!(!diagnostics.is_saturated());
    diagnostics.report(Error::new(ErrorImpl::NotAssignable, position(11)));
    assert!(diagnostics.is_saturated());
}
