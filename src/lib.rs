#![allow(clippy::module_inception)]

use std::{fs, path::Path, rc::Rc, sync::Once};

use crate::errors::{diagnostics::Diagnostics, errors::ErrorTip};

pub mod ast;
pub mod compiler;
pub mod errors;
pub mod runtime;
pub mod types;

extern crate regex;

pub use crate::compiler::{compiler::compile, options::CompileOptions};

/// Source position: line number and file name.
#[derive(Debug, Clone, PartialEq)]
pub struct Position(pub u32, pub Rc<String>);

impl Position {
    pub fn null() -> Self {
        Position(0, Rc::new(String::from("<null>")))
    }
}

static TRACING_INIT: Once = Once::new();

/// Installs a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Does nothing when `RUST_LOG` is unset; safe to call more than once.
/// `RUST_LOG=semantic_backend=trace` shows scope and slot bookkeeping.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let _ = tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(EnvFilter::from_default_env())
                .try_init();
        }
    });
}

/// Text of a 1-based line of a file, without its line break.
pub fn get_line_at_position(file: &Path, line: u32) -> Option<String> {
    let content = fs::read_to_string(file).ok()?;
    let index = usize::try_from(line).ok()?.checked_sub(1)?;
    content
        .lines()
        .nth(index)
        .map(|text| String::from(text.trim_end_matches('\r')))
}

/// Renders every diagnostic of a failed compilation.
/*
    test.lang:20 [geo::area] type error: expected i32, got string (tip)
       |
    20 | return name;
       |
*/
pub fn render_diagnostics(diagnostics: &Diagnostics) -> String {
    let mut rendered = String::new();

    for error in diagnostics.iter() {
        match error.get_tip() {
            ErrorTip::None => rendered.push_str(&format!("{}\n", error)),
            tip => rendered.push_str(&format!("{} ({})\n", error, tip)),
        }

        let position = error.get_position();
        if let Some(text) = get_line_at_position(Path::new(position.1.as_str()), position.0) {
            let line = position.0.to_string();
            let padding = line.len() + 2;
            rendered.push_str(&format!("{:>padding$}\n", "|"));
            rendered.push_str(&format!("{} | {}\n", line, text.trim()));
            rendered.push_str(&format!("{:>padding$}\n", "|"));
        }
    }

    rendered
}

pub fn display_diagnostics(diagnostics: &Diagnostics) {
    eprint!("{}", render_diagnostics(diagnostics));
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pretty_assertions::assert_eq;

    use crate::{
        errors::{
            diagnostics::Diagnostics,
            errors::{Error, ErrorImpl},
        },
        Position,
    };

    #[test]
    fn test_get_line_at_position() {
        let file = Path::new("tests/test_file.txt");
        assert_eq!(
            super::get_line_at_position(file, 1),
            Some(String::from("Hello, world!"))
        );
        assert_eq!(
            super::get_line_at_position(file, 4),
            Some(String::from("Testing { }"))
        );
        assert_eq!(super::get_line_at_position(file, 0), None);
        assert_eq!(super::get_line_at_position(file, 99), None);
        assert_eq!(
            super::get_line_at_position(Path::new("tests/missing.txt"), 1),
            None
        );
    }

    #[test]
    fn test_render_diagnostics_with_source_line() {
        let mut diagnostics = Diagnostics::new(10);
        diagnostics.report(Error::new(
            ErrorImpl::UnknownVariable {
                name: String::from("x"),
            },
            Position(4, std::rc::Rc::new(String::from("tests/test_file.txt"))),
        ));

        let rendered = super::render_diagnostics(&diagnostics);
        assert!(rendered.starts_with("tests/test_file.txt:4 [<global>]"));
        assert!(rendered.contains("4 | Testing { }"));
    }

    #[test]
    fn test_render_diagnostics_without_source() {
        let mut diagnostics = Diagnostics::new(10);
        diagnostics.report(Error::new(ErrorImpl::BreakOutsideLoop, Position::null()));

        let rendered = super::render_diagnostics(&diagnostics);
        assert_eq!(rendered.lines().count(), 1);
    }
}
