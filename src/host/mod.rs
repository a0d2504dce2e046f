//! Interfaces the debug engine expects from the script host: source lines,
//! call stack, variable storage and a few process level controls.

pub mod value;

use crate::debugger::breakpoint::Breakpoint;
use crate::debugger::Error;
use std::path::{Path, PathBuf};
pub use value::{Facets, Key, Object, ObjectRef, Value, Variable};

/// Index of a line in [`SourceRegistry::lines`].
pub type LineId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Statement,
    Else,
    BlockBegin { function_body: bool },
    BlockEnd { function_end: bool },
}

impl LineKind {
    /// Whether a breakpoint may be attached to a line of this kind.
    pub fn is_bindable(self) -> bool {
        !matches!(
            self,
            LineKind::Else
                | LineKind::BlockBegin {
                    function_body: false
                }
        )
    }

    /// Whether stepping may halt on a line of this kind. Function ends stay
    /// steppable so that locals can be inspected right before a return.
    pub fn is_steppable(self) -> bool {
        matches!(
            self,
            LineKind::Statement
                | LineKind::BlockEnd {
                    function_end: true
                }
        )
    }
}

#[derive(Debug, Clone)]
pub struct SourceLine {
    pub file_index: usize,
    /// 1-based line number, 0 for lines injected by the host.
    pub line_number: u32,
    pub kind: LineKind,
    pub breakpoint: Option<Breakpoint>,
}

impl SourceLine {
    pub fn new(file_index: usize, line_number: u32, kind: LineKind) -> Self {
        Self {
            file_index,
            line_number,
            kind,
            breakpoint: None,
        }
    }
}

pub trait SourceRegistry {
    /// All registered source files, index is the file index.
    fn source_files(&self) -> &[PathBuf];

    /// All source lines in load order.
    fn lines(&self) -> &[SourceLine];

    fn lines_mut(&mut self) -> &mut [SourceLine];

    /// Static initializer lines in the order they run.
    fn static_init_lines(&self) -> &[LineId] {
        &[]
    }

    /// Resolve a path to a registered file index, paths compare case-insensitively.
    fn file_index(&self, path: &Path) -> Option<usize> {
        let wanted = path.to_string_lossy().to_lowercase();
        self.source_files()
            .iter()
            .position(|p| p.to_string_lossy().to_lowercase() == wanted)
    }

    /// The script being debugged.
    fn main_file(&self) -> &Path {
        self.source_files()
            .first()
            .map(PathBuf::as_path)
            .unwrap_or_else(|| Path::new(""))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackKind {
    Thread,
    UserFunction,
    Subroutine,
}

#[derive(Debug, Clone)]
pub struct StackEntry {
    pub kind: StackKind,
    pub line: LineId,
    pub description: String,
}

impl StackEntry {
    /// Text of the `where` attribute in `stack_get` responses.
    pub fn where_text(&self) -> String {
        match self.kind {
            StackKind::Thread => format!("{} (thread)", self.description),
            StackKind::UserFunction => format!("{}()", self.description),
            StackKind::Subroutine => format!("{}:", self.description),
        }
    }
}

pub trait CallStack {
    /// Innermost entry first.
    fn call_stack(&self) -> Vec<StackEntry>;

    fn stack_depth(&self) -> usize {
        self.call_stack().len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, strum_macros::FromRepr)]
#[repr(u8)]
pub enum Context {
    Local = 0,
    Global = 1,
}

pub trait VariableStore {
    /// All variables visible in `context` at stack `depth`.
    fn variables(&self, context: Context, depth: usize) -> Vec<Variable>;

    /// Find a variable by name. In the local context a local binding wins,
    /// otherwise the global one is returned.
    fn find_variable(&self, name: &str, context: Context, depth: usize) -> Option<Variable>;

    /// Assign a variable, creating it when missing. Returns `false` for read-only bindings.
    fn assign_variable(&mut self, name: &str, context: Context, depth: usize, value: Value)
        -> bool;
}

/// Opaque state returned by [`HostControl::suspend_input_hooks`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputHooks(pub u32);

pub trait HostControl {
    /// Remove physical input hooks while the script is halted.
    fn suspend_input_hooks(&mut self) -> InputHooks {
        InputHooks::default()
    }

    fn restore_input_hooks(&mut self, _hooks: InputHooks) {}

    /// Ask the host to terminate the script at the next opportunity.
    fn request_termination(&mut self);

    /// The connection is gone, the host decides whether to keep running unattached.
    fn on_fatal_error(&mut self, _error: &Error) {}
}

pub trait ScriptHost: SourceRegistry + CallStack + VariableStore + HostControl {}

impl<T: SourceRegistry + CallStack + VariableStore + HostControl> ScriptHost for T {}
