//! A tiny line oriented script interpreter driven by a debug [`Session`].
//!
//! The playground exists to exercise the engine end to end: it registers its
//! source lines, keeps a call stack of user functions and a global/local
//! variable store, and calls [`Session::pre_exec_line`] before every line.

pub mod parser;

use crate::debugger::property::name::{self, PropertyPath};
use crate::debugger::Session;
use crate::host::{
    CallStack, Context, Facets, HostControl, LineId, LineKind, Object, SourceLine,
    SourceRegistry, StackEntry, StackKind, Value, Variable, VariableStore,
};
use crate::log::PROTOCOL_TARGET;
use crate::{dbgp_debug, dbgp_warn};
use indexmap::IndexMap;
use parser::{Expr, Literal, Statement};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Read-only builtin holding the script file name.
pub const SCRIPT_NAME_VAR: &str = "A_ScriptName";
const THREAD_NAME: &str = "Auto-execute";
const MAX_CALL_DEPTH: usize = 256;

#[derive(thiserror::Error, Debug)]
pub enum ScriptError {
    #[error("can not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("line {line}: {message}")]
    Syntax { line: u32, message: String },
    #[error("line {0}: unbalanced braces")]
    UnbalancedBlock(u32),
    #[error("line {0}: functions can not be nested")]
    NestedFunction(u32),
    #[error("function `{0}` is defined twice")]
    DuplicateFunction(String),
    #[error("call to unknown function `{0}`")]
    UnknownFunction(String),
    #[error("`{0}` can not be read")]
    Undefined(String),
    #[error("`{0}` can not be assigned")]
    InvalidTarget(String),
    #[error("call stack exhausted")]
    TooDeep,
}

#[derive(Debug, Clone, Copy)]
struct Function {
    header: LineId,
    end: LineId,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    value: Value,
    is_static: bool,
}

#[derive(Debug)]
struct Frame {
    function: String,
    line: LineId,
    locals: IndexMap<String, Value>,
}

/// What to do after a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Next,
    Return,
    Exit,
}

pub struct Playground {
    files: Vec<PathBuf>,
    lines: Vec<SourceLine>,
    statements: Vec<Statement>,
    statics: Vec<LineId>,
    functions: HashMap<String, Function>,
    /// Per line: part of a function definition, skipped by the auto-execute flow.
    function_lines: Vec<bool>,
    globals: IndexMap<String, Slot>,
    frames: Vec<Frame>,
    thread_line: LineId,
    terminate: Arc<AtomicBool>,
    output: Vec<String>,
    echo: bool,
}

impl Playground {
    /// Load and check a script. Nothing is executed.
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let text = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        Self::from_source(path, &text)
    }

    fn from_source(path: PathBuf, text: &str) -> Result<Self, ScriptError> {
        let mut lines = vec![];
        let mut statements = vec![];
        let mut statics = vec![];
        let mut functions = HashMap::new();
        let mut function_lines = vec![];
        // open blocks: line id and the function being defined, if any
        let mut open: Vec<(LineId, Option<String>)> = vec![];

        for (idx, raw) in text.lines().enumerate() {
            let line_number = idx as u32 + 1;
            let Some(statement) = parser::parse_line(raw)
                .map_err(|message| ScriptError::Syntax { line: line_number, message })?
            else {
                continue;
            };
            let id = lines.len();
            let in_function = open.iter().any(|(_, func)| func.is_some());

            let kind = match &statement {
                Statement::FuncBegin(name) => {
                    if in_function {
                        return Err(ScriptError::NestedFunction(line_number));
                    }
                    open.push((id, Some(name.clone())));
                    LineKind::BlockBegin {
                        function_body: true,
                    }
                }
                Statement::BlockBegin => {
                    open.push((id, None));
                    LineKind::BlockBegin {
                        function_body: false,
                    }
                }
                Statement::BlockEnd => {
                    let (header, func) = open
                        .pop()
                        .ok_or(ScriptError::UnbalancedBlock(line_number))?;
                    if let Some(name) = &func {
                        let function = Function { header, end: id };
                        if functions.insert(name.clone(), function).is_some() {
                            return Err(ScriptError::DuplicateFunction(name.clone()));
                        }
                    }
                    LineKind::BlockEnd {
                        function_end: func.is_some(),
                    }
                }
                Statement::Assign {
                    is_static: true, ..
                } => {
                    statics.push(id);
                    LineKind::Statement
                }
                _ => LineKind::Statement,
            };

            function_lines.push(in_function || matches!(statement, Statement::FuncBegin(_)));
            lines.push(SourceLine::new(0, line_number, kind));
            statements.push(statement);
        }

        if let Some((id, _)) = open.last() {
            return Err(ScriptError::UnbalancedBlock(lines[*id].line_number));
        }

        Ok(Self {
            files: vec![path],
            lines,
            statements,
            statics,
            functions,
            function_lines,
            globals: IndexMap::new(),
            frames: vec![],
            thread_line: 0,
            terminate: Arc::new(AtomicBool::new(false)),
            output: vec![],
            echo: false,
        })
    }

    pub fn main_path(&self) -> &Path {
        &self.files[0]
    }

    /// Print script output to the process stdout as well as collecting it.
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    /// Lines printed by the script and not redirected to the client.
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Shared flag, raising it stops the script before its next line.
    pub fn termination_flag(&self) -> Arc<AtomicBool> {
        self.terminate.clone()
    }

    pub fn termination_requested(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }

    /// Run static initializers, then the auto-execute section.
    pub fn run(&mut self, session: &mut Session) -> Result<(), ScriptError> {
        for id in self.statics.clone() {
            if self.step(session, id)? == Flow::Exit {
                return Ok(());
            }
        }

        for id in 0..self.lines.len() {
            if self.function_lines[id] || self.statics.contains(&id) {
                continue;
            }
            match self.step(session, id)? {
                Flow::Next => {}
                Flow::Return | Flow::Exit => return Ok(()),
            }
        }
        Ok(())
    }

    /// Report the line to the session, then execute it.
    fn step(&mut self, session: &mut Session, id: LineId) -> Result<Flow, ScriptError> {
        if self.hook(session, id) {
            return Ok(Flow::Exit);
        }
        self.execute(session, id)
    }

    /// Returns true if the script must stop.
    fn hook(&mut self, session: &mut Session, id: LineId) -> bool {
        match self.frames.last_mut() {
            Some(frame) => frame.line = id,
            None => self.thread_line = id,
        }
        if let Err(e) = session.pre_exec_line(self, id) {
            dbgp_warn!(target: PROTOCOL_TARGET, "continuing without a debugger: {e}");
        }
        self.termination_requested()
    }

    fn execute(&mut self, session: &mut Session, id: LineId) -> Result<Flow, ScriptError> {
        match self.statements[id].clone() {
            Statement::Assign { target, value, .. } => {
                let value = self.eval(&value)?;
                self.assign(&target, value)?;
            }
            Statement::Print(expr) => {
                let text = self.eval(&expr)?.to_string();
                if !session.output_stdout(self, &text) {
                    if self.echo {
                        println!("{text}");
                    }
                    self.output.push(text);
                }
            }
            Statement::Call(name) => return self.call(session, &name),
            Statement::Return => return Ok(Flow::Return),
            Statement::FuncBegin(_) | Statement::BlockBegin | Statement::BlockEnd => {}
        }
        Ok(Flow::Next)
    }

    fn call(&mut self, session: &mut Session, name: &str) -> Result<Flow, ScriptError> {
        let function = *self
            .functions
            .get(name)
            .ok_or_else(|| ScriptError::UnknownFunction(name.to_string()))?;
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(ScriptError::TooDeep);
        }
        dbgp_debug!(target: PROTOCOL_TARGET, "call {name}");
        self.frames.push(Frame {
            function: name.to_string(),
            line: function.header,
            locals: IndexMap::new(),
        });

        let flow = self.call_body(session, function);
        self.frames.pop();
        match flow? {
            Flow::Exit => Ok(Flow::Exit),
            Flow::Next | Flow::Return => Ok(Flow::Next),
        }
    }

    fn call_body(&mut self, session: &mut Session, function: Function) -> Result<Flow, ScriptError> {
        if self.hook(session, function.header) {
            return Ok(Flow::Exit);
        }
        for id in function.header + 1..function.end {
            match self.step(session, id)? {
                Flow::Next => {}
                Flow::Return => break,
                Flow::Exit => return Ok(Flow::Exit),
            }
        }
        // the closing brace is a stop before returning to the caller
        if self.hook(session, function.end) {
            return Ok(Flow::Exit);
        }
        Ok(Flow::Return)
    }

    fn eval(&self, expr: &Expr) -> Result<Value, ScriptError> {
        Ok(match expr {
            Expr::Literal(Literal::Int(i)) => Value::Integer(*i),
            Expr::Literal(Literal::Float(f)) => Value::Float(*f),
            Expr::Literal(Literal::Str(s)) => Value::String(s.clone()),
            Expr::Literal(Literal::NewObject) => Value::Object(Object::new("Object").into_ref()),
            Expr::Path(path) if path.segments.is_empty() => self
                .find_variable(&path.root, Context::Local, 0)
                .map(|var| var.value)
                .unwrap_or_default(),
            Expr::Path(path) => {
                let fullname = path.to_string();
                name::resolve(self, path, &fullname, Context::Local, 0)
                    .and_then(|binding| binding.value(&fullname))
                    .map_err(|_| ScriptError::Undefined(fullname))?
            }
        })
    }

    fn assign(&mut self, target: &PropertyPath, value: Value) -> Result<(), ScriptError> {
        let fullname = target.to_string();
        let assigned = if target.segments.is_empty() {
            self.assign_variable(&target.root, Context::Local, 0, value)
        } else {
            let binding = name::resolve(self, target, &fullname, Context::Local, 0)
                .map_err(|_| ScriptError::InvalidTarget(fullname.clone()))?;
            binding.assign(self, Context::Local, 0, value)
        };
        if assigned {
            Ok(())
        } else {
            Err(ScriptError::InvalidTarget(fullname))
        }
    }

    /// Frame at stack `depth`, `None` for the auto-execute thread.
    fn frame(&self, depth: usize) -> Option<&Frame> {
        let idx = self.frames.len().checked_sub(depth + 1)?;
        self.frames.get(idx)
    }

    fn frame_mut(&mut self, depth: usize) -> Option<&mut Frame> {
        let idx = self.frames.len().checked_sub(depth + 1)?;
        self.frames.get_mut(idx)
    }

    fn script_name(&self) -> Variable {
        let name = self
            .main_path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Variable::new(SCRIPT_NAME_VAR, Value::String(name)).with_facets(Facets {
            builtin: true,
            ..Facets::default()
        })
    }

    fn global(&self, name: &str) -> Option<Variable> {
        if name.eq_ignore_ascii_case(SCRIPT_NAME_VAR) {
            return Some(self.script_name());
        }
        self.globals.get(name).map(|slot| global_variable(name, slot))
    }
}

fn global_variable(name: &str, slot: &Slot) -> Variable {
    Variable::new(name, slot.value.clone()).with_facets(Facets {
        is_static: slot.is_static,
        ..Facets::default()
    })
}

impl SourceRegistry for Playground {
    fn source_files(&self) -> &[PathBuf] {
        &self.files
    }

    fn lines(&self) -> &[SourceLine] {
        &self.lines
    }

    fn lines_mut(&mut self) -> &mut [SourceLine] {
        &mut self.lines
    }

    fn static_init_lines(&self) -> &[LineId] {
        &self.statics
    }
}

impl CallStack for Playground {
    fn call_stack(&self) -> Vec<StackEntry> {
        let mut stack: Vec<_> = self
            .frames
            .iter()
            .rev()
            .map(|frame| StackEntry {
                kind: StackKind::UserFunction,
                line: frame.line,
                description: frame.function.clone(),
            })
            .collect();
        stack.push(StackEntry {
            kind: StackKind::Thread,
            line: self.thread_line,
            description: THREAD_NAME.to_string(),
        });
        stack
    }

    fn stack_depth(&self) -> usize {
        self.frames.len() + 1
    }
}

impl VariableStore for Playground {
    fn variables(&self, context: Context, depth: usize) -> Vec<Variable> {
        match (context, self.frame(depth)) {
            (Context::Local, Some(frame)) => frame
                .locals
                .iter()
                .map(|(name, value)| Variable::new(name, value.clone()))
                .collect(),
            _ => std::iter::once(self.script_name())
                .chain(
                    self.globals
                        .iter()
                        .map(|(name, slot)| global_variable(name, slot)),
                )
                .collect(),
        }
    }

    fn find_variable(&self, name: &str, context: Context, depth: usize) -> Option<Variable> {
        if let (Context::Local, Some(frame)) = (context, self.frame(depth)) {
            if let Some(value) = frame.locals.get(name) {
                return Some(Variable::new(name, value.clone()));
            }
        }
        self.global(name)
    }

    fn assign_variable(
        &mut self,
        name: &str,
        context: Context,
        depth: usize,
        value: Value,
    ) -> bool {
        if name.eq_ignore_ascii_case(SCRIPT_NAME_VAR) {
            return false;
        }
        if context == Context::Local {
            if let Some(frame) = self.frame_mut(depth) {
                frame.locals.insert(name.to_string(), value);
                return true;
            }
        }
        let is_static = self
            .statics
            .iter()
            .any(|&id| matches!(&self.statements[id], Statement::Assign { target, .. } if target.root == name));
        let slot = self.globals.entry(name.to_string()).or_default();
        slot.value = value;
        slot.is_static = is_static;
        true
    }
}

impl HostControl for Playground {
    fn request_termination(&mut self) {
        self.terminate.store(true, Ordering::SeqCst);
    }
}
