use crate::debugger::Error;
use crate::host::{LineId, SourceRegistry};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum_macros::EnumString,
    strum_macros::Display,
    strum_macros::IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum BreakpointState {
    Enabled,
    Disabled,
}

/// Line breakpoint, owned by the source line it is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Breakpoint {
    pub id: u32,
    pub state: BreakpointState,
    /// Removed after the first hit.
    pub temporary: bool,
}

impl Breakpoint {
    #[inline(always)]
    pub fn is_enabled(&self) -> bool {
        self.state == BreakpointState::Enabled
    }
}

/// Issues breakpoint ids and keeps the "one breakpoint per line" rule.
/// Breakpoints themselves live on the host's source lines and are found by
/// scanning them.
#[derive(Debug)]
pub struct BreakpointRegistry {
    next_id: u32,
}

impl Default for BreakpointRegistry {
    fn default() -> Self {
        Self { next_id: 1 }
    }
}

impl BreakpointRegistry {
    /// Find a line to bind a breakpoint requested at `line_number`.
    ///
    /// An exact match among static initializer lines wins, otherwise the
    /// nearest bindable line at or after `line_number` in the same file is used.
    pub fn resolve<H: SourceRegistry + ?Sized>(
        host: &H,
        file_index: usize,
        line_number: u32,
    ) -> Option<LineId> {
        let lines = host.lines();
        let bindable = |id: LineId| {
            let line = &lines[id];
            line.file_index == file_index && line.line_number != 0 && line.kind.is_bindable()
        };

        if let Some(&id) = host
            .static_init_lines()
            .iter()
            .find(|&&id| bindable(id) && lines[id].line_number == line_number)
        {
            return Some(id);
        }

        (0..lines.len())
            .filter(|&id| bindable(id) && lines[id].line_number >= line_number)
            .min_by_key(|&id| lines[id].line_number)
    }

    /// Set a breakpoint. A line that already holds a breakpoint keeps it (and its id),
    /// only state and temporary flag are overwritten.
    pub fn set<H: SourceRegistry + ?Sized>(
        &mut self,
        host: &mut H,
        file_index: usize,
        line_number: u32,
        state: BreakpointState,
        temporary: bool,
    ) -> Result<(LineId, Breakpoint), Error> {
        let line_id =
            Self::resolve(host, file_index, line_number).ok_or(Error::BreakpointInvalid)?;
        let line = &mut host.lines_mut()[line_id];
        let bp = match line.breakpoint.as_mut() {
            Some(existing) => {
                existing.state = state;
                existing.temporary = temporary;
                *existing
            }
            None => {
                let bp = Breakpoint {
                    id: self.next_id,
                    state,
                    temporary,
                };
                self.next_id += 1;
                line.breakpoint = Some(bp);
                bp
            }
        };
        Ok((line_id, bp))
    }

    pub fn find<H: SourceRegistry + ?Sized>(host: &H, id: u32) -> Option<LineId> {
        host.lines()
            .iter()
            .position(|line| line.breakpoint.is_some_and(|bp| bp.id == id))
    }

    pub fn get<H: SourceRegistry + ?Sized>(
        host: &H,
        id: u32,
    ) -> Result<(LineId, Breakpoint), Error> {
        let line_id = Self::find(host, id).ok_or(Error::BreakpointNotFound(id))?;
        let bp = host.lines()[line_id]
            .breakpoint
            .ok_or(Error::BreakpointNotFound(id))?;
        Ok((line_id, bp))
    }

    /// Change state and/or move a breakpoint within its file. The target line is
    /// resolved before anything is detached, so a failed move leaves the
    /// breakpoint where it was. Moving onto a line with another breakpoint
    /// replaces that breakpoint.
    pub fn update<H: SourceRegistry + ?Sized>(
        host: &mut H,
        id: u32,
        new_line: Option<u32>,
        new_state: Option<BreakpointState>,
    ) -> Result<LineId, Error> {
        let (old_line, mut bp) = Self::get(host, id)?;
        let target = match new_line {
            Some(line_number) => {
                let file_index = host.lines()[old_line].file_index;
                Self::resolve(host, file_index, line_number).ok_or(Error::BreakpointInvalid)?
            }
            None => old_line,
        };
        if let Some(state) = new_state {
            bp.state = state;
        }

        let lines = host.lines_mut();
        lines[old_line].breakpoint = None;
        lines[target].breakpoint = Some(bp);
        Ok(target)
    }

    pub fn remove<H: SourceRegistry + ?Sized>(host: &mut H, id: u32) -> Result<Breakpoint, Error> {
        let line_id = Self::find(host, id).ok_or(Error::BreakpointNotFound(id))?;
        host.lines_mut()[line_id]
            .breakpoint
            .take()
            .ok_or(Error::BreakpointNotFound(id))
    }

    /// All breakpoints in line order.
    pub fn list<H: SourceRegistry + ?Sized>(host: &H) -> Vec<(LineId, Breakpoint)> {
        host.lines()
            .iter()
            .enumerate()
            .filter_map(|(id, line)| line.breakpoint.map(|bp| (id, bp)))
            .collect()
    }

    /// Detach every breakpoint, ids are not reused afterwards.
    pub fn clear_all<H: SourceRegistry + ?Sized>(host: &mut H) {
        host.lines_mut()
            .iter_mut()
            .for_each(|line| line.breakpoint = None);
    }
}
