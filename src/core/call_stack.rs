use crate::{JSError, raise_range_error};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

// Each JS call nests several boxed futures; one level can take tens of KiB
// of native stack in debug builds.
const STACK_RED_ZONE: usize = 1024 * 1024;
const STACK_GROW_SIZE: usize = 8 * 1024 * 1024;

/// Runs `f`, first switching to a fresh stack segment if the current one is
/// nearly exhausted.
pub fn with_stack_headroom<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, f)
}

#[derive(Clone, Debug)]
pub enum FrameLocation {
    Source { filename: Rc<str>, line: u32, column: u32 },
    Native,
}

#[derive(Clone, Debug)]
pub struct StackFrame {
    pub function_name: Rc<str>,
    /// Identity of the function object executing in this frame.
    pub function_id: Option<u64>,
    pub location: FrameLocation,
}

impl StackFrame {
    pub fn source(function_name: Rc<str>, function_id: Option<u64>, filename: Rc<str>, line: u32, column: u32) -> Self {
        StackFrame {
            function_name,
            function_id,
            location: FrameLocation::Source { filename, line, column },
        }
    }

    pub fn native(function_name: Rc<str>, function_id: Option<u64>) -> Self {
        StackFrame {
            function_name,
            function_id,
            location: FrameLocation::Native,
        }
    }

    fn display_name(&self) -> &str {
        if self.function_name.is_empty() { "<anonymous>" } else { &self.function_name }
    }
}

impl std::fmt::Display for StackFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            FrameLocation::Source { filename, line, column } => {
                write!(f, "    at {} ({filename}:{line}:{column})", self.display_name())
            }
            FrameLocation::Native => write!(f, "    at {} (native)", self.display_name()),
        }
    }
}

/// Stack of active frames, innermost last.
#[derive(Debug)]
pub struct CallStack {
    frames: RefCell<Vec<StackFrame>>,
    max_depth: Cell<usize>,
}

impl CallStack {
    pub fn new(max_depth: usize) -> Self {
        CallStack {
            frames: RefCell::new(Vec::new()),
            max_depth: Cell::new(max_depth),
        }
    }

    pub fn set_max_depth(&self, depth: usize) {
        self.max_depth.set(depth);
    }

    pub fn depth(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Pushes a frame for a call, failing once the maximum depth is reached.
    pub fn enter(&self, frame: StackFrame) -> Result<FrameGuard<'_>, JSError> {
        if self.depth() >= self.max_depth.get() {
            return Err(raise_range_error!("Maximum call stack size exceeded"));
        }
        Ok(self.enter_unchecked(frame))
    }

    pub fn enter_unchecked(&self, frame: StackFrame) -> FrameGuard<'_> {
        let mut frames = self.frames.borrow_mut();
        frames.push(frame);
        FrameGuard {
            stack: self,
            depth: frames.len(),
        }
    }

    /// Records the current source position of the innermost frame.
    pub fn set_position(&self, line: u32, column: u32) {
        if let Some(StackFrame {
            location: FrameLocation::Source { line: l, column: c, .. },
            ..
        }) = self.frames.borrow_mut().last_mut()
        {
            *l = line;
            *c = column;
        }
    }

    pub fn top(&self) -> Option<StackFrame> {
        self.frames.borrow().last().cloned()
    }

    /// Active frames, innermost first.
    pub fn snapshot(&self) -> Vec<StackFrame> {
        self.frames.borrow().iter().rev().cloned().collect()
    }

    /// Renders `header` followed by one `at` line per frame.
    ///
    /// `skip` drops that many innermost frames. With `stop_at`, every frame up
    /// to and including the innermost frame running that function is dropped.
    pub fn render(&self, header: &str, skip: usize, stop_at: Option<u64>) -> String {
        let mut frames: Vec<StackFrame> = self.snapshot().into_iter().skip(skip).collect();
        if let Some(id) = stop_at
            && let Some(pos) = frames.iter().position(|f| f.function_id == Some(id))
        {
            frames.drain(..=pos);
        }
        let mut out = header.to_string();
        for frame in &frames {
            out.push('\n');
            out.push_str(&frame.to_string());
        }
        out
    }
}

/// Pops its frame (and anything pushed above it) on drop.
pub struct FrameGuard<'a> {
    stack: &'a CallStack,
    depth: usize,
}

impl FrameGuard<'_> {
    /// The frame as it currently stands, including its latest position.
    pub fn current(&self) -> Option<StackFrame> {
        self.stack.frames.borrow().get(self.depth - 1).cloned()
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.stack.frames.borrow_mut().truncate(self.depth - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_innermost_first() {
        let stack = CallStack::new(8);
        let _outer = stack.enter(StackFrame::source("".into(), None, "<console>".into(), 1, 1)).unwrap();
        let _inner = stack.enter(StackFrame::source("f".into(), Some(7), "<console>".into(), 2, 3)).unwrap();
        let _native = stack.enter(StackFrame::native("map".into(), Some(9))).unwrap();
        stack.set_position(5, 5);
        assert_eq!(
            stack.render("Error: boom", 0, None),
            "Error: boom\n    at map (native)\n    at f (<console>:2:3)\n    at <anonymous> (<console>:1:1)"
        );
        assert_eq!(stack.render("Error", 0, Some(7)), "Error\n    at <anonymous> (<console>:1:1)");
    }

    #[test]
    fn depth_limit_and_guard_pop() {
        let stack = CallStack::new(1);
        {
            let _g = stack.enter(StackFrame::native("a".into(), None)).unwrap();
            assert!(stack.enter(StackFrame::native("b".into(), None)).is_err());
        }
        assert_eq!(stack.depth(), 0);
    }
}
