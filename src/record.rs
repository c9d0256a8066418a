use std::error::Error;
use tracing::Level;

/// One log event as handed to the layout by the hosting logging subsystem.
///
/// Every optional field has a documented substitute in the output, so a
/// partially populated event is never an error.
#[derive(Debug, Clone, Default)]
pub struct LogEvent {
    pub timestamp_millis: i64,
    pub thread_name: Option<String>,
    /// `None` is rendered as `TRACE`, the lowest severity.
    pub level: Option<Level>,
    pub logger_name: Option<String>,
    pub formatted_message: Option<String>,
    pub throwable: Option<ThrowableChain>,
}

impl LogEvent {
    pub fn new(timestamp_millis: i64) -> Self {
        LogEvent {
            timestamp_millis,
            ..Default::default()
        }
    }

    pub fn with_thread(mut self, name: impl Into<String>) -> Self {
        self.thread_name = Some(name.into());
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_logger(mut self, name: impl Into<String>) -> Self {
        self.logger_name = Some(name.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.formatted_message = Some(message.into());
        self
    }

    pub fn with_throwable(mut self, chain: ThrowableChain) -> Self {
        self.throwable = Some(chain);
        self
    }
}

/// Identity of a frame inside a [`ThrowableChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(usize);

impl FrameId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One exception in a cause chain.
#[derive(Debug, Clone)]
pub struct ThrowableFrame {
    pub class_name: String,
    pub message: Option<String>,
    pub stack_elements: Vec<String>,
    /// Frames shared with the enclosing exception and left out of
    /// `stack_elements`.
    pub common_frames_elided: usize,
    pub cause: Option<FrameId>,
}

impl ThrowableFrame {
    pub fn new(class_name: impl Into<String>, message: Option<String>) -> Self {
        ThrowableFrame {
            class_name: class_name.into(),
            message,
            stack_elements: Vec::new(),
            common_frames_elided: 0,
            cause: None,
        }
    }

    pub fn with_stack<I, S>(mut self, elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stack_elements = elements.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_common_frames(mut self, elided: usize) -> Self {
        self.common_frames_elided = elided;
        self
    }
}

/// Arena of [`ThrowableFrame`]s linked through `cause`.
///
/// Frames refer to their cause by [`FrameId`], which lets foreign exception
/// data describe cycles (`A -> B -> A`). The first pushed frame is the root.
#[derive(Debug, Clone, Default)]
pub struct ThrowableChain {
    frames: Vec<ThrowableFrame>,
}

impl ThrowableChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a frame and return its identity. The cause link is kept as given.
    pub fn push(&mut self, frame: ThrowableFrame) -> FrameId {
        self.frames.push(frame);
        FrameId(self.frames.len() - 1)
    }

    /// Re-point the cause of `frame`. Unknown ids are ignored.
    pub fn set_cause(&mut self, frame: FrameId, cause: Option<FrameId>) {
        if let Some(f) = self.frames.get_mut(frame.0) {
            f.cause = cause;
        }
    }

    pub fn root(&self) -> Option<FrameId> {
        if self.frames.is_empty() {
            None
        } else {
            Some(FrameId(0))
        }
    }

    pub fn get(&self, id: FrameId) -> Option<&ThrowableFrame> {
        self.frames.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Build a linear chain from a Rust error and its `source()` links.
    ///
    /// The root frame is named after the concrete error type; sources only
    /// expose `dyn Error`, so their names come from their `Debug` output.
    pub fn from_error<E: Error + 'static>(err: &E) -> Self {
        let mut chain = ThrowableChain::new();
        let root = chain.push(ThrowableFrame::new(
            std::any::type_name::<E>(),
            Some(err.to_string()),
        ));
        chain.append_sources(root, err.source());
        chain
    }

    /// Same as [`from_error`](Self::from_error) for an already type-erased
    /// error, as delivered by `tracing`'s `record_error`.
    pub fn from_dyn_error(err: &(dyn Error + 'static)) -> Self {
        let mut chain = ThrowableChain::new();
        let root = chain.push(ThrowableFrame::new(debug_name(err), Some(err.to_string())));
        chain.append_sources(root, err.source());
        chain
    }

    fn append_sources(&mut self, mut last: FrameId, mut source: Option<&(dyn Error + 'static)>) {
        while let Some(err) = source {
            let id = self.push(ThrowableFrame::new(debug_name(err), Some(err.to_string())));
            self.set_cause(last, Some(id));
            last = id;
            source = err.source();
        }
    }
}

/// Leading identifier of an error's `Debug` output, e.g. `ParseIntError`
/// for `ParseIntError { kind: InvalidDigit }`.
fn debug_name(err: &dyn Error) -> String {
    let debug = format!("{:?}", err);
    let name: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    if name.is_empty() {
        "Error".to_string()
    } else {
        name
    }
}
