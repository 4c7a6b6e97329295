//! Nonblocking command chains.
//!
//! A [`Command`] is one step of robot behavior with a one-time setup, a
//! periodic step and a completion query. Commands link forward into a chain
//! that the scheduler walks one node at a time. Each node owns its successor,
//! so a chain is always finite and acyclic.

pub mod delay;
pub mod dynamic;
pub mod parallel;

pub use delay::DelayCommand;
pub use dynamic::DynamicCommand;
pub use parallel::ParallelCommand;

use core::fmt;

use dynamic::Selection;

/// User-defined behavior of a plain command. None of these may block.
pub trait CommandBehavior {
    /// Runs once before the first periodic step; set initial conditions here.
    fn first_run_behavior(&mut self) {}

    fn periodic(&mut self) {}

    fn is_complete(&self) -> bool;
}

pub(crate) enum CommandKind {
    Custom(Box<dyn CommandBehavior>),
    Dynamic(DynamicCommand),
    Parallel(ParallelCommand),
    Delay(DelayCommand),
    Instant,
}

/// One node of a command chain.
pub struct Command {
    name: String,
    kind: CommandKind,
    next_command: Option<Box<Command>>,
    first_run_occurred: bool,
    dependent_subscribers: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>, behavior: impl CommandBehavior + 'static) -> Self {
        Self::from_kind(name, CommandKind::Custom(Box::new(behavior)))
    }

    /// A step that completes as soon as it is polled.
    pub fn instant(name: impl Into<String>) -> Self {
        Self::from_kind(name, CommandKind::Instant)
    }

    fn from_kind(name: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            name: name.into(),
            kind,
            next_command: None,
            first_run_occurred: false,
            dependent_subscribers: Vec::new(),
        }
    }

    /// Record which subscribers this command drives. Informational only.
    #[must_use]
    pub fn with_subscribers<I, S>(mut self, subscribers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependent_subscribers = subscribers.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependent_subscribers(&self) -> &[String] {
        &self.dependent_subscribers
    }

    pub fn first_run_occurred(&self) -> bool {
        self.first_run_occurred
    }

    /// Run the one-time setup. Later calls do nothing.
    pub fn first_run(&mut self) {
        if self.first_run_occurred {
            return;
        }
        match &mut self.kind {
            CommandKind::Custom(behavior) => behavior.first_run_behavior(),
            CommandKind::Dynamic(dynamic) => dynamic.first_run_behavior(),
            CommandKind::Parallel(parallel) => parallel.first_run_behavior(),
            CommandKind::Delay(delay) => delay.first_run_behavior(),
            CommandKind::Instant => {}
        }
        self.first_run_occurred = true;
    }

    pub fn periodic(&mut self) {
        match &mut self.kind {
            CommandKind::Custom(behavior) => behavior.periodic(),
            CommandKind::Dynamic(dynamic) => dynamic.periodic(),
            CommandKind::Parallel(parallel) => parallel.periodic(),
            CommandKind::Delay(_) | CommandKind::Instant => {}
        }
    }

    /// Whether the chain may move past this node. For a dynamic command a
    /// positive answer also installs the selected branch as the successor.
    pub fn is_complete(&mut self) -> bool {
        let selection = match &mut self.kind {
            CommandKind::Custom(behavior) => return behavior.is_complete(),
            CommandKind::Parallel(parallel) => return parallel.is_complete(),
            CommandKind::Delay(delay) => return delay.is_complete(),
            CommandKind::Instant => return true,
            CommandKind::Dynamic(dynamic) => dynamic.evaluate(),
        };

        match selection {
            Selection::Matched(successor) => {
                self.set_next(successor);
                true
            }
            Selection::Latched => true,
            Selection::Pending => false,
        }
    }

    /// Append `next` at the tail of this chain. Existing links are never
    /// overwritten, so repeated calls build a sequence.
    pub fn set_next(&mut self, next: Command) -> &mut Self {
        self.append(next);
        self
    }

    /// By-value form of [`set_next`](Command::set_next) for building chains inline.
    #[must_use]
    pub fn then(mut self, next: Command) -> Self {
        self.append(next);
        self
    }

    fn append(&mut self, next: Command) {
        match self.next_command.as_mut() {
            Some(successor) => successor.append(next),
            None => self.next_command = Some(Box::new(next)),
        }
    }

    pub fn next_command(&self) -> Option<&Command> {
        self.next_command.as_deref()
    }

    pub fn has_next(&self) -> bool {
        self.next_command.is_some()
    }

    /// Detach and return the successor, leaving this node terminal.
    pub fn take_next(&mut self) -> Option<Command> {
        self.next_command.take().map(|next| *next)
    }

    /// Number of nodes from this one to the end of the chain.
    pub fn chain_len(&self) -> usize {
        let mut len = 1;
        let mut node = self;
        while let Some(next) = node.next_command.as_deref() {
            len += 1;
            node = next;
        }
        len
    }
}

impl From<DynamicCommand> for Command {
    fn from(dynamic: DynamicCommand) -> Self {
        let name = dynamic.name().to_string();
        Self::from_kind(name, CommandKind::Dynamic(dynamic))
    }
}

impl From<ParallelCommand> for Command {
    fn from(parallel: ParallelCommand) -> Self {
        let name = parallel.name().to_string();
        Self::from_kind(name, CommandKind::Parallel(parallel))
    }
}

impl From<DelayCommand> for Command {
    fn from(delay: DelayCommand) -> Self {
        let name = delay.name().to_string();
        Self::from_kind(name, CommandKind::Delay(delay))
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            CommandKind::Custom(_) => "custom",
            CommandKind::Dynamic(_) => "dynamic",
            CommandKind::Parallel(_) => "parallel",
            CommandKind::Delay(_) => "delay",
            CommandKind::Instant => "instant",
        };
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("kind", &kind)
            .field("first_run_occurred", &self.first_run_occurred)
            .field("next_command", &self.next_command)
            .finish_non_exhaustive()
    }
}
