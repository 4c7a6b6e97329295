use super::{Command, CommandBehavior};

type Predicate = Box<dyn FnMut() -> bool>;

pub(crate) enum Selection {
    Matched(Command),
    Latched,
    Pending,
}

/// A command whose successor is chosen at runtime.
///
/// Branches are (predicate, successor) pairs checked in registration order;
/// the first predicate returning true completes the command and its successor
/// becomes the next link. Predicates after the match are not evaluated.
pub struct DynamicCommand {
    name: String,
    behavior: Option<Box<dyn CommandBehavior>>,
    options: Vec<(Predicate, Command)>,
    selected: bool,
}

impl DynamicCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behavior: None,
            options: Vec::new(),
            selected: false,
        }
    }

    /// Setup and periodic steps to run while waiting for a branch. The
    /// behavior's own completion query is ignored.
    #[must_use]
    pub fn with_behavior(mut self, behavior: impl CommandBehavior + 'static) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }

    pub fn set_next_option<F>(&mut self, successor: Command, predicate: F) -> &mut Self
    where
        F: FnMut() -> bool + 'static,
    {
        self.options.push((Box::new(predicate), successor));
        self
    }

    /// By-value form of [`set_next_option`](DynamicCommand::set_next_option).
    #[must_use]
    pub fn option<F>(mut self, successor: Command, predicate: F) -> Self
    where
        F: FnMut() -> bool + 'static,
    {
        self.set_next_option(successor, predicate);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn option_count(&self) -> usize {
        self.options.len()
    }

    pub(crate) fn first_run_behavior(&mut self) {
        if let Some(behavior) = self.behavior.as_mut() {
            behavior.first_run_behavior();
        }
    }

    pub(crate) fn periodic(&mut self) {
        if let Some(behavior) = self.behavior.as_mut() {
            behavior.periodic();
        }
    }

    pub(crate) fn evaluate(&mut self) -> Selection {
        if self.selected {
            return Selection::Latched;
        }
        let Some(index) = self.options.iter_mut().position(|option| (option.0)()) else {
            return Selection::Pending;
        };
        self.selected = true;
        let (_, successor) = self.options.swap_remove(index);
        // remaining branches can never be taken
        self.options.clear();
        Selection::Matched(successor)
    }
}
