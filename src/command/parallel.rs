use super::Command;

/// Interleaves several command chains within each tick.
///
/// This is cooperative, not threaded: every child runs one nonblocking step
/// per tick. Nothing checks that children drive disjoint subscribers; only
/// group commands that are safe to run side by side.
pub struct ParallelCommand {
    name: String,
    commands: Vec<Command>,
}

impl ParallelCommand {
    pub fn new(commands: Vec<Command>) -> Self {
        Self::named("Parallel Command", commands)
    }

    pub fn named(name: impl Into<String>, commands: Vec<Command>) -> Self {
        Self {
            name: name.into(),
            commands,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The commands currently held, after any in-place advancement.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub(crate) fn first_run_behavior(&mut self) {
        for command in &mut self.commands {
            command.first_run();
        }
    }

    pub(crate) fn periodic(&mut self) {
        for slot in &mut self.commands {
            if slot.is_complete() {
                if let Some(successor) = slot.take_next() {
                    // successor starts in the same tick its predecessor finished
                    *slot = successor;
                    slot.first_run();
                    continue;
                }
            }
            slot.periodic();
        }
    }

    /// True once every held command reports complete. A held command that
    /// completes while still linked to a successor counts as complete too.
    pub(crate) fn is_complete(&mut self) -> bool {
        self.commands.iter_mut().all(Command::is_complete)
    }
}
