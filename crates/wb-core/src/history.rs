//! Linear undo/redo history.
//!
//! Commands live in a single stack with a pointer to the most recently
//! applied one. Undo walks the pointer down, redo walks it back up, and
//! committing a new command discards everything above the pointer.
//!
//! The pointer is always in `[-1, len - 1]`; `-1` means nothing is applied.

use crate::command::Command;

#[derive(Debug, Clone)]
pub struct History {
    commands: Vec<Command>,
    pointer: isize,
    /// Maximum number of retained commands (`None` = unbounded).
    limit: Option<usize>,
}

impl Default for History {
    fn default() -> Self {
        Self::new(None)
    }
}

impl History {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            commands: Vec::new(),
            pointer: -1,
            limit,
        }
    }

    /// Commit a command: drop any redo entries above the pointer, append,
    /// and point at the new top. Over the limit, the oldest entry goes.
    pub fn push(&mut self, command: Command) {
        let keep = (self.pointer + 1) as usize;
        if keep < self.commands.len() {
            log::debug!("discarding {} redo entries", self.commands.len() - keep);
            self.commands.truncate(keep);
        }
        self.commands.push(command);
        if let Some(limit) = self.limit
            && self.commands.len() > limit
        {
            let excess = self.commands.len() - limit;
            self.commands.drain(..excess);
        }
        self.pointer = self.commands.len() as isize - 1;
    }

    /// Move one step back, returning the command being undone.
    pub fn step_back(&mut self) -> Option<&Command> {
        if !self.can_undo() {
            return None;
        }
        let index = self.pointer as usize;
        self.pointer -= 1;
        self.commands.get(index)
    }

    /// Move one step forward, returning the command being redone.
    pub fn step_forward(&mut self) -> Option<&Command> {
        if !self.can_redo() {
            return None;
        }
        self.pointer += 1;
        self.commands.get(self.pointer as usize)
    }

    pub fn can_undo(&self) -> bool {
        self.pointer > -1
    }

    pub fn can_redo(&self) -> bool {
        self.pointer < self.commands.len() as isize - 1
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.pointer = -1;
    }

    /// Overwrite the whole stack. The pointer defaults to the top and is
    /// clamped into range; nothing checks the commands against any state.
    pub fn replace(&mut self, commands: Vec<Command>, pointer: Option<isize>) {
        let top = commands.len() as isize - 1;
        self.pointer = pointer.unwrap_or(top).clamp(-1, top);
        self.commands = commands;
    }

    /// The most recently applied command.
    pub fn current(&self) -> Option<&Command> {
        usize::try_from(self.pointer)
            .ok()
            .and_then(|index| self.commands.get(index))
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn pointer(&self) -> isize {
        self.pointer
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::Patch;
    use serde_json::json;

    fn cmd(n: i64) -> Command {
        Command::new(
            Patch::from_json(json!({ "n": n - 1 })),
            Patch::from_json(json!({ "n": n })),
        )
        .with_id(format!("c{n}"))
    }

    fn ids(history: &History) -> Vec<&str> {
        history
            .commands()
            .iter()
            .filter_map(|c| c.id.as_deref())
            .collect()
    }

    #[test]
    fn empty_history_boundaries() {
        let mut history = History::default();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.pointer(), -1);
        assert!(history.step_back().is_none());
        assert!(history.step_forward().is_none());
        assert!(history.current().is_none());
    }

    #[test]
    fn step_back_and_forward() {
        let mut history = History::default();
        history.push(cmd(1));
        history.push(cmd(2));
        assert_eq!(history.pointer(), 1);

        assert_eq!(history.step_back().and_then(|c| c.id.clone()), Some("c2".into()));
        assert_eq!(history.pointer(), 0);
        assert!(history.can_redo());

        assert_eq!(history.step_forward().and_then(|c| c.id.clone()), Some("c2".into()));
        assert!(!history.can_redo());
        assert_eq!(history.current().and_then(|c| c.id.as_deref()), Some("c2"));
    }

    #[test]
    fn push_after_undo_truncates() {
        let mut history = History::default();
        for n in 1..=5 {
            history.push(cmd(n));
        }
        history.step_back();
        history.step_back();
        history.push(cmd(6));

        assert_eq!(ids(&history), vec!["c1", "c2", "c3", "c6"]);
        assert_eq!(history.pointer(), 3);
        assert!(!history.can_redo());
    }

    #[test]
    fn push_from_bottom_discards_everything() {
        let mut history = History::default();
        history.push(cmd(1));
        history.push(cmd(2));
        history.step_back();
        history.step_back();
        history.push(cmd(3));
        assert_eq!(ids(&history), vec!["c3"]);
    }

    #[test]
    fn limit_trims_oldest() {
        let mut history = History::new(Some(3));
        for n in 1..=5 {
            history.push(cmd(n));
        }
        assert_eq!(ids(&history), vec!["c3", "c4", "c5"]);
        assert_eq!(history.pointer(), 2);

        let mut undo_count = 0;
        while history.step_back().is_some() {
            undo_count += 1;
        }
        assert_eq!(undo_count, 3);
    }

    #[test]
    fn replace_clamps_pointer() {
        let mut history = History::default();
        history.replace(vec![cmd(1), cmd(2)], None);
        assert_eq!(history.pointer(), 1);

        history.replace(vec![cmd(1), cmd(2)], Some(9));
        assert_eq!(history.pointer(), 1);

        history.replace(vec![cmd(1)], Some(-4));
        assert_eq!(history.pointer(), -1);
        assert!(history.can_redo());

        history.replace(Vec::new(), None);
        assert_eq!(history.pointer(), -1);
    }

    #[test]
    fn clear_resets_pointer() {
        let mut history = History::default();
        history.push(cmd(1));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.pointer(), -1);
        assert!(!history.can_undo());
    }
}
