//! Bounded command history.

/// A reversible mutation of some target.
///
/// `execute` may capture whatever it needs to reverse itself; `undo` is
/// only called after a successful `execute` and must leave the target as
/// it was before that call.
pub trait Command<T> {
    type Error;

    fn execute(&mut self, target: &mut T) -> Result<(), Self::Error>;

    fn undo(&mut self, target: &mut T) -> Result<(), Self::Error>;
}

/// Undo stack with a cursor.
///
/// Commands before the cursor are applied, commands at or after it form
/// the redo branch.
#[derive(Debug, Clone)]
pub struct UndoEngine<C> {
    commands: Vec<C>,
    cursor: usize,
    cap: usize,
}

impl<C> UndoEngine<C> {
    pub fn new(cap: usize) -> Self {
        Self {
            commands: Vec::new(),
            cursor: 0,
            cap: cap.max(1),
        }
    }

    /// Execute `command` and record it.
    ///
    /// On failure nothing is recorded and the redo branch survives.
    pub fn push<T>(&mut self, mut command: C, target: &mut T) -> Result<(), <C as Command<T>>::Error>
    where
        C: Command<T>,
    {
        command.execute(target)?;
        self.commands.truncate(self.cursor);
        self.commands.push(command);
        if self.commands.len() > self.cap {
            let excess = self.commands.len() - self.cap;
            self.commands.drain(..excess);
        }
        self.cursor = self.commands.len();
        Ok(())
    }

    /// Reverse the most recent applied command.
    ///
    /// Returns `Ok(false)` when there is nothing to undo.
    pub fn undo<T>(&mut self, target: &mut T) -> Result<bool, <C as Command<T>>::Error>
    where
        C: Command<T>,
    {
        if self.cursor == 0 {
            return Ok(false);
        }
        self.commands[self.cursor - 1].undo(target)?;
        self.cursor -= 1;
        Ok(true)
    }

    /// Re-apply the next command of the redo branch.
    ///
    /// Returns `Ok(false)` when there is nothing to redo.
    pub fn redo<T>(&mut self, target: &mut T) -> Result<bool, <C as Command<T>>::Error>
    where
        C: Command<T>,
    {
        if self.cursor == self.commands.len() {
            return Ok(false);
        }
        self.commands[self.cursor].execute(target)?;
        self.cursor += 1;
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.commands.len()
    }

    /// Number of applied commands.
    pub fn undo_depth(&self) -> usize {
        self.cursor
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Forget all history.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Adds a value to a counter; refuses to go negative.
    struct Add(i32);

    impl Command<i32> for Add {
        type Error = String;

        fn execute(&mut self, target: &mut i32) -> Result<(), String> {
            if *target + self.0 < 0 {
                return Err("negative".to_string());
            }
            *target += self.0;
            Ok(())
        }

        fn undo(&mut self, target: &mut i32) -> Result<(), String> {
            *target -= self.0;
            Ok(())
        }
    }

    #[test]
    fn test_undo_redo() {
        let mut engine = UndoEngine::new(50);
        let mut value: i32 = 0;
        engine.push(Add(1), &mut value).unwrap();
        engine.push(Add(10), &mut value).unwrap();
        assert_eq!(value, 11);

        assert!(engine.undo(&mut value).unwrap());
        assert_eq!(value, 1);
        assert!(engine.redo(&mut value).unwrap());
        assert_eq!(value, 11);
        assert!(!engine.redo(&mut value).unwrap());
    }

    #[test]
    fn test_undo_on_empty_is_noop() {
        let mut engine: UndoEngine<Add> = UndoEngine::new(50);
        let mut value: i32 = 5;
        assert!(!engine.undo(&mut value).unwrap());
        assert_eq!(value, 5);
        assert!(!engine.can_undo());
    }

    #[test]
    fn test_push_truncates_redo_branch() {
        let mut engine = UndoEngine::new(50);
        let mut value: i32 = 0;
        engine.push(Add(1), &mut value).unwrap();
        engine.push(Add(2), &mut value).unwrap();
        engine.undo(&mut value).unwrap();
        assert!(engine.can_redo());

        engine.push(Add(100), &mut value).unwrap();
        assert!(!engine.can_redo());
        assert_eq!(value, 101);
    }

    #[test]
    fn test_failed_push_keeps_history() {
        let mut engine = UndoEngine::new(50);
        let mut value: i32 = 0;
        engine.push(Add(3), &mut value).unwrap();
        engine.undo(&mut value).unwrap();

        assert!(engine.push(Add(-1), &mut value).is_err());
        assert_eq!(value, 0);
        assert!(engine.can_redo());
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let mut engine = UndoEngine::new(3);
        let mut value: i32 = 0;
        for _ in 0..5 {
            engine.push(Add(1), &mut value).unwrap();
        }
        assert_eq!(engine.undo_depth(), 3);
        while engine.undo(&mut value).unwrap() {}
        assert_eq!(value, 2);
    }
}
