/// Replays parsed script commands against a counter and its history.
use std::sync::Arc;

use anyhow::{Context, Result};
use rewind_history::{HistoryConfig, HistoryEvent, UndoRedoEngine};

use crate::counter::Counter;
use crate::script::{Command, Line};

pub struct Session {
    counter: Arc<Counter>,
}

impl Session {
    pub fn new(config: HistoryConfig) -> Self {
        let engine = Arc::new(UndoRedoEngine::new(config));
        engine.subscribe(|event| match event {
            HistoryEvent::UndoAvailabilityChanged(available) => {
                tracing::info!("Undo available: {available}");
            }
            HistoryEvent::RedoAvailabilityChanged(available) => {
                tracing::info!("Redo available: {available}");
            }
            HistoryEvent::OperationEnded => tracing::info!("Operation ended"),
        });
        Self {
            counter: Counter::new(engine),
        }
    }

    pub fn value(&self) -> i64 {
        self.counter.value()
    }

    /// Runs every line, collecting the output of `print` commands.
    ///
    /// Stops at the first command the engine rejects.
    pub fn run(&self, lines: &[Line]) -> Result<Vec<String>> {
        let mut output = Vec::new();
        for line in lines {
            tracing::debug!("Line {}: {:?}", line.number, line.command);
            if let Some(text) = self
                .execute(line.command)
                .with_context(|| format!("line {} failed", line.number))?
            {
                output.push(text);
            }
        }
        Ok(output)
    }

    fn execute(&self, command: Command) -> Result<Option<String>> {
        let engine = self.counter.engine();
        match command {
            Command::Add {
                significance,
                delta,
            } => self.counter.add(significance, delta)?,
            Command::Set {
                significance,
                value,
            } => self.counter.set(significance, value),
            Command::NewOperation => engine.start_new_operation(),
            Command::BeginOperation => engine.set_operation_in_progress(true),
            Command::EndOperation => engine.set_operation_in_progress(false),
            Command::Extend => {
                if !engine.extend_current_operation() {
                    tracing::warn!("Nothing to extend");
                }
            }
            Command::Track(on) => engine.set_track_operations(on),
            Command::Undo => {
                if !engine.undo(true)? {
                    tracing::info!("Nothing to undo");
                }
            }
            Command::Redo => {
                if !engine.redo(true)? {
                    tracing::info!("Nothing to redo");
                }
            }
            Command::BeginUndo => {
                engine.begin_undo()?;
            }
            Command::EndUndo => engine.end_undo()?,
            Command::BeginRedo => {
                engine.begin_redo()?;
            }
            Command::EndRedo => engine.end_redo()?,
            Command::Clear => engine.clear_history(),
            Command::Print => return Ok(Some(self.status())),
        }
        Ok(None)
    }

    /// One-line summary of the document and its history.
    pub fn status(&self) -> String {
        let engine = self.counter.engine();
        format!(
            "value={} undo={} redo={} undo_depth={} redo_depth={} mode={}",
            self.counter.value(),
            engine.undo_available(),
            engine.redo_available(),
            engine.undo_depth(),
            engine.redo_depth(),
            engine.mode(),
        )
    }
}
