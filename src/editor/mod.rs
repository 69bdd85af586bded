// src/editor/mod.rs
// Inline Cell Editor - one open cell at a time, committed as a single
// field patch through the segment store

mod feedback;

use crate::segments::{CellKey, FieldValue, SegmentStore, TableError};
use crate::view::{ActivityLevel, Highlight, Reporter, UiSink, UiUpdate};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKey {
    Enter { shift: bool },
    Escape,
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyOutcome {
    /// Shift+Enter in a multi-line cell
    Newline,
    Committed(Result<FieldValue, TableError>),
    Cancelled,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellPhase {
    Display,
    Editing,
    Saving,
}

#[derive(Debug, Clone)]
struct EditSession {
    cell: CellKey,
    original: String,
    buffer: String,
}

/// Text typed by the user that failed to save; shown until the table moves
/// to a newer revision.
#[derive(Debug, Clone)]
struct Unsaved {
    revision: u64,
    text: String,
}

pub struct CellEditor {
    store: SegmentStore,
    reporter: Reporter,
    sink: Arc<dyn UiSink>,
    session: Mutex<Option<EditSession>>,
    saving: Mutex<Option<CellKey>>,
    unsaved: Mutex<HashMap<CellKey, Unsaved>>,
}

impl CellEditor {
    pub fn new(store: SegmentStore, reporter: Reporter) -> Self {
        let sink = reporter.sink();
        Self {
            store,
            reporter,
            sink,
            session: Mutex::new(None),
            saving: Mutex::new(None),
            unsaved: Mutex::new(HashMap::new()),
        }
    }

    pub fn phase(&self, cell: CellKey) -> CellPhase {
        let editing = self
            .session
            .lock()
            .map(|s| s.as_ref().map(|s| s.cell) == Some(cell))
            .unwrap_or(false);
        if editing {
            return CellPhase::Editing;
        }
        let saving = self.saving.lock().map(|s| *s == Some(cell)).unwrap_or(false);
        if saving {
            CellPhase::Saving
        } else {
            CellPhase::Display
        }
    }

    pub fn active_cell(&self) -> Option<CellKey> {
        self.session
            .lock()
            .ok()
            .and_then(|s| s.as_ref().map(|s| s.cell))
    }

    /// Opens `cell`. A different open cell is saved first.
    pub async fn begin_edit(&self, cell: CellKey) -> Result<(), TableError> {
        if !cell.field.is_editable() {
            return Err(TableError::Validation(format!(
                "{} is read-only",
                cell.field
            )));
        }
        if self.active_cell() == Some(cell) {
            return Ok(());
        }

        if let Some(previous) = self.take_session() {
            tracing::debug!("Forcing save of {:?} before editing {:?}", previous.cell, cell);
            let _ = self.save(previous).await;
        }

        let original = self.display_text(cell).await?;
        self.store.lock().await.set_editing(Some(cell));
        if let Ok(mut session) = self.session.lock() {
            *session = Some(EditSession {
                cell,
                buffer: original.clone(),
                original,
            });
        }
        Ok(())
    }

    /// Replaces the text of the open cell.
    pub fn input(&self, text: &str) {
        let cell = match self.session.lock() {
            Ok(mut guard) => match guard.as_mut() {
                Some(session) => {
                    session.buffer = text.to_string();
                    session.cell
                }
                None => return,
            },
            Err(_) => return,
        };
        self.sink.emit(UiUpdate::CellText {
            cell,
            text: text.to_string(),
        });
    }

    pub async fn key(&self, key: EditKey) -> KeyOutcome {
        let Some(cell) = self.active_cell() else {
            return KeyOutcome::Ignored;
        };

        match key {
            EditKey::Enter { shift: true } if cell.field.is_multiline() => {
                let text = match self.session.lock() {
                    Ok(mut guard) => match guard.as_mut() {
                        Some(session) => {
                            session.buffer.push('\n');
                            session.buffer.clone()
                        }
                        None => return KeyOutcome::Ignored,
                    },
                    Err(_) => return KeyOutcome::Ignored,
                };
                self.sink.emit(UiUpdate::CellText { cell, text });
                KeyOutcome::Newline
            }
            EditKey::Enter { .. } => match self.commit().await {
                Some(result) => KeyOutcome::Committed(result),
                None => KeyOutcome::Ignored,
            },
            EditKey::Escape => {
                if self.cancel().await {
                    KeyOutcome::Cancelled
                } else {
                    KeyOutcome::Ignored
                }
            }
        }
    }

    pub async fn blur(&self) -> Option<Result<FieldValue, TableError>> {
        self.commit().await
    }

    /// Saves the open cell. `None` when nothing was open.
    pub async fn commit(&self) -> Option<Result<FieldValue, TableError>> {
        let session = self.take_session()?;
        Some(self.save(session).await)
    }

    /// Restores the pre-edit text verbatim. No request is made.
    pub async fn cancel(&self) -> bool {
        let Some(session) = self.take_session() else {
            return false;
        };
        self.release(session.cell).await;
        self.sink.emit(UiUpdate::CellText {
            cell: session.cell,
            text: session.original,
        });
        true
    }

    /// Drops the open cell and any unsaved text without saving. Used when
    /// the table is thrown away.
    pub async fn discard(&self) {
        if let Some(session) = self.take_session() {
            tracing::debug!("Discarding edit of {:?}", session.cell);
        }
        if let Ok(mut unsaved) = self.unsaved.lock() {
            unsaved.clear();
        }
        self.store.lock().await.set_editing(None);
    }

    /// What the cell shows outside editing.
    pub async fn display_text(&self, cell: CellKey) -> Result<String, TableError> {
        if let Ok(guard) = self.session.lock() {
            if let Some(session) = guard.as_ref().filter(|s| s.cell == cell) {
                return Ok(session.buffer.clone());
            }
        }

        let table = self.store.lock().await;
        if let Some(unsaved) = self.unsaved.lock().ok().and_then(|m| m.get(&cell).cloned()) {
            if unsaved.revision == table.revision() {
                return Ok(unsaved.text);
            }
        }
        table
            .get(cell.sequence)
            .map(|segment| segment.field_text(cell.field))
            .ok_or(TableError::NotFound(cell.sequence))
    }

    fn take_session(&self) -> Option<EditSession> {
        self.session.lock().ok().and_then(|mut s| s.take())
    }

    async fn save(&self, session: EditSession) -> Result<FieldValue, TableError> {
        let cell = session.cell;
        if let Ok(mut saving) = self.saving.lock() {
            *saving = Some(cell);
        }

        let result = self
            .store
            .patch_field(cell.sequence, cell.field, &session.buffer)
            .await;

        if let Ok(mut saving) = self.saving.lock() {
            *saving = None;
        }
        self.release(cell).await;

        match &result {
            Ok(value) => {
                if let Ok(mut unsaved) = self.unsaved.lock() {
                    unsaved.remove(&cell);
                }
                self.sink.emit(UiUpdate::CellText {
                    cell,
                    text: session.buffer.trim().to_string(),
                });
                feedback::flash(&self.sink, cell, Highlight::Success);
                let message = format!("Segment {} {} updated", cell.sequence, cell.field);
                tracing::info!("{} ({:?})", message, value);
                self.reporter.activity().push(ActivityLevel::Info, &message);
            }
            Err(e) => {
                let revision = self.store.lock().await.revision();
                if let Ok(mut unsaved) = self.unsaved.lock() {
                    unsaved.insert(
                        cell,
                        Unsaved {
                            revision,
                            text: session.buffer.clone(),
                        },
                    );
                }
                feedback::flash(&self.sink, cell, Highlight::Error(e.to_string()));
                self.reporter.error(
                    &format!("Saving segment {} {} failed", cell.sequence, cell.field),
                    e,
                );
            }
        }
        result
    }

    async fn release(&self, cell: CellKey) {
        let mut table = self.store.lock().await;
        if table.editing() == Some(cell) {
            table.set_editing(None);
        }
    }
}
