// src/segments/mod.rs
// Segment Table Model - client-side mirror of the server's segment list

mod segment;
pub mod srt;
mod types;

pub use segment::{
    FieldValue, RatioBand, Segment, SegmentField, DEFAULT_SPEED, MAX_SPEED, MIN_SPEED,
};
pub use types::TableError;

use crate::gateway::ServerApi;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex as TokioMutex, MutexGuard};

pub const PLACEHOLDER_TEXT: &str = "No segments yet. Upload a video or import an SRT file.";

/// Address of one table cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub field: SegmentField,
    pub sequence: u32,
}

impl CellKey {
    pub fn new(field: SegmentField, sequence: u32) -> Self {
        Self { field, sequence }
    }
}

/// Identifiers a row hands out to its editable cells and action buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowBindings {
    pub cell_ids: BTreeMap<SegmentField, u32>,
    pub regenerate_target: u32,
    pub delete_target: u32,
}

impl RowBindings {
    fn for_sequence(sequence: u32) -> Self {
        Self {
            cell_ids: SegmentField::EDITABLE
                .iter()
                .map(|field| (*field, sequence))
                .collect(),
            regenerate_target: sequence,
            delete_target: sequence,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub segment: Segment,
    pub bindings: RowBindings,
}

impl TableRow {
    fn new(segment: Segment) -> Self {
        let bindings = RowBindings::for_sequence(segment.sequence);
        Self { segment, bindings }
    }

    fn rebind(&mut self) {
        self.bindings = RowBindings::for_sequence(self.segment.sequence);
    }
}

/// Synchronous yes/no question asked before a destructive action.
pub trait ConfirmGate {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> ConfirmGate for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellView {
    pub field: SegmentField,
    pub data_id: u32,
    pub text: String,
    pub editable: bool,
    pub audio_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub sequence: u32,
    pub cells: Vec<CellView>,
    pub ratio_band: Option<RatioBand>,
    pub regenerate_target: u32,
    pub delete_target: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableView {
    Placeholder(String),
    Rows(Vec<RowView>),
}

/// Ordered rows plus a revision that moves on every mutation.
#[derive(Debug, Default)]
pub struct SegmentTable {
    rows: Vec<TableRow>,
    revision: u64,
    editing: Option<CellKey>,
    /// Rows were inserted or deleted since the last server rebuild, so
    /// local sequences no longer name the server's rows.
    restructured: bool,
}

impl SegmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn segments(&self) -> Vec<Segment> {
        self.rows.iter().map(|row| row.segment.clone()).collect()
    }

    pub fn get(&self, sequence: u32) -> Option<&Segment> {
        self.rows
            .iter()
            .find(|row| row.segment.sequence == sequence)
            .map(|row| &row.segment)
    }

    /// Cell currently open in the editor, if any
    pub fn editing(&self) -> Option<CellKey> {
        self.editing
    }

    pub fn set_editing(&mut self, cell: Option<CellKey>) {
        self.editing = cell;
    }

    pub fn is_restructured(&self) -> bool {
        self.restructured
    }

    /// The server now holds the local rows as of `revision`. Later
    /// mutations keep the table marked.
    pub fn mark_saved(&mut self, revision: u64) {
        if self.revision == revision {
            self.restructured = false;
        }
    }

    /// Full rebuild from a server snapshot or import, in array order.
    pub fn replace_all(&mut self, segments: Vec<Segment>) {
        self.rows = segments.into_iter().map(TableRow::new).collect();
        self.restructured = false;
        self.bump();
    }

    /// Poll rebuild. The cell under edit keeps its local value until the
    /// editor releases it.
    pub fn merge_snapshot(&mut self, segments: Vec<Segment>) {
        let Some(cell) = self.editing else {
            self.replace_all(segments);
            return;
        };

        let local = self.get(cell.sequence).cloned();
        let mut rows: Vec<TableRow> = segments.into_iter().map(TableRow::new).collect();

        match local {
            Some(local) => {
                if let Some(row) = rows.iter_mut().find(|r| r.segment.sequence == cell.sequence) {
                    if let Ok(value) = cell.field.coerce(&local.field_text(cell.field)) {
                        row.segment.apply(&value);
                        row.rebind();
                    }
                    tracing::debug!(
                        "Rebuild kept local {} of segment {} while editing",
                        cell.field,
                        cell.sequence
                    );
                } else {
                    tracing::warn!(
                        "Segment {} under edit is gone from the server snapshot",
                        cell.sequence
                    );
                }
            }
            None => {
                tracing::warn!("Editing cell {:?} has no local row", cell);
            }
        }

        self.rows = rows;
        self.restructured = false;
        self.bump();
    }

    /// Validates and applies a field locally. The model is untouched when
    /// validation fails.
    pub fn apply_local(
        &mut self,
        sequence: u32,
        field: SegmentField,
        raw: &str,
    ) -> Result<FieldValue, TableError> {
        let value = field.coerce(raw)?;

        if let FieldValue::Sequence(new_sequence) = value {
            let taken = new_sequence != sequence
                && self.rows.iter().any(|r| r.segment.sequence == new_sequence);
            if taken {
                return Err(TableError::Validation(format!(
                    "sequence {} is already in use",
                    new_sequence
                )));
            }
        }

        let row = self
            .rows
            .iter_mut()
            .find(|row| row.segment.sequence == sequence)
            .ok_or(TableError::NotFound(sequence))?;
        row.segment.apply(&value);
        row.rebind();
        self.bump();
        Ok(value)
    }

    /// Inserts a blank row after `after` (or at the end) and renumbers.
    /// Returns the new row's sequence.
    pub fn insert_row(&mut self, after: Option<u32>) -> Result<u32, TableError> {
        let index = match after {
            Some(sequence) => {
                self.position(sequence)
                    .ok_or(TableError::NotFound(sequence))?
                    + 1
            }
            None => self.rows.len(),
        };

        let mut segment = Segment::new(0);
        if let Some(prev) = index.checked_sub(1).and_then(|i| self.rows.get(i)) {
            let (_, end) = srt::parse_timestamp(&prev.segment.timestamp);
            segment.timestamp = format!("{:.2}-{:.2}", end, end);
            segment.voice_id = prev.segment.voice_id.clone();
        }

        self.rows.insert(index, TableRow::new(segment));
        self.restructured = true;
        self.renumber();
        Ok(index as u32 + 1)
    }

    /// Removes a row after confirmation. Returns false when declined.
    pub fn delete_row(&mut self, sequence: u32, gate: &dyn ConfirmGate) -> Result<bool, TableError> {
        let index = self
            .position(sequence)
            .ok_or(TableError::NotFound(sequence))?;

        if !gate.confirm(&format!("Delete segment {}?", sequence)) {
            tracing::info!("Deletion of segment {} declined", sequence);
            return Ok(false);
        }

        self.rows.remove(index);
        self.restructured = true;
        if self.editing.map(|c| c.sequence) == Some(sequence) {
            self.editing = None;
        }
        self.renumber();
        Ok(true)
    }

    pub fn render(&self) -> TableView {
        if self.rows.is_empty() {
            return TableView::Placeholder(PLACEHOLDER_TEXT.to_string());
        }

        let rows = self
            .rows
            .iter()
            .map(|row| RowView {
                sequence: row.segment.sequence,
                cells: SegmentField::COLUMNS
                    .iter()
                    .map(|field| CellView {
                        field: *field,
                        data_id: row
                            .bindings
                            .cell_ids
                            .get(field)
                            .copied()
                            .unwrap_or(row.segment.sequence),
                        text: row.segment.field_text(*field),
                        editable: field.is_editable(),
                        audio_path: row.segment.audio_for(*field).map(str::to_string),
                    })
                    .collect(),
                ratio_band: row.segment.ratio_band(),
                regenerate_target: row.bindings.regenerate_target,
                delete_target: row.bindings.delete_target,
            })
            .collect();
        TableView::Rows(rows)
    }

    fn position(&self, sequence: u32) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| row.segment.sequence == sequence)
    }

    /// Dense 1..N in display order, bindings follow.
    fn renumber(&mut self) {
        let mut editing = self.editing;
        for (idx, row) in self.rows.iter_mut().enumerate() {
            let sequence = idx as u32 + 1;
            if let Some(cell) = editing.as_mut() {
                if cell.sequence == row.segment.sequence {
                    cell.sequence = sequence;
                }
            }
            row.segment.sequence = sequence;
            row.rebind();
        }
        self.editing = editing;
        self.bump();
    }

    fn bump(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }
}

pub type SharedTable = Arc<TokioMutex<SegmentTable>>;

/// The table plus the server it reconciles with.
#[derive(Clone)]
pub struct SegmentStore {
    table: SharedTable,
    api: Arc<dyn ServerApi>,
}

impl SegmentStore {
    pub fn new(api: Arc<dyn ServerApi>) -> Self {
        Self {
            table: Arc::new(TokioMutex::new(SegmentTable::new())),
            api,
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, SegmentTable> {
        self.table.lock().await
    }

    pub async fn replace_all(&self, segments: Vec<Segment>) {
        self.table.lock().await.replace_all(segments);
    }

    pub async fn merge_snapshot(&self, segments: Vec<Segment>) -> u64 {
        let mut table = self.table.lock().await;
        table.merge_snapshot(segments);
        table.revision()
    }

    /// Validates, applies locally, then read-modify-writes the whole
    /// collection on the server. After a local insert or delete the local
    /// rows are posted instead, since their sequences no longer line up
    /// with the server's.
    pub async fn patch_field(
        &self,
        sequence: u32,
        field: SegmentField,
        raw: &str,
    ) -> Result<FieldValue, TableError> {
        let (value, local) = {
            let mut table = self.table.lock().await;
            let value = table.apply_local(sequence, field, raw)?;
            let local = table
                .is_restructured()
                .then(|| (table.revision(), table.segments()));
            (value, local)
        };

        if let Some((revision, segments)) = local {
            self.api.save_segments(&segments).await?;
            self.table.lock().await.mark_saved(revision);
            tracing::info!(
                "Segment {} {} saved with {} restructured rows",
                sequence,
                field,
                segments.len()
            );
            return Ok(value);
        }

        let snapshot = self.api.fetch_snapshot().await?;
        let mut segments = snapshot.segments;
        let target = segments
            .iter_mut()
            .find(|segment| segment.sequence == sequence)
            .ok_or_else(|| {
                tracing::warn!("Segment {} vanished on the server before save", sequence);
                TableError::NotFound(sequence)
            })?;
        target.apply(&value);

        self.api.save_segments(&segments).await?;
        tracing::info!("Segment {} {} saved", sequence, field);
        Ok(value)
    }

    pub async fn insert_row(&self, after: Option<u32>) -> Result<u32, TableError> {
        self.table.lock().await.insert_row(after)
    }

    pub async fn delete_row(
        &self,
        sequence: u32,
        gate: &(dyn ConfirmGate + Sync),
    ) -> Result<bool, TableError> {
        self.table.lock().await.delete_row(sequence, gate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::FakeServer;
    use crate::gateway::GatewayError;

    fn segments(n: u32) -> Vec<Segment> {
        (1..=n)
            .map(|seq| {
                let mut s = Segment::new(seq);
                s.timestamp = format!("{}.0-{}.0", seq - 1, seq);
                s.translated_text = format!("line {}", seq);
                s
            })
            .collect()
    }

    fn assert_dense(table: &SegmentTable) {
        for (idx, row) in table.rows().iter().enumerate() {
            let expected = idx as u32 + 1;
            assert_eq!(row.segment.sequence, expected);
            assert!(row.bindings.cell_ids.values().all(|id| *id == expected));
            assert_eq!(row.bindings.regenerate_target, expected);
            assert_eq!(row.bindings.delete_target, expected);
        }
        if let TableView::Rows(rows) = table.render() {
            for row in rows {
                assert!(row.cells.iter().all(|c| c.data_id == row.sequence));
            }
        }
    }

    #[test]
    fn test_empty_replace_renders_placeholder() {
        let mut table = SegmentTable::new();
        table.replace_all(Vec::new());
        assert_eq!(
            table.render(),
            TableView::Placeholder(PLACEHOLDER_TEXT.to_string())
        );

        table.replace_all(segments(2));
        match table.render() {
            TableView::Rows(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[1].cells[4].text, "line 2");
            }
            other => panic!("expected rows, got {:?}", other),
        }
    }

    #[test]
    fn test_insert_delete_keeps_sequences_dense() {
        let mut table = SegmentTable::new();
        table.replace_all(segments(3));
        let yes = |_: &str| true;

        // Deterministic mix of inserts and deletes at varying positions
        let mut state: u64 = 0x2545_f491;
        for _ in 0..200 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let len = table.len() as u64;
            let pick = (if len == 0 { 0 } else { (state >> 33) % len }) as u32 + 1;
            if state % 3 == 0 && !table.is_empty() {
                assert!(table.delete_row(pick, &yes).unwrap());
            } else if state % 2 == 0 && !table.is_empty() {
                table.insert_row(Some(pick)).unwrap();
            } else {
                table.insert_row(None).unwrap();
            }
            assert_dense(&table);
        }
    }

    #[test]
    fn test_insert_after_returns_new_sequence() {
        let mut table = SegmentTable::new();
        table.replace_all(segments(3));
        let inserted = table.insert_row(Some(1)).unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(table.get(2).unwrap().timestamp, "1.00-1.00");
        assert_eq!(table.get(3).unwrap().translated_text, "line 2");
        assert_eq!(table.insert_row(Some(42)), Err(TableError::NotFound(42)));
    }

    #[test]
    fn test_declined_delete_is_noop() {
        let mut table = SegmentTable::new();
        table.replace_all(segments(3));
        let revision = table.revision();
        let no = |_: &str| false;
        assert!(!table.delete_row(2, &no).unwrap());
        assert_eq!(table.len(), 3);
        assert_eq!(table.revision(), revision);
    }

    #[test]
    fn test_invalid_speed_leaves_model_unchanged() {
        let mut table = SegmentTable::new();
        table.replace_all(segments(2));
        let before = table.segments();
        let revision = table.revision();

        let err = table.apply_local(1, SegmentField::Speed, "2.5").unwrap_err();
        assert!(matches!(err, TableError::Validation(_)));
        assert_eq!(table.segments(), before);
        assert_eq!(table.revision(), revision);

        table.apply_local(1, SegmentField::Speed, "0.5").unwrap();
        table.apply_local(2, SegmentField::Speed, "2.0").unwrap();
        assert_eq!(table.get(1).unwrap().speed, 0.5);
        assert_eq!(table.get(2).unwrap().speed, 2.0);
    }

    #[test]
    fn test_sequence_edit_rejects_duplicates() {
        let mut table = SegmentTable::new();
        table.replace_all(segments(3));
        assert!(table.apply_local(1, SegmentField::Sequence, "3").is_err());
        table.apply_local(3, SegmentField::Sequence, "9").unwrap();
        let row = &table.rows()[2];
        assert_eq!(row.segment.sequence, 9);
        assert_eq!(row.bindings.regenerate_target, 9);
    }

    #[test]
    fn test_merge_snapshot_keeps_editing_cell() {
        let mut table = SegmentTable::new();
        table.replace_all(segments(2));
        table
            .apply_local(2, SegmentField::TranslatedText, "local draft")
            .unwrap();
        table.set_editing(Some(CellKey::new(SegmentField::TranslatedText, 2)));

        let mut server = segments(2);
        server[0].translated_text = "server one".into();
        server[1].translated_text = "server two".into();
        table.merge_snapshot(server.clone());

        assert_eq!(table.get(1).unwrap().translated_text, "server one");
        assert_eq!(table.get(2).unwrap().translated_text, "local draft");

        table.set_editing(None);
        table.merge_snapshot(server);
        assert_eq!(table.get(2).unwrap().translated_text, "server two");
    }

    #[tokio::test]
    async fn test_patch_field_read_modify_writes_whole_collection() {
        let server = Arc::new(FakeServer::with_segments(segments(3)));
        let store = SegmentStore::new(server.clone());
        store.replace_all(segments(3)).await;

        store
            .patch_field(2, SegmentField::TranslatedText, " Hola ")
            .await
            .unwrap();

        let saved = server.saved_collections();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].len(), 3);
        assert_eq!(saved[0][1].translated_text, "Hola");
        assert_eq!(saved[0][0].translated_text, "line 1");
        assert_eq!(
            store.lock().await.get(2).unwrap().translated_text,
            "Hola"
        );
    }

    #[tokio::test]
    async fn test_patch_field_reports_vanished_segment() {
        let server = Arc::new(FakeServer::with_segments(segments(1)));
        let store = SegmentStore::new(server.clone());
        store.replace_all(segments(2)).await;

        let err = store
            .patch_field(2, SegmentField::VoiceId, "voice_2")
            .await
            .unwrap_err();
        assert_eq!(err, TableError::NotFound(2));
        assert!(server.saved_collections().is_empty());
    }

    #[tokio::test]
    async fn test_patch_after_insert_posts_local_rows() {
        let server = Arc::new(FakeServer::with_segments(segments(3)));
        let store = SegmentStore::new(server.clone());
        store.replace_all(segments(3)).await;

        let inserted = store.insert_row(Some(1)).await.unwrap();
        assert_eq!(inserted, 2);
        assert!(store.lock().await.is_restructured());

        store
            .patch_field(inserted, SegmentField::TranslatedText, "inserted text")
            .await
            .unwrap();

        let texts: Vec<String> = server
            .segments()
            .into_iter()
            .map(|s| s.translated_text)
            .collect();
        assert_eq!(texts, ["line 1", "inserted text", "line 2", "line 3"]);
        let sequences: Vec<u32> = server.segments().iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, [1, 2, 3, 4]);
        assert_eq!(server.calls_to("fetch_snapshot"), 0);
        assert!(!store.lock().await.is_restructured());

        // Back in step: the next edit is a plain read-modify-write again.
        store
            .patch_field(4, SegmentField::VoiceId, "voice_9")
            .await
            .unwrap();
        assert_eq!(server.calls_to("fetch_snapshot"), 1);
        assert_eq!(server.segments()[3].voice_id, "voice_9");
        assert_eq!(server.segments()[2].translated_text, "line 2");
    }

    #[tokio::test]
    async fn test_patch_after_delete_keeps_other_rows() {
        let server = Arc::new(FakeServer::with_segments(segments(3)));
        let store = SegmentStore::new(server.clone());
        store.replace_all(segments(3)).await;

        assert!(store.delete_row(1, &|_: &str| true).await.unwrap());
        store
            .patch_field(1, SegmentField::TranslatedText, "line 2 fixed")
            .await
            .unwrap();

        let texts: Vec<String> = server
            .segments()
            .into_iter()
            .map(|s| s.translated_text)
            .collect();
        assert_eq!(texts, ["line 2 fixed", "line 3"]);
    }

    #[tokio::test]
    async fn test_failed_restructured_save_stays_marked() {
        let server = Arc::new(FakeServer::with_segments(segments(2)));
        let store = SegmentStore::new(server.clone());
        store.replace_all(segments(2)).await;
        store.insert_row(None).await.unwrap();

        server.fail_next("save_segments", GatewayError::Timeout);
        let err = store
            .patch_field(3, SegmentField::TranslatedText, "tail")
            .await
            .unwrap_err();
        assert!(matches!(err, TableError::Gateway(_)));
        assert!(store.lock().await.is_restructured());
    }

    #[tokio::test]
    async fn test_invalid_patch_sends_nothing() {
        let server = Arc::new(FakeServer::with_segments(segments(1)));
        let store = SegmentStore::new(server.clone());
        store.replace_all(segments(1)).await;

        let err = store
            .patch_field(1, SegmentField::Speed, "0.1")
            .await
            .unwrap_err();
        assert!(matches!(err, TableError::Validation(_)));
        assert_eq!(server.request_count(), 0);
    }
}
