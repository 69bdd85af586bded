use crate::segments::CellKey;
use crate::view::notify::emit_after;
use crate::view::{Highlight, UiSink, UiUpdate, NOTIFICATION_TTL};
use std::sync::Arc;

/// Colours a cell after a save attempt and clears it once the toast
/// lifetime has passed.
pub(crate) fn flash(sink: &Arc<dyn UiSink>, cell: CellKey, highlight: Highlight) {
    sink.emit(UiUpdate::CellHighlight { cell, highlight });
    emit_after(
        sink.clone(),
        NOTIFICATION_TTL,
        UiUpdate::CellHighlightCleared { cell },
    );
}
