//! Consumer-side view state for the order book screen.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::replica::types::{display_value, field, value_to_decimal};
use crate::replica::{
    AnomalyReport, ChangeSet, Entry, EntryKey, Fields, MutationKind, OrderBookReplica,
    ReplicaSnapshot,
};

/// Book table columns; `Key` is the decoded entry key.
pub const BOOK_COLUMNS: [&str; 6] = [
    "Key",
    field::ORDER_PRC,
    field::ORDER_SIDE,
    field::ACC_SIZE,
    field::NO_ORD,
    field::LV_TIM_MS,
];

/// Summary fields shown above the book.
pub const SUMMARY_COLUMNS: [&str; 5] = [
    field::DSPLY_NAME,
    field::CURRENCY,
    field::TIMACT_MS,
    field::SEQNUM,
    field::RDN_EXCHD2,
];

/// Index of `LV_TIM_MS` in [`BOOK_COLUMNS`].
const DEFAULT_SORT_COLUMN: usize = 5;

/// Feed connection state as seen by the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
    Connecting,
    Streaming,
    Closed(Option<String>),
}

impl FeedStatus {
    pub fn label(&self) -> String {
        match self {
            FeedStatus::Connecting => "Connecting".to_string(),
            FeedStatus::Streaming => "Streaming".to_string(),
            FeedStatus::Closed(None) => "Feed closed".to_string(),
            FeedStatus::Closed(Some(reason)) => format!("Feed closed: {reason}"),
        }
    }
}

/// Active sort column and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub column: usize,
    pub reverse: bool,
}

impl Default for SortState {
    /// Most recently updated level first.
    fn default() -> Self {
        Self {
            column: DEFAULT_SORT_COLUMN,
            reverse: true,
        }
    }
}

/// Central view state container.
pub struct App {
    /// Instrument being displayed.
    pub ric: String,
    /// Rows copied from the latest replica snapshot.
    pub rows: HashMap<EntryKey, Entry>,
    /// Summary values; fields persist until overwritten.
    pub summary: Fields,
    pub sort: SortState,
    /// Keys touched by the most recent non-empty cycle.
    pub highlighted: HashSet<EntryKey>,
    highlight_until: Option<Instant>,
    highlight_for: Duration,

    pub book_complete: bool,
    pub entry_count: usize,
    pub queue_depth: usize,
    pub anomalies: AnomalyReport,
    pub feed_status: FeedStatus,
    /// The initial refresh did not complete within the configured deadline.
    pub refresh_timed_out: bool,

    /// Set whenever visible state changes; the draw loop takes it.
    pub needs_redraw: bool,
    /// Flag to signal application should quit.
    pub should_quit: bool,
}

impl App {
    pub fn new(ric: &str, highlight_for: Duration) -> Self {
        Self {
            ric: ric.to_string(),
            rows: HashMap::new(),
            summary: Fields::new(),
            sort: SortState::default(),
            highlighted: HashSet::new(),
            highlight_until: None,
            highlight_for,
            book_complete: false,
            entry_count: 0,
            queue_depth: 0,
            anomalies: AnomalyReport::default(),
            feed_status: FeedStatus::Connecting,
            refresh_timed_out: false,
            needs_redraw: true,
            should_quit: false,
        }
    }

    /// Asks the draw loop to render the next frame.
    pub fn request_redraw(&mut self) {
        self.needs_redraw = true;
    }

    /// Returns whether a redraw is due and clears the request.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.needs_redraw)
    }

    /// Runs one consumption cycle and expires stale highlights.
    ///
    /// The view is only rebuilt when the replica reports itself dirty; the
    /// snapshot taken to rebuild it clears that flag, so an idle feed causes
    /// no further redraws.
    pub fn on_tick(&mut self, replica: &mut OrderBookReplica, now: Instant) {
        let change_set = replica.drain_and_apply();
        self.update_status(&change_set);

        if change_set.dirty {
            let snapshot = replica.snapshot();
            self.apply_cycle(&change_set, snapshot, now);
        }

        if self.highlight_until.is_some_and(|until| now >= until) {
            self.highlighted.clear();
            self.highlight_until = None;
            self.needs_redraw = true;
        }
    }

    /// Folds one dirty cycle into the view: rows come from the snapshot,
    /// highlights and summary values from the change set.
    pub fn apply_cycle(&mut self, change_set: &ChangeSet, snapshot: ReplicaSnapshot, now: Instant) {
        self.rows = snapshot.entries;

        if !change_set.changes.is_empty() {
            self.highlighted.clear();
            for change in &change_set.changes {
                match change.kind {
                    MutationKind::Delete => {
                        self.highlighted.remove(&change.key);
                    }
                    MutationKind::Add | MutationKind::Update => {
                        if self.rows.contains_key(&change.key) {
                            self.highlighted.insert(change.key.clone());
                        }
                    }
                }
            }
            self.highlight_until = Some(now + self.highlight_for);
        }

        for (name, value) in change_set.touched_summary_fields() {
            self.summary.insert(name.to_string(), value.clone());
        }

        self.needs_redraw = true;
    }

    fn update_status(&mut self, change_set: &ChangeSet) {
        let changed = self.book_complete != change_set.book_complete
            || self.entry_count != change_set.entry_count
            || self.queue_depth != change_set.queue_depth
            || self.anomalies != change_set.anomalies;

        self.book_complete = change_set.book_complete;
        self.entry_count = change_set.entry_count;
        self.queue_depth = change_set.queue_depth;
        self.anomalies = change_set.anomalies;
        if changed {
            self.needs_redraw = true;
        }
    }

    /// Selects a sort column; selecting the active column flips direction.
    pub fn select_sort_column(&mut self, column: usize) {
        if column >= BOOK_COLUMNS.len() {
            return;
        }
        if self.sort.column == column {
            self.sort.reverse = !self.sort.reverse;
        } else {
            self.sort = SortState {
                column,
                reverse: false,
            };
        }
        self.needs_redraw = true;
    }

    /// Rows in display order.
    pub fn sorted_rows(&self) -> Vec<&Entry> {
        let mut rows: Vec<&Entry> = self.rows.values().collect();
        let column = BOOK_COLUMNS[self.sort.column];

        rows.sort_by(|a, b| {
            let ordering = compare_column(a, b, column).then_with(|| a.key.cmp(&b.key));
            if self.sort.reverse {
                ordering.reverse()
            } else {
                ordering
            }
        });
        rows
    }

    /// Cell text for one row and column.
    pub fn cell(entry: &Entry, column: &str) -> String {
        if column == BOOK_COLUMNS[0] {
            entry.key.to_string()
        } else {
            entry.display_field(column)
        }
    }

    pub fn summary_cell(&self, column: &str) -> String {
        self.summary.get(column).map(display_value).unwrap_or_default()
    }
}

/// Numeric comparison when both sides are numbers, text otherwise.
fn compare_column(a: &Entry, b: &Entry, column: &str) -> Ordering {
    if column == BOOK_COLUMNS[0] {
        return a.key.cmp(&b.key);
    }

    let left = a.field(column);
    let right = b.field(column);
    match (
        left.and_then(value_to_decimal),
        right.and_then(value_to_decimal),
    ) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => App::cell(a, column).cmp(&App::cell(b, column)),
    }
}
