use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{Aggregate, AggregateRoot, CountSessionId, DomainError, ProductId};
use stockroom_events::Event;

/// Lifecycle of a count session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountStatus {
    Draft,
    InProgress,
    Completed,
}

impl CountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountStatus::Draft => "draft",
            CountStatus::InProgress => "in_progress",
            CountStatus::Completed => "completed",
        }
    }
}

/// One product's stock as captured when the session was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLine {
    pub product_id: ProductId,
    pub system_quantity: i64,
}

/// A product's snapshot plus its counted value. Owned by its session.
///
/// `difference` is always `counted_quantity - system_quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountItem {
    pub product_id: ProductId,
    pub system_quantity: i64,
    pub counted_quantity: i64,
    pub difference: i64,
    pub counted: bool,
    pub counted_at: Option<DateTime<Utc>>,
}

impl CountItem {
    fn from_snapshot(line: SnapshotLine) -> Self {
        Self {
            product_id: line.product_id,
            system_quantity: line.system_quantity,
            counted_quantity: 0,
            difference: -line.system_quantity,
            counted: false,
            counted_at: None,
        }
    }

    fn record(&mut self, counted_quantity: i64, at: DateTime<Utc>) {
        self.counted_quantity = counted_quantity;
        self.difference = counted_quantity - self.system_quantity;
        self.counted = true;
        self.counted_at = Some(at);
    }
}

/// Counted/total items and the net difference of counted items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountSummary {
    pub total_items: usize,
    pub counted_items: usize,
    pub net_difference: i64,
}

/// Aggregate root: CountSession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountSession {
    id: CountSessionId,
    name: String,
    notes: Option<String>,
    created_by: Option<String>,
    status: CountStatus,
    items: Vec<CountItem>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    stock_applied: bool,
    #[serde(default)]
    version: u64,
    #[serde(skip_serializing, default = "persisted")]
    created: bool,
}

fn persisted() -> bool {
    true
}

impl CountSession {
    /// Create an empty, not-yet-opened instance.
    pub fn empty(id: CountSessionId) -> Self {
        Self {
            id,
            name: String::new(),
            notes: None,
            created_by: None,
            status: CountStatus::Draft,
            items: Vec::new(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            completed_at: None,
            stock_applied: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> CountSessionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    pub fn status(&self) -> CountStatus {
        self.status
    }

    pub fn items(&self) -> &[CountItem] {
        &self.items
    }

    pub fn item(&self, product_id: ProductId) -> Option<&CountItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn stock_applied(&self) -> bool {
        self.stock_applied
    }

    pub fn is_completed(&self) -> bool {
        self.status == CountStatus::Completed
    }

    /// `(product, counted quantity)` for every explicitly counted item.
    ///
    /// Uncounted items are absent: a missing count is not a count of zero.
    pub fn reconciliation(&self) -> impl Iterator<Item = (ProductId, i64)> + '_ {
        self.items
            .iter()
            .filter(|i| i.counted)
            .map(|i| (i.product_id, i.counted_quantity))
    }

    /// Net difference saturates at the `i64` bounds.
    pub fn summary(&self) -> CountSummary {
        let counted = self.items.iter().filter(|i| i.counted);
        CountSummary {
            total_items: self.items.len(),
            counted_items: counted.clone().count(),
            net_difference: counted.fold(0i64, |acc, i| acc.saturating_add(i.difference)),
        }
    }
}

impl AggregateRoot for CountSession {
    type Id = CountSessionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenCountSession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenCountSession {
    pub session_id: CountSessionId,
    pub name: String,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub snapshot: Vec<SnapshotLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordCount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCount {
    pub session_id: CountSessionId,
    pub product_id: ProductId,
    pub counted_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteCountSession.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteCountSession {
    pub session_id: CountSessionId,
    pub apply_stock_updates: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountCommand {
    Open(OpenCountSession),
    RecordCount(RecordCount),
    Complete(CompleteCountSession),
}

/// Event: CountSessionOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountSessionOpened {
    pub session_id: CountSessionId,
    pub name: String,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub snapshot: Vec<SnapshotLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CountStarted (first recorded count moves draft to in-progress).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountStarted {
    pub session_id: CountSessionId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemCounted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCounted {
    pub session_id: CountSessionId,
    pub product_id: ProductId,
    pub counted_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CountSessionCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountSessionCompleted {
    pub session_id: CountSessionId,
    pub apply_stock_updates: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountEvent {
    Opened(CountSessionOpened),
    Started(CountStarted),
    ItemCounted(ItemCounted),
    Completed(CountSessionCompleted),
}

impl Event for CountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CountEvent::Opened(_) => "inventory.count.opened",
            CountEvent::Started(_) => "inventory.count.started",
            CountEvent::ItemCounted(_) => "inventory.count.item_counted",
            CountEvent::Completed(_) => "inventory.count.completed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CountEvent::Opened(e) => e.occurred_at,
            CountEvent::Started(e) => e.occurred_at,
            CountEvent::ItemCounted(e) => e.occurred_at,
            CountEvent::Completed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for CountSession {
    type Command = CountCommand;
    type Event = CountEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CountEvent::Opened(e) => {
                self.id = e.session_id;
                self.name = e.name.clone();
                self.notes = e.notes.clone();
                self.created_by = e.created_by.clone();
                self.status = CountStatus::Draft;
                self.items = e.snapshot.iter().copied().map(CountItem::from_snapshot).collect();
                self.created_at = e.occurred_at;
                self.completed_at = None;
                self.stock_applied = false;
                self.created = true;
            }
            CountEvent::Started(_) => {
                self.status = CountStatus::InProgress;
            }
            CountEvent::ItemCounted(e) => {
                if let Some(item) = self.items.iter_mut().find(|i| i.product_id == e.product_id) {
                    item.record(e.counted_quantity, e.occurred_at);
                }
            }
            CountEvent::Completed(e) => {
                self.status = CountStatus::Completed;
                self.completed_at = Some(e.occurred_at);
                self.stock_applied = e.apply_stock_updates;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CountCommand::Open(cmd) => self.handle_open(cmd),
            CountCommand::RecordCount(cmd) => self.handle_record(cmd),
            CountCommand::Complete(cmd) => self.handle_complete(cmd),
        }
    }
}

impl CountSession {
    fn ensure_exists(&self, session_id: CountSessionId) -> Result<(), DomainError> {
        if !self.created || self.id != session_id {
            return Err(DomainError::SessionNotFound(session_id));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenCountSession) -> Result<Vec<CountEvent>, DomainError> {
        if self.created {
            return Err(DomainError::validation("count session already exists"));
        }
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("session name cannot be empty"));
        }

        Ok(vec![CountEvent::Opened(CountSessionOpened {
            session_id: cmd.session_id,
            name: name.to_string(),
            notes: trimmed(&cmd.notes),
            created_by: trimmed(&cmd.created_by),
            snapshot: cmd.snapshot.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record(&self, cmd: &RecordCount) -> Result<Vec<CountEvent>, DomainError> {
        self.ensure_exists(cmd.session_id)?;
        if self.is_completed() {
            return Err(DomainError::SessionCompleted(self.id));
        }
        if self.item(cmd.product_id).is_none() {
            return Err(DomainError::ProductNotInSession {
                session_id: self.id,
                product_id: cmd.product_id,
            });
        }
        if cmd.counted_quantity < 0 {
            return Err(DomainError::InvalidQuantity(cmd.counted_quantity));
        }

        let mut events = Vec::with_capacity(2);
        if self.status == CountStatus::Draft {
            events.push(CountEvent::Started(CountStarted {
                session_id: self.id,
                occurred_at: cmd.occurred_at,
            }));
        }
        events.push(CountEvent::ItemCounted(ItemCounted {
            session_id: self.id,
            product_id: cmd.product_id,
            counted_quantity: cmd.counted_quantity,
            occurred_at: cmd.occurred_at,
        }));
        Ok(events)
    }

    fn handle_complete(&self, cmd: &CompleteCountSession) -> Result<Vec<CountEvent>, DomainError> {
        self.ensure_exists(cmd.session_id)?;
        if self.is_completed() {
            return Err(DomainError::AlreadyCompleted(self.id));
        }

        Ok(vec![CountEvent::Completed(CountSessionCompleted {
            session_id: self.id,
            apply_stock_updates: cmd.apply_stock_updates,
            occurred_at: cmd.occurred_at,
        })])
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(system_quantity: i64) -> SnapshotLine {
        SnapshotLine {
            product_id: ProductId::new(),
            system_quantity,
        }
    }

    fn open_session(snapshot: Vec<SnapshotLine>) -> CountSession {
        let id = CountSessionId::new();
        let mut session = CountSession::empty(id);
        session
            .execute(&CountCommand::Open(OpenCountSession {
                session_id: id,
                name: "Monthly count".to_string(),
                notes: Some("  shelf A  ".to_string()),
                created_by: None,
                snapshot,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        session
    }

    fn record(session: &CountSession, product_id: ProductId, counted: i64) -> CountCommand {
        CountCommand::RecordCount(RecordCount {
            session_id: session.id_typed(),
            product_id,
            counted_quantity: counted,
            occurred_at: Utc::now(),
        })
    }

    fn complete(session: &CountSession, apply: bool) -> CountCommand {
        CountCommand::Complete(CompleteCountSession {
            session_id: session.id_typed(),
            apply_stock_updates: apply,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn open_snapshots_items_as_uncounted() {
        let session = open_session(vec![line(5), line(8)]);

        assert_eq!(session.status(), CountStatus::Draft);
        assert_eq!(session.notes(), Some("shelf A"));
        let items = session.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].system_quantity, 5);
        assert_eq!(items[0].difference, -5);
        assert_eq!(items[1].difference, -8);
        assert!(items.iter().all(|i| !i.counted && i.counted_quantity == 0));
    }

    #[test]
    fn open_requires_a_name() {
        let id = CountSessionId::new();
        let session = CountSession::empty(id);
        let err = session
            .handle(&CountCommand::Open(OpenCountSession {
                session_id: id,
                name: "  ".to_string(),
                notes: None,
                created_by: None,
                snapshot: vec![],
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn first_count_moves_draft_to_in_progress() {
        let a = line(5);
        let mut session = open_session(vec![a, line(8)]);

        let events = session.execute(&record(&session, a.product_id, 5)).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], CountEvent::Started(_)));
        assert_eq!(session.status(), CountStatus::InProgress);

        let item = session.item(a.product_id).unwrap();
        assert_eq!(item.difference, 0);
        assert!(item.counted);
        assert!(item.counted_at.is_some());

        let events = session.execute(&record(&session, a.product_id, 7)).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(session.item(a.product_id).unwrap().difference, 2);
    }

    #[test]
    fn zero_is_a_valid_count_but_negative_is_not() {
        let a = line(3);
        let mut session = open_session(vec![a]);
        session.execute(&record(&session, a.product_id, 0)).unwrap();
        assert!(session.item(a.product_id).unwrap().counted);

        let err = session.handle(&record(&session, a.product_id, -1)).unwrap_err();
        assert_eq!(err, DomainError::InvalidQuantity(-1));
    }

    #[test]
    fn unknown_product_is_not_in_session() {
        let session = open_session(vec![line(1)]);
        let stranger = ProductId::new();
        let err = session.handle(&record(&session, stranger, 1)).unwrap_err();
        assert_eq!(
            err,
            DomainError::ProductNotInSession {
                session_id: session.id_typed(),
                product_id: stranger,
            }
        );
    }

    #[test]
    fn completed_session_is_terminal() {
        let a = line(4);
        let mut session = open_session(vec![a]);
        session.execute(&complete(&session, false)).unwrap();
        assert!(session.is_completed());
        assert!(session.completed_at().is_some());

        assert_eq!(
            session.handle(&record(&session, a.product_id, 1)).unwrap_err(),
            DomainError::SessionCompleted(session.id_typed())
        );
        assert_eq!(
            session.handle(&complete(&session, true)).unwrap_err(),
            DomainError::AlreadyCompleted(session.id_typed())
        );
    }

    #[test]
    fn commands_against_unopened_session_are_not_found() {
        let session = CountSession::empty(CountSessionId::new());
        assert_eq!(
            session.handle(&complete(&session, true)).unwrap_err(),
            DomainError::SessionNotFound(session.id_typed())
        );
    }

    #[test]
    fn reconciliation_only_includes_counted_items() {
        let a = line(5);
        let b = line(8);
        let mut session = open_session(vec![a, b]);
        session.execute(&record(&session, a.product_id, 6)).unwrap();

        let reconciliation: Vec<_> = session.reconciliation().collect();
        assert_eq!(reconciliation, vec![(a.product_id, 6)]);

        let summary = session.summary();
        assert_eq!(summary.total_items, 2);
        assert_eq!(summary.counted_items, 1);
        assert_eq!(summary.net_difference, 1);
    }

    #[test]
    fn summary_of_huge_counts_saturates() {
        let a = line(0);
        let b = line(0);
        let mut session = open_session(vec![a, b]);
        session.execute(&record(&session, a.product_id, i64::MAX)).unwrap();
        session.execute(&record(&session, b.product_id, i64::MAX)).unwrap();

        let summary = session.summary();
        assert_eq!(summary.counted_items, 2);
        assert_eq!(summary.net_difference, i64::MAX);
    }

    #[test]
    fn persisted_form_restores_as_existing_session() {
        let a = line(2);
        let mut session = open_session(vec![a]);
        session.execute(&record(&session, a.product_id, 2)).unwrap();

        let json = serde_json::to_value(&session).unwrap();
        assert!(json.get("created").is_none());
        let restored: CountSession = serde_json::from_value(json).unwrap();
        assert_eq!(restored, session);
        assert!(restored.handle(&complete(&restored, true)).is_ok());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 200,
                ..ProptestConfig::default()
            })]

            /// Property: every item's difference equals counted minus system, always.
            #[test]
            fn difference_tracks_counted_minus_system(
                stocks in proptest::collection::vec(0i64..500, 1..8),
                counts in proptest::collection::vec((0usize..8, -3i64..500), 0..30)
            ) {
                let snapshot: Vec<_> = stocks.into_iter().map(line).collect();
                let mut session = open_session(snapshot.clone());

                let check = |s: &CountSession| {
                    s.items().iter().all(|i| i.difference == i.counted_quantity - i.system_quantity)
                };
                prop_assert!(check(&session));

                for (index, counted) in counts {
                    let product_id = snapshot[index % snapshot.len()].product_id;
                    let _ = session.execute(&record(&session, product_id, counted));
                    prop_assert!(check(&session));
                }
            }
        }
    }
}
