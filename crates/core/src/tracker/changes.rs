//! Store change notification
//!
//! Repository mutations bump a per-table version counter published on a
//! watch channel. Read-side collaborators hold a receiver, wake on version
//! changes and re-query; the store stays the single authority for row data.

use tokio::sync::watch;

/// Tables that publish change versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Applications,
    Milestones,
    Reminders,
}

struct Counter {
    tx: watch::Sender<u64>,
    rx: watch::Receiver<u64>,
}

impl Counter {
    fn new() -> Self {
        let (tx, rx) = watch::channel(0);
        Self { tx, rx }
    }

    fn bump(&self) {
        self.tx.send_modify(|version| *version = version.wrapping_add(1));
    }
}

/// Per-table version counters shared between repositories and readers
pub struct ChangeNotifier {
    applications: Counter,
    milestones: Counter,
    reminders: Counter,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            applications: Counter::new(),
            milestones: Counter::new(),
            reminders: Counter::new(),
        }
    }

    /// Record a mutation against a table
    pub fn notify(&self, table: Table) {
        match table {
            Table::Applications => self.applications.bump(),
            Table::Milestones => self.milestones.bump(),
            Table::Reminders => self.reminders.bump(),
        }
    }

    /// Subscribe to version changes for a table
    pub fn subscribe(&self, table: Table) -> watch::Receiver<u64> {
        match table {
            Table::Applications => self.applications.rx.clone(),
            Table::Milestones => self.milestones.rx.clone(),
            Table::Reminders => self.reminders.rx.clone(),
        }
    }

    /// Current version for a table
    pub fn version(&self, table: Table) -> u64 {
        *self.subscribe(table).borrow()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
