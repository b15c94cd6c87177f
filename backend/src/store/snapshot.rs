//! Point-in-time view of the ledger for one query
//!
//! Records are kept in flat vectors with an id index per collection, so the
//! provenance DAG is navigated through reference fields rather than nesting.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shared::{
    Collection, DateRange, Expense, InputSource, Process, Purchase, Sale, WarehouseEntry,
};

/// Raw ledger contents, as held by a store or loaded from a seed file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    pub purchases: Vec<Purchase>,
    #[serde(default)]
    pub warehouse_entries: Vec<WarehouseEntry>,
    #[serde(default)]
    pub processes: Vec<Process>,
    #[serde(default)]
    pub sales: Vec<Sale>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
}

/// A reference that points at no loaded record
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DanglingReference {
    pub from: Collection,
    pub from_id: String,
    pub to: Collection,
    pub to_id: String,
}

impl std::fmt::Display for DanglingReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} references {} {} which is not visible",
            self.from, self.from_id, self.to, self.to_id
        )
    }
}

/// Ids referenced from a set of records, grouped by target collection
#[derive(Debug, Default)]
struct References {
    processes: BTreeSet<String>,
    warehouse_entries: BTreeSet<String>,
    purchases: BTreeSet<String>,
}

impl Ledger {
    pub fn is_empty(&self) -> bool {
        self.purchases.is_empty()
            && self.warehouse_entries.is_empty()
            && self.processes.is_empty()
            && self.sales.is_empty()
            && self.expenses.is_empty()
    }

    /// Select what a query over `range` needs.
    ///
    /// Purchases, warehouse entries, processes and sales are kept whole, so
    /// lineage is resolved over the same records whatever the window and a
    /// process's real profit does not move with the window's bounds. Only
    /// expenses are limited to the window.
    pub fn select_for(&self, range: &DateRange) -> Ledger {
        Ledger {
            purchases: self.purchases.clone(),
            warehouse_entries: self.warehouse_entries.clone(),
            processes: self.processes.clone(),
            sales: self.sales.clone(),
            expenses: self
                .expenses
                .iter()
                .filter(|e| range.contains(e.date))
                .cloned()
                .collect(),
        }
    }

    /// Earliest record date on or before `end`
    fn first_date_until(&self, end: NaiveDate) -> Option<NaiveDate> {
        let dates = self
            .purchases
            .iter()
            .map(|p| p.date)
            .chain(self.warehouse_entries.iter().map(|w| w.date))
            .chain(self.processes.iter().map(|p| p.date))
            .chain(self.sales.iter().map(|s| s.date))
            .chain(self.expenses.iter().map(|e| e.date));
        dates.filter(|date| *date <= end).min()
    }
}

fn references_from_processes<'a>(processes: impl IntoIterator<Item = &'a Process>) -> References {
    let mut refs = References::default();
    for process in processes {
        for input in &process.inputs {
            match &input.source {
                InputSource::WarehouseEntry(id) => {
                    refs.warehouse_entries.insert(id.clone());
                }
                InputSource::Purchase(id) => {
                    refs.purchases.insert(id.clone());
                }
            }
        }
    }
    refs
}

/// Consistent view of the ledger used to answer one query
#[derive(Debug, Clone)]
pub struct LedgerSnapshot {
    window: DateRange,
    ledger: Ledger,
    purchase_index: HashMap<String, usize>,
    warehouse_index: HashMap<String, usize>,
    process_index: HashMap<String, usize>,
    sale_index: HashMap<String, usize>,
}

impl LedgerSnapshot {
    /// Index `ledger` for queries over `window`. An open window start is
    /// narrowed to the earliest record dated up to the window's end.
    pub fn new(window: DateRange, ledger: Ledger) -> Self {
        fn index<T>(items: &[T], id: impl Fn(&T) -> &str) -> HashMap<String, usize> {
            items
                .iter()
                .enumerate()
                .map(|(i, item)| (id(item).to_string(), i))
                .collect()
        }

        let window = if window.has_open_start() {
            DateRange {
                start: ledger.first_date_until(window.end).unwrap_or(window.end),
                end: window.end,
            }
        } else {
            window
        };

        Self {
            window,
            purchase_index: index(&ledger.purchases, |p| p.id.as_str()),
            warehouse_index: index(&ledger.warehouse_entries, |w| w.id.as_str()),
            process_index: index(&ledger.processes, |p| p.id.as_str()),
            sale_index: index(&ledger.sales, |s| s.id.as_str()),
            ledger,
        }
    }

    pub fn window(&self) -> DateRange {
        self.window
    }

    pub fn purchases(&self) -> &[Purchase] {
        &self.ledger.purchases
    }

    pub fn warehouse_entries(&self) -> &[WarehouseEntry] {
        &self.ledger.warehouse_entries
    }

    pub fn processes(&self) -> &[Process] {
        &self.ledger.processes
    }

    pub fn sales(&self) -> &[Sale] {
        &self.ledger.sales
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.ledger.expenses
    }

    pub fn purchase(&self, id: &str) -> Option<&Purchase> {
        self.purchase_index.get(id).map(|&i| &self.ledger.purchases[i])
    }

    pub fn warehouse_entry(&self, id: &str) -> Option<&WarehouseEntry> {
        self.warehouse_index
            .get(id)
            .map(|&i| &self.ledger.warehouse_entries[i])
    }

    pub fn process(&self, id: &str) -> Option<&Process> {
        self.process_index.get(id).map(|&i| &self.ledger.processes[i])
    }

    pub fn sale(&self, id: &str) -> Option<&Sale> {
        self.sale_index.get(id).map(|&i| &self.ledger.sales[i])
    }

    /// Processes dated inside the query window, oldest first
    pub fn processes_in_window(&self) -> Vec<&Process> {
        let mut processes: Vec<&Process> = self
            .ledger
            .processes
            .iter()
            .filter(|p| self.window.contains(p.date))
            .collect();
        processes.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        processes
    }

    pub fn purchases_in_window(&self) -> impl Iterator<Item = &Purchase> {
        let window = self.window;
        self.ledger.purchases.iter().filter(move |p| window.contains(p.date))
    }

    pub fn sales_in_window(&self) -> impl Iterator<Item = &Sale> {
        let window = self.window;
        self.ledger.sales.iter().filter(move |s| window.contains(s.date))
    }

    pub fn expenses_in_window(&self) -> impl Iterator<Item = &Expense> {
        let window = self.window;
        self.ledger.expenses.iter().filter(move |e| window.contains(e.date))
    }

    /// Every reference between loaded records that resolves to nothing.
    ///
    /// Stores that cannot read all collections atomically compare this set
    /// across reads to tell a torn read from a reference that is simply wrong.
    pub fn dangling_references(&self) -> BTreeSet<DanglingReference> {
        let mut dangling = BTreeSet::new();
        for sale in &self.ledger.sales {
            if let Some(process_id) = &sale.process_id {
                if self.process(process_id).is_none() {
                    dangling.insert(DanglingReference {
                        from: Collection::Sales,
                        from_id: sale.id.clone(),
                        to: Collection::Processes,
                        to_id: process_id.clone(),
                    });
                }
            }
        }
        for process in &self.ledger.processes {
            for input in &process.inputs {
                let (to, found) = match &input.source {
                    InputSource::WarehouseEntry(id) => (
                        Collection::WarehouseEntries,
                        self.warehouse_entry(id).is_some(),
                    ),
                    InputSource::Purchase(id) => (Collection::Purchases, self.purchase(id).is_some()),
                };
                if !found {
                    dangling.insert(DanglingReference {
                        from: Collection::Processes,
                        from_id: process.id.clone(),
                        to,
                        to_id: input.source.id().to_string(),
                    });
                }
            }
        }
        for entry in &self.ledger.warehouse_entries {
            if self.purchase(&entry.purchase_id).is_none() {
                dangling.insert(DanglingReference {
                    from: Collection::WarehouseEntries,
                    from_id: entry.id.clone(),
                    to: Collection::Purchases,
                    to_id: entry.purchase_id.clone(),
                });
            }
        }
        dangling
    }

    /// Records of one collection dated in the window, plus any record of that
    /// collection reachable from an in-window record.
    pub fn records_for(&self, collection: Collection) -> Result<Vec<serde_json::Value>, serde_json::Error> {
        let window = self.window;
        let reachable = self.reachable_from_window();

        match collection {
            Collection::Purchases => to_values(
                self.ledger
                    .purchases
                    .iter()
                    .filter(|p| window.contains(p.date) || reachable.purchases.contains(&p.id)),
            ),
            Collection::WarehouseEntries => to_values(self.ledger.warehouse_entries.iter().filter(
                |w| window.contains(w.date) || reachable.warehouse_entries.contains(&w.id),
            )),
            Collection::Processes => to_values(
                self.ledger
                    .processes
                    .iter()
                    .filter(|p| window.contains(p.date) || reachable.processes.contains(&p.id)),
            ),
            Collection::Sales => to_values(self.sales_in_window()),
            Collection::Expenses => to_values(self.expenses_in_window()),
        }
    }

    fn reachable_from_window(&self) -> References {
        let window = self.window;
        let mut refs = References::default();

        refs.processes.extend(
            self.sales_in_window()
                .filter_map(|s| s.process_id.clone()),
        );

        let processes = self
            .ledger
            .processes
            .iter()
            .filter(|p| window.contains(p.date) || refs.processes.contains(&p.id));
        let from_processes = references_from_processes(processes);
        refs.warehouse_entries = from_processes.warehouse_entries;
        refs.purchases = from_processes.purchases;

        let lot_purchases: Vec<String> = self
            .ledger
            .warehouse_entries
            .iter()
            .filter(|w| window.contains(w.date) || refs.warehouse_entries.contains(&w.id))
            .map(|w| w.purchase_id.clone())
            .collect();
        refs.purchases.extend(lot_purchases);

        refs
    }
}

fn to_values<'a, T: Serialize + 'a>(
    records: impl Iterator<Item = &'a T>,
) -> Result<Vec<serde_json::Value>, serde_json::Error> {
    records.map(serde_json::to_value).collect()
}
