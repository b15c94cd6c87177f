//! Spreadsheet-backed ledger store
//!
//! Each collection lives on its own sheet with Spanish column headers. Sheets
//! are fetched one after another, so a writer may land between two reads.
//! When a load leaves references dangling the sheets are read again: the same
//! dangling set twice is bad data and is left to the linker's warnings, a
//! different set is a torn read and becomes
//! [`StoreError::InconsistentSnapshot`].

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared::{
    parse_calendar_date, validate_non_negative, Collection, DateRange, Expense, InputSource,
    Process, ProcessInput, Purchase, Sale, WarehouseEntry,
};

use super::{Ledger, LedgerSnapshot, LedgerStore, StoreError, StoreResult, LINEAGE_ORDER};
use crate::external::SheetSource;

pub struct SheetLedgerStore {
    source: Arc<dyn SheetSource>,
    tabs: BTreeMap<Collection, String>,
}

impl SheetLedgerStore {
    pub fn new(source: Arc<dyn SheetSource>) -> Self {
        let tabs = Collection::ALL
            .iter()
            .map(|c| (*c, c.sheet_name().to_string()))
            .collect();
        Self { source, tabs }
    }

    /// Read `collection` from a sheet other than its default one
    pub fn with_tab(mut self, collection: Collection, sheet: impl Into<String>) -> Self {
        self.tabs.insert(collection, sheet.into());
        self
    }

    fn tab(&self, collection: Collection) -> &str {
        self.tabs
            .get(&collection)
            .map(String::as_str)
            .unwrap_or_else(|| collection.sheet_name())
    }

    async fn load(&self) -> StoreResult<Ledger> {
        let mut ledger = Ledger::default();
        for collection in LINEAGE_ORDER {
            let text = self.source.fetch_csv(self.tab(collection)).await?;
            let rows = read_rows(collection, &text)?;
            match collection {
                Collection::Purchases => ledger.purchases = parse_all(rows, purchase_from_row)?,
                Collection::WarehouseEntries => {
                    ledger.warehouse_entries = parse_all(rows, warehouse_from_row)?
                }
                Collection::Processes => ledger.processes = parse_all(rows, process_from_row)?,
                Collection::Sales => ledger.sales = parse_all(rows, sale_from_row)?,
                Collection::Expenses => ledger.expenses = parse_all(rows, expense_from_row)?,
            }
        }
        Ok(ledger)
    }
}

#[async_trait]
impl LedgerStore for SheetLedgerStore {
    fn name(&self) -> &'static str {
        "sheets"
    }

    async fn snapshot(&self, range: &DateRange) -> StoreResult<LedgerSnapshot> {
        let first = LedgerSnapshot::new(*range, self.load().await?.select_for(range));
        let dangling = first.dangling_references();
        if dangling.is_empty() {
            return Ok(first);
        }

        tracing::debug!(count = dangling.len(), "Dangling references after load, reading sheets again");
        let second = LedgerSnapshot::new(*range, self.load().await?.select_for(range));
        let recheck = second.dangling_references();
        if recheck.is_empty() {
            return Ok(second);
        }
        if recheck == dangling {
            for reference in &recheck {
                tracing::warn!(%reference, "Ledger reference does not resolve");
            }
            return Ok(second);
        }

        let changed = recheck
            .symmetric_difference(&dangling)
            .next()
            .map(ToString::to_string)
            .unwrap_or_default();
        tracing::warn!(%changed, "Sheets changed while being read");
        Err(StoreError::InconsistentSnapshot(changed))
    }
}

// ============================================================================
// Rows
// ============================================================================

/// One spreadsheet row keyed by canonical column name
struct SheetRow {
    collection: Collection,
    /// 1-based row number as shown in the spreadsheet, header included
    row: usize,
    cells: HashMap<&'static str, String>,
}

/// Map a header cell to the field it carries
fn canonical_header(header: &str) -> Option<&'static str> {
    let key = header
        .trim()
        .to_lowercase()
        .replace(['á', 'à'], "a")
        .replace('é', "e")
        .replace('í', "i")
        .replace('ó', "o")
        .replace('ú', "u")
        .replace([' ', '-'], "_");
    let field = match key.as_str() {
        "id" | "codigo" => "id",
        "fecha" | "date" => "date",
        "tipo_cafe" | "tipo_de_cafe" | "tipo" | "coffee_type" => "coffee_type",
        "cantidad" | "kg" | "quantity" | "cantidad_entrada" => "quantity",
        "cantidad_salida" | "output" | "output_quantity" => "output_quantity",
        "precio" | "precio_unitario" | "unit_price" => "unit_price",
        "total" | "preciototal" | "precio_total" => "total",
        "adelanto" | "advance" => "advance",
        "proveedor" | "supplier" => "supplier",
        "compra_id" | "compra" | "purchase_id" => "purchase_id",
        "almacen_ids" | "almacen_id" | "almacen" => "warehouse_refs",
        "compra_ids" => "purchase_refs",
        "cliente" | "client" => "client",
        "proceso_id" | "proceso" | "process_id" => "process_id",
        "categoria" | "category" => "category",
        "descripcion" | "description" => "description",
        "monto" | "amount" => "amount",
        _ => return None,
    };
    Some(field)
}

fn read_rows(collection: Collection, text: &str) -> StoreResult<Vec<SheetRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let malformed = |row: usize, message: String| StoreError::MalformedRecord {
        collection,
        row,
        message,
    };

    let headers: Vec<Option<&'static str>> = reader
        .headers()
        .map_err(|e| malformed(1, e.to_string()))?
        .iter()
        .map(canonical_header)
        .collect();

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let row = i + 2;
        let record = record.map_err(|e| malformed(row, e.to_string()))?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        let cells = headers
            .iter()
            .copied()
            .zip(record.iter())
            .filter_map(|(header, cell)| {
                header
                    .filter(|_| !cell.is_empty())
                    .map(|h| (h, cell.to_string()))
            })
            .collect();
        rows.push(SheetRow {
            collection,
            row,
            cells,
        });
    }
    Ok(rows)
}

fn parse_all<T>(
    rows: Vec<SheetRow>,
    parse: impl Fn(&SheetRow) -> Result<T, String>,
) -> StoreResult<Vec<T>> {
    rows.iter()
        .map(|row| {
            parse(row).map_err(|message| StoreError::MalformedRecord {
                collection: row.collection,
                row: row.row,
                message,
            })
        })
        .collect()
}

impl SheetRow {
    fn text(&self, field: &str) -> Option<&str> {
        self.cells.get(field).map(String::as_str)
    }

    fn required(&self, field: &str) -> Result<&str, String> {
        self.text(field)
            .ok_or_else(|| format!("missing value for {}", field))
    }

    /// Stable id: the sheet's own id column, else derived from the row number
    fn id(&self) -> String {
        match self.text("id") {
            Some(id) => id.to_string(),
            None => {
                let prefix = match self.collection {
                    Collection::Purchases => "C",
                    Collection::WarehouseEntries => "A",
                    Collection::Processes => "P",
                    Collection::Sales => "V",
                    Collection::Expenses => "G",
                };
                format!("{}-{:03}", prefix, self.row)
            }
        }
    }

    fn date(&self) -> Result<NaiveDate, String> {
        parse_calendar_date("fecha", self.required("date")?).map_err(|e| e.to_string())
    }

    fn decimal(&self, field: &str) -> Result<Option<Decimal>, String> {
        self.text(field).map(|raw| parse_amount(field, raw)).transpose()
    }

    fn decimal_or_zero(&self, field: &str) -> Result<Decimal, String> {
        Ok(self.decimal(field)?.unwrap_or_default())
    }

    /// Weight in kilograms; blank means zero, negative is rejected
    fn quantity(&self, field: &str) -> Result<Decimal, String> {
        let value = self.decimal_or_zero(field)?;
        validate_non_negative(field, value).map_err(|e| e.to_string())?;
        Ok(value)
    }

    fn flag(&self, field: &str) -> bool {
        matches!(
            self.text(field).map(str::to_lowercase).as_deref(),
            Some("si" | "sí" | "s" | "yes" | "y" | "true" | "1" | "x")
        )
    }
}

/// Parse a money or weight cell such as `1,250.50` or `S/ 12.5`
fn parse_amount(field: &str, raw: &str) -> Result<Decimal, String> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches("S/")
        .trim_start_matches('$')
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|_| format!("invalid number for {}: {:?}", field, raw))
}

/// Line total from weight and unit price; zero when the price is blank
fn line_total(quantity_kg: Decimal, unit_price: Option<Decimal>) -> Result<Decimal, String> {
    match unit_price {
        Some(price) => price.checked_mul(quantity_kg).ok_or_else(|| {
            format!("total of {} kg at {} is too large", quantity_kg, price)
        }),
        None => Ok(Decimal::ZERO),
    }
}

/// Parse an input reference list such as `A-001:30; A-002`
fn parse_refs(
    raw: &str,
    make: fn(String) -> InputSource,
) -> Result<Vec<ProcessInput>, String> {
    raw.split([';', ','])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once(':') {
            Some((id, qty)) => Ok(ProcessInput {
                source: make(id.trim().to_string()),
                quantity_kg: Some(parse_amount("cantidad", qty)?),
            }),
            None => Ok(ProcessInput {
                source: make(part.to_string()),
                quantity_kg: None,
            }),
        })
        .collect()
}

fn purchase_from_row(row: &SheetRow) -> Result<Purchase, String> {
    let quantity_kg = row.quantity("quantity")?;
    let unit_price = row.decimal("unit_price")?;
    let total_cost = match row.decimal("total")? {
        Some(total) => total,
        None => line_total(quantity_kg, unit_price)?,
    };
    Ok(Purchase {
        id: row.id(),
        date: row.date()?,
        coffee_type: row.text("coffee_type").unwrap_or_default().to_string(),
        quantity_kg,
        unit_price,
        total_cost,
        advance_payment: row.flag("advance"),
        supplier: row.text("supplier").map(str::to_string),
    })
}

fn warehouse_from_row(row: &SheetRow) -> Result<WarehouseEntry, String> {
    Ok(WarehouseEntry {
        id: row.id(),
        purchase_id: row.required("purchase_id")?.to_string(),
        date: row.date()?,
        coffee_type: row.text("coffee_type").unwrap_or_default().to_string(),
        quantity_kg: row.quantity("quantity")?,
    })
}

fn process_from_row(row: &SheetRow) -> Result<Process, String> {
    let mut inputs = Vec::new();
    if let Some(raw) = row.text("warehouse_refs") {
        inputs.extend(parse_refs(raw, InputSource::WarehouseEntry)?);
    }
    if let Some(raw) = row.text("purchase_refs") {
        inputs.extend(parse_refs(raw, InputSource::Purchase)?);
    }
    Ok(Process {
        id: row.id(),
        date: row.date()?,
        coffee_type: row.text("coffee_type").unwrap_or_default().to_string(),
        input_quantity_kg: row.quantity("quantity")?,
        output_quantity_kg: row.decimal("output_quantity")?,
        inputs,
    })
}

fn sale_from_row(row: &SheetRow) -> Result<Sale, String> {
    let quantity_kg = row.quantity("quantity")?;
    let unit_price = row.decimal("unit_price")?;
    let total_revenue = match row.decimal("total")? {
        Some(total) => total,
        None => line_total(quantity_kg, unit_price)?,
    };
    Ok(Sale {
        id: row.id(),
        date: row.date()?,
        client: row.text("client").unwrap_or_default().to_string(),
        coffee_type: row.text("coffee_type").unwrap_or_default().to_string(),
        quantity_kg,
        unit_price,
        total_revenue,
        process_id: row.text("process_id").map(str::to_string),
    })
}

fn expense_from_row(row: &SheetRow) -> Result<Expense, String> {
    Ok(Expense {
        id: row.id(),
        date: row.date()?,
        category: row.text("category").unwrap_or_default().to_string(),
        description: row.text("description").map(str::to_string),
        amount: row.decimal_or_zero("amount")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::*;
    use shared::LineageWarning;
    use std::sync::Mutex;

    struct StaticSheets(HashMap<&'static str, &'static str>);

    #[async_trait]
    impl SheetSource for StaticSheets {
        async fn fetch_csv(&self, sheet: &str) -> StoreResult<String> {
            Ok(self.0.get(sheet).copied().unwrap_or("id,fecha\n").to_string())
        }
    }

    fn store(sheets: &[(&'static str, &'static str)]) -> SheetLedgerStore {
        SheetLedgerStore::new(Arc::new(StaticSheets(sheets.iter().copied().collect())))
    }

    const COMPRAS: &str = "id,Fecha,Tipo Cafe,Cantidad,Precio,Total,Adelanto\n\
        C-001,2024-03-01,Pergamino,100,\"1,200.50\",,si\n\
        C-002,05/03/2024,Verde,50,,,no\n";

    #[tokio::test]
    async fn test_parses_spanish_headers() {
        let store = store(&[
            ("Compras", COMPRAS),
            ("Almacen", "id,fecha,compra_id,tipo_cafe,cantidad\nA-001,2024-03-02,C-001,Pergamino,60\n"),
            (
                "Proceso",
                "id,fecha,tipo_cafe,cantidad,cantidad_salida,almacen_ids,compra_ids\n\
                 P-001,2024-03-04,Pergamino,80,64,A-001:60,C-001\n",
            ),
            ("Ventas", "fecha,cliente,tipo_cafe,cantidad,total,proceso_id\n2024-03-06,Tostaduria,Pergamino,64,1920,P-001\n"),
            ("Gastos", "fecha,categoria,descripcion,monto\n2024-03-07,flete,PAGO EFECTIVO,S/ 150\n"),
        ]);
        let snapshot = store.snapshot(&range("2024-03-01", "2024-03-31")).await.unwrap();

        let compra = snapshot.purchase("C-001").unwrap();
        assert_eq!(compra.unit_price, Some(dec("1200.50")));
        assert_eq!(compra.total_cost, dec("120050.00"));
        assert!(compra.advance_payment);
        assert_eq!(snapshot.purchase("C-002").unwrap().unit_price, None);
        assert_eq!(snapshot.purchase("C-002").unwrap().date, day("2024-03-05"));

        let proceso = snapshot.process("P-001").unwrap();
        assert_eq!(proceso.output_quantity(), dec("64"));
        assert_eq!(
            proceso.inputs,
            vec![
                ProcessInput::warehouse("A-001").with_quantity(dec("60")),
                ProcessInput::purchase("C-001"),
            ]
        );

        let venta = &snapshot.sales()[0];
        assert_eq!(venta.id, "V-002");
        assert_eq!(venta.effective_unit_price(), Some(dec("30")));
        assert_eq!(snapshot.expenses()[0].amount, dec("150"));
    }

    /// Serves a different set of sheets on each full read of the workbook
    struct ChangingSheets {
        reads: Vec<HashMap<&'static str, &'static str>>,
        loads: Mutex<usize>,
    }

    impl ChangingSheets {
        fn new(reads: Vec<Vec<(&'static str, &'static str)>>) -> Self {
            Self {
                reads: reads.into_iter().map(|r| r.into_iter().collect()).collect(),
                loads: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl SheetSource for ChangingSheets {
        async fn fetch_csv(&self, sheet: &str) -> StoreResult<String> {
            let mut loads = self.loads.lock().unwrap();
            // purchases are always fetched first
            if sheet == Collection::Purchases.sheet_name() {
                *loads += 1;
            }
            let read = &self.reads[(*loads - 1).min(self.reads.len() - 1)];
            Ok(read.get(sheet).copied().unwrap_or("id,fecha\n").to_string())
        }
    }

    const VENTA_P999: &str = "id,fecha,cliente,tipo_cafe,cantidad,precio,proceso_id\nV-1,2024-03-06,X,Verde,10,30,P-999\n";

    #[tokio::test]
    async fn test_permanent_dangling_reference_is_left_to_lineage() {
        let store = store(&[("Compras", COMPRAS), ("Ventas", VENTA_P999)]);
        let snapshot = store
            .snapshot(&range("2024-03-01", "2024-03-31"))
            .await
            .unwrap();
        assert_eq!(snapshot.dangling_references().len(), 1);

        let lineage = crate::engine::link(&snapshot);
        assert!(lineage.warnings.contains(&LineageWarning::UnknownProcess {
            sale_id: "V-1".to_string(),
            process_id: "P-999".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_changing_dangling_set_is_inconsistent_snapshot() {
        let source = ChangingSheets::new(vec![
            vec![("Compras", COMPRAS), ("Ventas", VENTA_P999)],
            vec![
                ("Compras", COMPRAS),
                ("Ventas", "id,fecha,cliente,tipo_cafe,cantidad,precio,proceso_id\nV-1,2024-03-06,X,Verde,10,30,P-998\n"),
            ],
        ]);
        let store = SheetLedgerStore::new(Arc::new(source));
        let err = store
            .snapshot(&range("2024-03-01", "2024-03-31"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InconsistentSnapshot(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_torn_read_is_healed_by_second_read() {
        let proceso = "id,fecha,tipo_cafe,cantidad\nP-999,2024-03-05,Verde,10\n";
        let source = ChangingSheets::new(vec![
            vec![("Compras", COMPRAS), ("Ventas", VENTA_P999)],
            vec![("Compras", COMPRAS), ("Proceso", proceso), ("Ventas", VENTA_P999)],
        ]);
        let store = SheetLedgerStore::new(Arc::new(source));
        let snapshot = store
            .snapshot(&range("2024-03-01", "2024-03-31"))
            .await
            .unwrap();
        assert!(snapshot.dangling_references().is_empty());
        assert!(snapshot.process("P-999").is_some());
    }

    #[tokio::test]
    async fn test_oversized_line_total_is_malformed() {
        let store = store(&[(
            "Ventas",
            "id,fecha,cliente,tipo_cafe,cantidad,precio\nV-1,2024-03-06,X,Verde,100000000000000000000,10000000000\n",
        )]);
        let err = store
            .snapshot(&range("2024-03-01", "2024-03-31"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::MalformedRecord { collection: Collection::Sales, row: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_malformed_number_reports_row() {
        let store = store(&[(
            "Compras",
            "id,fecha,tipo_cafe,cantidad,precio\nC-1,2024-03-01,Verde,diez,4\n",
        )]);
        let err = store
            .snapshot(&range("2024-03-01", "2024-03-31"))
            .await
            .unwrap_err();
        match err {
            StoreError::MalformedRecord {
                collection, row, ..
            } => {
                assert_eq!(collection, Collection::Purchases);
                assert_eq!(row, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_blank_rows_are_skipped() {
        let rows = read_rows(Collection::Expenses, "fecha,monto\n,\n2024-01-01,5\n").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row, 3);
    }
}
