//! Monthly report export as an `.xlsx` workbook or a one-page PDF digest.

use core::str::FromStr;
use std::io::Cursor;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use serde::Deserialize;
use tracing::{info, instrument};

use flame_analytics::{monthly_report, Cell, MonthWindow, ReportTables};
use flame_core::DomainError;

use super::{ServiceError, ServiceResult};
use crate::store::Repositories;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const HEADER_FILL: &str = "FFE0E0E0";

/// Rows of each table shown in the PDF, header included.
const PDF_TABLE_ROWS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Excel,
    Pdf,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Excel => "xlsx",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Excel => XLSX_CONTENT_TYPE,
            ExportFormat::Pdf => "application/pdf",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "excel" => Ok(ExportFormat::Excel),
            "pdf" => Ok(ExportFormat::Pdf),
            _ => Err(DomainError::validation("Invalid type. Use 'excel' or 'pdf'")),
        }
    }
}

/// Query parameters of a monthly export, as received.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonthlyExportRequest {
    pub year: Option<String>,
    pub month: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// A generated file ready to be sent as an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

#[derive(Clone)]
pub struct ExportService {
    repos: Repositories,
}

impl ExportService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    #[instrument(skip(self), err)]
    pub async fn monthly(&self, request: MonthlyExportRequest) -> ServiceResult<RenderedReport> {
        let non_blank = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let (Some(year), Some(month), Some(kind)) =
            (non_blank(request.year), non_blank(request.month), non_blank(request.kind))
        else {
            return Err(DomainError::validation("Year, month, and type (excel|pdf) are required").into());
        };
        let format: ExportFormat = kind.parse()?;
        let year: i32 = year
            .parse()
            .map_err(|_| DomainError::validation("Year must be a number"))?;
        let month: u32 = month
            .parse()
            .map_err(|_| DomainError::validation("Month must be between 1 and 12"))?;
        let window = MonthWindow::new(year, month)?;

        let orders = self.repos.orders.list().await?;
        let payments = self.repos.payments.list().await?;
        let products = self.repos.products.list().await?;
        let report = monthly_report(&window, &orders, &payments, &products);
        let tables = ReportTables::from_report(&report);

        let period = format!("{month}/{year}");
        let bytes = tokio::task::spawn_blocking(move || match format {
            ExportFormat::Excel => render_xlsx(&tables),
            ExportFormat::Pdf => render_pdf(&period, &tables),
        })
        .await
        .map_err(|e| ServiceError::Export(e.to_string()))?
        .map_err(ServiceError::Export)?;

        info!(year, month, format = format.extension(), size = bytes.len(), "monthly report rendered");
        Ok(RenderedReport {
            bytes,
            content_type: format.content_type(),
            filename: format!("monthly-report-{year}-{month}.{}", format.extension()),
        })
    }
}

fn sheets(tables: &ReportTables) -> [(&'static str, &[Vec<Cell>]); 5] {
    [
        ("Summary", &tables.summary),
        ("Orders", &tables.orders),
        ("Payments", &tables.payments),
        ("Product Sales", &tables.product_sales),
        ("Stock Levels", &tables.stock_levels),
    ]
}

/// One sheet per table; the first row of each is bold on a grey fill.
pub fn render_xlsx(tables: &ReportTables) -> Result<Vec<u8>, String> {
    let mut book = umya_spreadsheet::new_file_empty_worksheet();
    for (name, rows) in sheets(tables) {
        let ws = book
            .new_sheet(name)
            .map_err(|e| format!("failed to add sheet {name}: {e}"))?;
        for (r, row) in (1u32..).zip(rows) {
            for (c, value) in (1u32..).zip(row) {
                let cell = ws.get_cell_mut((c, r));
                match value {
                    Cell::Text(s) => {
                        cell.set_value(s.clone());
                    }
                    Cell::Int(n) => {
                        cell.set_value_number(*n as f64);
                    }
                }
                if r == 1 {
                    let style = cell.get_style_mut();
                    style.get_font_mut().set_bold(true);
                    style.set_background_color(HEADER_FILL);
                }
            }
        }
    }

    let mut out = Cursor::new(Vec::<u8>::new());
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut out)
        .map_err(|e| format!("failed to write workbook: {e}"))?;
    Ok(out.into_inner())
}

struct PdfLine {
    size: i64,
    centered: bool,
    text: String,
}

impl PdfLine {
    fn new(size: i64, text: impl Into<String>) -> Self {
        Self {
            size,
            centered: false,
            text: text.into(),
        }
    }

    fn centered(size: i64, text: impl Into<String>) -> Self {
        Self {
            centered: true,
            ..Self::new(size, text)
        }
    }
}

const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const MARGIN: i64 = 50;

fn pdf_lines(period: &str, tables: &ReportTables) -> Vec<PdfLine> {
    let mut lines = vec![
        PdfLine::centered(20, "Monthly Report"),
        PdfLine::centered(12, format!("Period: {period}")),
        PdfLine::new(16, "Summary"),
    ];
    lines.extend(
        tables
            .summary
            .iter()
            .skip(1)
            .filter_map(|row| match row.as_slice() {
                [label, value] => Some(PdfLine::new(10, format!("{label}: {value}"))),
                _ => None,
            }),
    );
    for (heading, rows) in [("Orders", &tables.orders), ("Payments", &tables.payments)] {
        lines.push(PdfLine::new(16, heading));
        lines.extend(rows.iter().take(PDF_TABLE_ROWS).map(|row| {
            let joined = row.iter().map(Cell::to_string).collect::<Vec<_>>().join(" | ");
            PdfLine::new(8, joined)
        }));
    }
    lines
}

/// Title, period, summary and the first rows of orders and payments, set in
/// Helvetica on US Letter pages.
pub fn render_pdf(period: &str, tables: &ReportTables) -> Result<Vec<u8>, String> {
    let mut pages: Vec<Vec<Operation>> = Vec::new();
    let mut ops: Vec<Operation> = Vec::new();
    let mut y = PAGE_HEIGHT - MARGIN;

    for line in pdf_lines(period, tables) {
        let leading = line.size + line.size / 2;
        if y - leading < MARGIN && !ops.is_empty() {
            pages.push(std::mem::take(&mut ops));
            y = PAGE_HEIGHT - MARGIN;
        }
        y -= leading;
        // Helvetica averages about half an em per glyph.
        let width = line.text.chars().count() as i64 * line.size / 2;
        let x = if line.centered {
            ((PAGE_WIDTH - width) / 2).max(MARGIN)
        } else {
            MARGIN
        };
        ops.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), Object::Integer(line.size)]),
            Operation::new("Td", vec![Object::Integer(x), Object::Integer(y)]),
            Operation::new("Tj", vec![Object::string_literal(line.text)]),
            Operation::new("ET", vec![]),
        ]);
    }
    pages.push(ops);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations }
            .encode()
            .map_err(|e| format!("failed to encode page: {e}"))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| format!("failed to write pdf: {e}"))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Utc};
    use flame_catalog::{NewProduct, Product};
    use flame_sales::{price_line, BillNumber, Customer, Order, Payment, PaymentMethod};

    async fn seeded() -> Repositories {
        let repos = Repositories::in_memory();
        let now = Utc::now();
        let product = Product::create(
            NewProduct {
                name: Some("Gorkha".into()),
                category: Some("beer".into()),
                price: Some(250.0),
                stock: Some(40),
                ..Default::default()
            },
            now,
        )
        .unwrap();
        repos.products.insert(&product).await.unwrap();
        let order = Order::place(
            Customer {
                full_name: "Hari".into(),
                mobile: "9841".into(),
                pan_number: None,
                location: "Patan".into(),
            },
            vec![price_line(product.id, "Gorkha", 250.0, 2)],
            PaymentMethod::QrPayment,
            BillNumber::for_time(now, 1),
            now,
        )
        .unwrap();
        repos.orders.insert(&order).await.unwrap();
        repos.payments.insert(&Payment::for_order(&order, now)).await.unwrap();
        repos
    }

    fn request(year: i32, month: u32, kind: &str) -> MonthlyExportRequest {
        MonthlyExportRequest {
            year: Some(year.to_string()),
            month: Some(month.to_string()),
            kind: Some(kind.into()),
        }
    }

    #[tokio::test]
    async fn workbook_has_one_sheet_per_table() {
        let svc = ExportService::new(seeded().await);
        let now = Utc::now();
        let file = svc.monthly(request(now.year(), now.month(), "excel")).await.unwrap();
        assert_eq!(file.content_type, XLSX_CONTENT_TYPE);
        assert_eq!(file.filename, format!("monthly-report-{}-{}.xlsx", now.year(), now.month()));

        let book = umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(file.bytes), true).unwrap();
        for name in ["Summary", "Orders", "Payments", "Product Sales", "Stock Levels"] {
            assert!(book.get_sheet_by_name(name).is_some(), "missing sheet {name}");
        }
        let orders = book.get_sheet_by_name("Orders").unwrap();
        assert_eq!(orders.get_value((1, 1)), "Bill Number");
        assert_eq!(orders.get_value((4, 2)), "Gorkha x2");
        let summary = book.get_sheet_by_name("Summary").unwrap();
        assert_eq!(summary.get_value((2, 3)), "$500.00");
    }

    #[tokio::test]
    async fn pdf_is_a_loadable_document() {
        let svc = ExportService::new(seeded().await);
        let now = Utc::now();
        let file = svc.monthly(request(now.year(), now.month(), "pdf")).await.unwrap();
        assert_eq!(file.content_type, "application/pdf");
        assert!(file.bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&file.bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn long_reports_spill_onto_more_pages() {
        let row = vec![Cell::from("x"); 8];
        let tables = ReportTables {
            summary: vec![vec!["Metric".into(), "Value".into()]; 60],
            orders: vec![row.clone(); 10],
            payments: vec![row; 10],
            product_sales: Vec::new(),
            stock_levels: Vec::new(),
        };
        let bytes = render_pdf("1/2024", &tables).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() > 1);
    }

    #[tokio::test]
    async fn request_is_validated_before_rendering() {
        let svc = ExportService::new(Repositories::in_memory());
        let err = svc.monthly(MonthlyExportRequest::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Year, month, and type (excel|pdf) are required");

        let err = svc.monthly(request(2024, 3, "csv")).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid type. Use 'excel' or 'pdf'");

        let err = svc.monthly(request(2024, 13, "pdf")).await.unwrap_err();
        assert_eq!(err.to_string(), "Month must be between 1 and 12");
    }
}
