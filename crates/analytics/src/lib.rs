//! `flame-analytics`: read-only dashboard and report aggregations.
//!
//! Every function here is pure: callers load the records, pass the clock in,
//! and get plain serializable rows back. Nothing is cached or materialized.

pub mod category;
pub mod insights;
pub mod report;
pub mod summary;
pub mod trend;
pub mod window;

pub use category::{
    products_by_category, revenue_by_category, stock_by_category, CategoryRevenue, CategoryShare,
    CategoryStock,
};
pub use insights::{sales_insights, BestCategory, PeakSalesDay, SalesInsights, TrendingCategory};
pub use report::{
    monthly_report, Cell, MonthlyReport, ProductSales, ReportPeriod, ReportSummary, ReportTables,
    StockLevel,
};
pub use summary::{analytics_summary, AnalyticsSummary, Metric};
pub use trend::{sales_trend, TrendPoint};
pub use window::MonthWindow;
