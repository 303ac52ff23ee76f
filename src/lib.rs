//! # KPI Volume Generator
//!
//! A library for generating synthetic KPI volume datasets from account, product
//! and measure catalogs over a date range.
//!
//! ## Core Concepts
//!
//! - **Catalogs**: accounts (with a percentage weight), products (with an initial value)
//!   and measures (KPIs with a formula, a time granularity and a number format)
//! - **Period index**: zero-based day or week offset from the run's start date, exposed to
//!   formulas as `periodIndex`
//! - **Formula**: arithmetic over `periodIndex`, `initialValue`, `prdCustomValue1..3` and
//!   `accCustomValue1..3`, evaluated once per (date, product, account)
//! - **Output document**: one per measure, holding every period and every
//!   product/account row
//!
//! A formula that cannot be evaluated for a cell never aborts the run: the cell is
//! written as `0` and the failure is listed in [`GenerationReport::errors`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use kpi_volume_generator::*;
//! use chrono::NaiveDate;
//!
//! let catalogs = load_catalog_dir(std::path::Path::new("./catalogs"))?;
//! let request = GenerationRequest::new(
//!     catalogs,
//!     NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
//!     "0000",
//! );
//!
//! let report = generate_volumes(&request);
//! for (code, document) in &report.documents {
//!     println!("{}: {} rows", code, document.row_count());
//! }
//! ```

pub mod engine;
pub mod error;
pub mod export;
pub mod formula;
pub mod ingestion;
pub mod schema;
pub mod utils;

pub use engine::{plan_groups, CellError, GenerationReport, KpiGroup, VolumeGenerator};
pub use error::{FormulaError, FormulaEvaluationError, KpiVolumeError, Result};
pub use export::{output_file_name, write_documents};
pub use formula::{evaluate, Formula, FormulaContext, Variable};
pub use ingestion::*;
pub use schema::*;
pub use utils::*;

use log::{debug, info, warn};

pub struct KpiVolumeProcessor;

impl KpiVolumeProcessor {
    pub fn process(request: &GenerationRequest) -> GenerationReport {
        validate_request(request);

        info!(
            "Generating KPI volumes for sales org {} from {} to {}",
            request.sales_org, request.start_date, request.end_date
        );
        debug!(
            "Request contains {} account(s), {} product(s) and {} measure(s)",
            request.accounts.len(),
            request.products.len(),
            request.measures.len()
        );

        if request
            .measures
            .iter()
            .any(|m| m.time_granularity == Granularity::Week)
        {
            debug!("Weekly period indexing: {:?}", request.week_indexing);
        }

        let report = engine::generate_request(request);

        info!(
            "Generated {} document(s) with {} row(s); {} cell(s) defaulted to 0",
            report.documents.len(),
            report.total_rows(),
            report.errors.len()
        );

        report
    }
}

pub fn generate_volumes(request: &GenerationRequest) -> GenerationReport {
    KpiVolumeProcessor::process(request)
}

/// Logs request values that look unintended. Nothing here stops a run: the sales
/// org is copied as given and an inverted date range yields documents without volumes.
pub fn validate_request(request: &GenerationRequest) {
    if request.sales_org.trim().is_empty() {
        warn!("Sales org is empty; documents will carry an empty 'salesorg'");
    }

    for account in &request.accounts {
        if !(0.0..=100.0).contains(&account.weight) {
            warn!(
                "Account '{}' has weight {} outside 0-100",
                account.ext_id, account.weight
            );
        }
    }

    if request.start_date > request.end_date {
        debug!(
            "Start date {} is after end date {}; no periods will be generated",
            request.start_date, request.end_date
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn catalogs() -> Catalogs {
        Catalogs {
            accounts: AccountCatalog {
                accounts: vec![Account {
                    ext_id: "ACC1".to_string(),
                    weight: 100.0,
                    acc_custom_value1: None,
                    acc_custom_value2: None,
                    acc_custom_value3: None,
                }],
            },
            products: ProductCatalog {
                products: vec![Product {
                    ext_id: "PRD1".to_string(),
                    initial_value: Some(10.0),
                    prd_custom_value1: None,
                    prd_custom_value2: None,
                    prd_custom_value3: None,
                }],
            },
            measures: MeasureCatalog {
                measures: vec![Measure {
                    measure_code: "VOL".to_string(),
                    formula: "initialValue + periodIndex".to_string(),
                    time_granularity: Granularity::Day,
                    format: NumberFormat::Integer,
                }],
            },
        }
    }

    #[test]
    fn test_end_to_end_processing() {
        let request = GenerationRequest::new(
            catalogs(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            "0000",
        );

        let report = generate_volumes(&request);
        let doc = report.documents.get("VOL").unwrap();

        let values: Vec<f64> = doc.volumes.iter().map(|v| v.rows[0].value).collect();
        assert_eq!(values, vec![10.0, 11.0, 12.0]);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_empty_sales_org_is_carried_through() {
        for sales_org in ["", "  "] {
            let request = GenerationRequest::new(
                catalogs(),
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
                sales_org,
            );

            let report = generate_volumes(&request);
            let doc = &report.documents["VOL"];
            assert_eq!(doc.salesorg, sales_org);
            assert_eq!(doc.volumes.len(), 3);
        }
    }

    #[test]
    fn test_inverted_range_is_not_an_error() {
        let request = GenerationRequest::new(
            catalogs(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            "0000",
        );

        let report = generate_volumes(&request);
        assert!(report.documents["VOL"].volumes.is_empty());
    }

    #[test]
    fn test_week_indexing_defaults_to_legacy() {
        let request = GenerationRequest::new(
            catalogs(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            "0000",
        );
        assert_eq!(request.week_indexing, WeekIndexing::Legacy52);

        let request = request.with_week_indexing(WeekIndexing::IsoCalendar);
        assert_eq!(request.week_indexing, WeekIndexing::IsoCalendar);
    }
}
