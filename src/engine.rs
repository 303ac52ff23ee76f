use crate::error::FormulaEvaluationError;
use crate::formula::{Formula, FormulaContext};
use crate::schema::*;
use crate::utils::{apply_weight, generate_date_range, period_index, round_to_format};
use chrono::NaiveDate;
use log::{debug, warn};
use std::collections::BTreeMap;

/// Group keys in processing order.
pub const GROUP_ORDER: [(Granularity, NumberFormat); 4] = [
    (Granularity::Week, NumberFormat::Integer),
    (Granularity::Week, NumberFormat::Decimal),
    (Granularity::Day, NumberFormat::Integer),
    (Granularity::Day, NumberFormat::Decimal),
];

/// Measures sharing a granularity and format, with their shared date sequence.
#[derive(Debug, Clone)]
pub struct KpiGroup<'a> {
    pub granularity: Granularity,
    pub format: NumberFormat,
    pub measures: Vec<&'a Measure>,
    pub dates: Vec<NaiveDate>,
}

/// A cell whose formula failed and was written as `0`.
#[derive(Debug, Clone, PartialEq)]
pub struct CellError {
    pub measure_code: String,
    pub startdate: NaiveDate,
    pub prd: String,
    pub acc: String,
    pub error: FormulaEvaluationError,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    pub documents: BTreeMap<String, OutputDocument>,
    pub errors: Vec<CellError>,
}

impl GenerationReport {
    pub fn total_rows(&self) -> usize {
        self.documents.values().map(|d| d.row_count()).sum()
    }
}

/// Splits measures into the non-empty (granularity, format) groups and builds
/// each group's date sequence once.
pub fn plan_groups(measures: &[Measure], start: NaiveDate, end: NaiveDate) -> Vec<KpiGroup<'_>> {
    GROUP_ORDER
        .iter()
        .filter_map(|&(granularity, format)| {
            let members: Vec<&Measure> = measures
                .iter()
                .filter(|m| m.time_granularity == granularity && m.format == format)
                .collect();

            if members.is_empty() {
                return None;
            }

            let dates = generate_date_range(start, end, granularity);
            if dates.is_empty() {
                debug!(
                    "No {:?} periods between {} and {}; {} measure(s) will have no volumes",
                    granularity,
                    start,
                    end,
                    members.len()
                );
            }

            Some(KpiGroup {
                granularity,
                format,
                measures: members,
                dates,
            })
        })
        .collect()
}

pub struct VolumeGenerator<'a> {
    request: &'a GenerationRequest,
}

impl<'a> VolumeGenerator<'a> {
    pub fn new(request: &'a GenerationRequest) -> Self {
        Self { request }
    }

    pub fn generate(&self) -> GenerationReport {
        let request = self.request;
        let mut report = GenerationReport::default();

        for group in plan_groups(&request.measures, request.start_date, request.end_date) {
            debug!(
                "Generating {} measure(s) at {:?}/{:?} over {} period(s)",
                group.measures.len(),
                group.granularity,
                group.format,
                group.dates.len()
            );

            for measure in &group.measures {
                let mut errors = Vec::new();
                let document = self.generate_document(measure, &group, &mut errors);
                if report
                    .documents
                    .insert(measure.measure_code.clone(), document)
                    .is_some()
                {
                    warn!(
                        "Measure code '{}' appears more than once; keeping the last definition",
                        measure.measure_code
                    );
                    report
                        .errors
                        .retain(|e| e.measure_code != measure.measure_code);
                }
                report.errors.extend(errors);
            }
        }

        report
    }

    pub fn generate_document(
        &self,
        measure: &Measure,
        group: &KpiGroup<'_>,
        errors: &mut Vec<CellError>,
    ) -> OutputDocument {
        let request = self.request;
        let mut document = OutputDocument::new(&measure.measure_code, &request.sales_org);

        let formula = Formula::parse(&measure.formula);
        match &formula {
            Ok(f) => debug!(
                "Measure '{}' reads [{}]",
                measure.measure_code,
                f.variables()
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Err(e) => warn!(
                "Measure '{}': {}; all of its values default to 0",
                measure.measure_code, e
            ),
        }

        for &date in &group.dates {
            let index = period_index(
                request.start_date,
                date,
                group.granularity,
                request.week_indexing,
            );
            let mut rows = Vec::with_capacity(request.products.len() * request.accounts.len());

            for product in &request.products {
                for account in &request.accounts {
                    let raw = match &formula {
                        Ok(f) => f.evaluate(&FormulaContext::new(index, product, account)),
                        Err(e) => Err(e.clone()),
                    };

                    let raw = raw.unwrap_or_else(|error| {
                        warn!(
                            "Measure '{}' on {} for product '{}', account '{}': {}",
                            measure.measure_code, date, product.ext_id, account.ext_id, error
                        );
                        errors.push(CellError {
                            measure_code: measure.measure_code.clone(),
                            startdate: date,
                            prd: product.ext_id.clone(),
                            acc: account.ext_id.clone(),
                            error,
                        });
                        0.0
                    });

                    let value = round_to_format(apply_weight(raw, account.weight), measure.format);
                    rows.push(VolumeRow {
                        prd: product.ext_id.clone(),
                        acc: account.ext_id.clone(),
                        value,
                    });
                }
            }

            document.volumes.push(PeriodVolume {
                startdate: date,
                rows,
            });
        }

        debug!(
            "Measure '{}': {} period(s), {} row(s)",
            measure.measure_code,
            document.volumes.len(),
            document.row_count()
        );

        document
    }
}

pub fn generate_request(request: &GenerationRequest) -> GenerationReport {
    VolumeGenerator::new(request).generate()
}
