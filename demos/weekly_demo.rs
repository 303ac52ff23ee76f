use chrono::NaiveDate;
use kpi_volume_generator::*;

fn main() {
    println!("📊 Weekly KPI Volume Demo\n");
    println!("Two accounts, two products and one weekly KPI across the 2020/2021 ISO year change.");
    println!("ISO 2020 has 53 weeks, so the legacy index repeats a value at the turn of the year.\n");

    let catalogs = Catalogs {
        accounts: AccountCatalog {
            accounts: vec![
                Account {
                    ext_id: "STORE-01".to_string(),
                    weight: 100.0,
                    acc_custom_value1: Some(1.2),
                    acc_custom_value2: None,
                    acc_custom_value3: None,
                },
                Account {
                    ext_id: "STORE-02".to_string(),
                    weight: 40.0,
                    acc_custom_value1: Some(0.8),
                    acc_custom_value2: None,
                    acc_custom_value3: None,
                },
            ],
        },
        products: ProductCatalog {
            products: vec![
                Product {
                    ext_id: "SKU-A".to_string(),
                    initial_value: Some(120.0),
                    prd_custom_value1: Some(3.0),
                    prd_custom_value2: None,
                    prd_custom_value3: None,
                },
                Product {
                    ext_id: "SKU-B".to_string(),
                    initial_value: Some(45.0),
                    prd_custom_value1: Some(1.0),
                    prd_custom_value2: None,
                    prd_custom_value3: None,
                },
            ],
        },
        measures: MeasureCatalog {
            measures: vec![Measure {
                measure_code: "WEEKLY_UNITS".to_string(),
                formula: "(initialValue + prdCustomValue1 * periodIndex) * accCustomValue1"
                    .to_string(),
                time_granularity: Granularity::Week,
                format: NumberFormat::Decimal,
            }],
        },
    };

    let start = NaiveDate::from_ymd_opt(2020, 12, 16).unwrap();
    let end = NaiveDate::from_ymd_opt(2021, 1, 13).unwrap();

    for indexing in [WeekIndexing::Legacy52, WeekIndexing::IsoCalendar] {
        let request = GenerationRequest::new(catalogs.clone(), start, end, "0000")
            .with_week_indexing(indexing);

        let report = generate_volumes(&request);
        println!("🔄 {:?}", indexing);
        if let Some(doc) = report.documents.get("WEEKLY_UNITS") {
            for volume in &doc.volumes {
                let values: Vec<String> = volume
                    .rows
                    .iter()
                    .map(|r| format!("{}/{}={:>8.2}", r.prd, r.acc, r.value))
                    .collect();
                println!("  {}  {}", volume.startdate, values.join("  "));
            }
        }
        for cell in &report.errors {
            eprintln!("⚠️  {} {} {}/{}: {}", cell.measure_code, cell.startdate, cell.prd, cell.acc, cell.error);
        }
        println!();
    }
}
