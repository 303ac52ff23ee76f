use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum Granularity {
    #[serde(rename = "D")]
    #[schemars(description = "One period per calendar day")]
    Day,

    #[serde(rename = "W")]
    #[schemars(description = "One period per ISO week, dated on its Monday")]
    Week,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum NumberFormat {
    #[serde(rename = "I")]
    #[schemars(description = "Values rounded to whole numbers")]
    Integer,

    #[serde(rename = "D")]
    #[schemars(description = "Values rounded to two decimal places")]
    Decimal,
}

impl NumberFormat {
    pub fn decimal_places(&self) -> u32 {
        match self {
            NumberFormat::Integer => 0,
            NumberFormat::Decimal => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[schemars(description = "External identifier of the customer or sales entity")]
    pub ext_id: String,

    #[schemars(
        description = "Percentage (0-100) applied to every value generated for this account"
    )]
    pub weight: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acc_custom_value1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acc_custom_value2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acc_custom_value3: Option<f64>,
}

impl Account {
    /// Custom value by its 1-based slot number.
    pub fn custom_value(&self, slot: u8) -> Option<f64> {
        match slot {
            1 => self.acc_custom_value1,
            2 => self.acc_custom_value2,
            3 => self.acc_custom_value3,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[schemars(description = "External identifier of the product")]
    pub ext_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Base value exposed to formulas as 'initialValue'")]
    pub initial_value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prd_custom_value1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prd_custom_value2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prd_custom_value3: Option<f64>,
}

impl Product {
    /// Custom value by its 1-based slot number.
    pub fn custom_value(&self, slot: u8) -> Option<f64> {
        match slot {
            1 => self.prd_custom_value1,
            2 => self.prd_custom_value2,
            3 => self.prd_custom_value3,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    #[schemars(description = "KPI code, copied to the 'type' field of the output document")]
    pub measure_code: String,

    #[schemars(
        description = "Arithmetic expression over periodIndex, initialValue, prdCustomValue1-3 and accCustomValue1-3"
    )]
    pub formula: String,

    pub time_granularity: Granularity,

    pub format: NumberFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AccountCatalog {
    pub accounts: Vec<Account>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProductCatalog {
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MeasureCatalog {
    pub measures: Vec<Measure>,
}

/// The three input collections, as loaded from disk.
#[derive(Debug, Clone)]
pub struct Catalogs {
    pub accounts: AccountCatalog,
    pub products: ProductCatalog,
    pub measures: MeasureCatalog,
}

impl Catalogs {
    pub fn generate_json_schemas() -> Vec<(&'static str, schemars::schema::RootSchema)> {
        vec![
            ("accounts", schemars::schema_for!(AccountCatalog)),
            ("products", schemars::schema_for!(ProductCatalog)),
            ("measures", schemars::schema_for!(MeasureCatalog)),
        ]
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let mut schemas = serde_json::Map::new();
        for (name, schema) in Self::generate_json_schemas() {
            schemas.insert(name.to_string(), serde_json::to_value(schema)?);
        }
        serde_json::to_string_pretty(&schemas)
    }
}

/// How week-granularity period offsets are counted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WeekIndexing {
    /// Week-number delta plus 52 per ISO year. After a 53-week year, two
    /// consecutive weeks share an index.
    #[default]
    Legacy52,
    /// Exact count of weeks between the two ISO-week Mondays.
    IsoCalendar,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub accounts: Vec<Account>,
    pub products: Vec<Product>,
    pub measures: Vec<Measure>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub sales_org: String,
    #[serde(default)]
    pub week_indexing: WeekIndexing,
}

impl GenerationRequest {
    pub fn new(
        catalogs: Catalogs,
        start_date: NaiveDate,
        end_date: NaiveDate,
        sales_org: impl Into<String>,
    ) -> Self {
        Self {
            accounts: catalogs.accounts.accounts,
            products: catalogs.products.products,
            measures: catalogs.measures.measures,
            start_date,
            end_date,
            sales_org: sales_org.into(),
            week_indexing: WeekIndexing::default(),
        }
    }

    pub fn with_week_indexing(mut self, week_indexing: WeekIndexing) -> Self {
        self.week_indexing = week_indexing;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeRow {
    pub prd: String,
    pub acc: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodVolume {
    pub startdate: NaiveDate,
    pub rows: Vec<VolumeRow>,
}

/// All generated values for one KPI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDocument {
    #[serde(rename = "type")]
    pub measure_code: String,
    pub salesorg: String,
    pub volumes: Vec<PeriodVolume>,
}

impl OutputDocument {
    pub fn new(measure_code: &str, sales_org: &str) -> Self {
        Self {
            measure_code: measure_code.to_string(),
            salesorg: sales_org.to_string(),
            volumes: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.volumes.iter().map(|v| v.rows.len()).sum()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
