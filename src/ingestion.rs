use crate::error::{KpiVolumeError, Result};
use crate::schema::{AccountCatalog, Catalogs, MeasureCatalog, ProductCatalog};
use log::{debug, info};
use serde::de::DeserializeOwned;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const ACCOUNTS_FILE: &str = "accounts.json";
pub const PRODUCTS_FILE: &str = "products.json";
pub const MEASURES_FILE: &str = "KPIs.json";

pub const REQUIRED_FILES: [&str; 3] = [ACCOUNTS_FILE, PRODUCTS_FILE, MEASURES_FILE];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Loaded,
    NotFound,
    InvalidJson(String),
    Unreadable(String),
}

impl FileStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, FileStatus::Loaded)
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Loaded => write!(f, "Loaded"),
            FileStatus::NotFound => write!(f, "Not found"),
            FileStatus::InvalidJson(_) => write!(f, "Invalid JSON"),
            FileStatus::Unreadable(e) => write!(f, "Error: {}", e),
        }
    }
}

/// Load state of every required catalog file in a folder. `catalogs` is set
/// only when every file loaded.
#[derive(Debug, Clone)]
pub struct CatalogDirStatus {
    pub dir: PathBuf,
    pub files: Vec<(&'static str, FileStatus)>,
    pub catalogs: Option<Catalogs>,
}

impl CatalogDirStatus {
    pub fn all_loaded(&self) -> bool {
        self.files.iter().all(|(_, status)| status.is_loaded())
    }
}

fn read_catalog<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<T> {
    let path = dir.join(file);
    let text = fs::read_to_string(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => KpiVolumeError::MissingCatalogFile(path.display().to_string()),
        _ => KpiVolumeError::IoError(e),
    })?;

    serde_json::from_str(&text).map_err(|e| KpiVolumeError::InvalidCatalog {
        file: file.to_string(),
        details: e.to_string(),
    })
}

fn file_status<T>(result: &Result<T>) -> FileStatus {
    match result {
        Ok(_) => FileStatus::Loaded,
        Err(KpiVolumeError::MissingCatalogFile(_)) => FileStatus::NotFound,
        Err(KpiVolumeError::InvalidCatalog { details, .. }) => {
            FileStatus::InvalidJson(details.clone())
        }
        Err(e) => FileStatus::Unreadable(e.to_string()),
    }
}

fn log_loaded(catalogs: &Catalogs, dir: &Path) {
    info!(
        "Loaded {} account(s), {} product(s) and {} measure(s) from {}",
        catalogs.accounts.accounts.len(),
        catalogs.products.products.len(),
        catalogs.measures.measures.len(),
        dir.display()
    );
}

/// Checks each required file without stopping at the first failure. Each file
/// is read once; the parsed catalogs are kept when all three load.
pub fn inspect_catalog_dir(dir: &Path) -> CatalogDirStatus {
    let accounts = read_catalog::<AccountCatalog>(dir, ACCOUNTS_FILE);
    let products = read_catalog::<ProductCatalog>(dir, PRODUCTS_FILE);
    let measures = read_catalog::<MeasureCatalog>(dir, MEASURES_FILE);

    let files = vec![
        (ACCOUNTS_FILE, file_status(&accounts)),
        (PRODUCTS_FILE, file_status(&products)),
        (MEASURES_FILE, file_status(&measures)),
    ];

    for (file, status) in &files {
        debug!("{}: {}", file, status);
    }

    let catalogs = match (accounts, products, measures) {
        (Ok(accounts), Ok(products), Ok(measures)) => {
            let catalogs = Catalogs {
                accounts,
                products,
                measures,
            };
            log_loaded(&catalogs, dir);
            Some(catalogs)
        }
        _ => None,
    };

    CatalogDirStatus {
        dir: dir.to_path_buf(),
        files,
        catalogs,
    }
}

pub fn load_catalog_dir(dir: &Path) -> Result<Catalogs> {
    let catalogs = Catalogs {
        accounts: read_catalog(dir, ACCOUNTS_FILE)?,
        products: read_catalog(dir, PRODUCTS_FILE)?,
        measures: read_catalog(dir, MEASURES_FILE)?,
    };

    log_loaded(&catalogs, dir);

    Ok(catalogs)
}
