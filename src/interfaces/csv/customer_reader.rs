use crate::domain::customer::CustomerProfile;
use crate::domain::tenor::TenorLimit;
use crate::error::{FieldError, LendingError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of the customers file.
///
/// `limits` packs the per-tenor limits as `tenor=amount` pairs separated by
/// `|`, e.g. `1=1000000|2=1200000|3=1500000|4=2000000`.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerRecord {
    pub nik: String,
    pub full_name: String,
    pub legal_name: String,
    pub birth_place: String,
    pub birth_date: NaiveDate,
    pub salary: Decimal,
    pub limits: String,
}

impl CustomerRecord {
    /// Splits the row into the onboarding inputs. Only the shape of the
    /// limits column is checked here; the tenor policy runs on onboarding.
    pub fn into_onboarding(self) -> Result<(CustomerProfile, Vec<TenorLimit>)> {
        let limits = parse_limits(&self.limits)?;
        let profile = CustomerProfile {
            nik: self.nik,
            full_name: self.full_name,
            legal_name: self.legal_name,
            birth_place: self.birth_place,
            birth_date: self.birth_date,
            salary: self.salary,
            ktp_photo_path: None,
            selfie_photo_path: None,
        };
        Ok((profile, limits))
    }
}

pub fn parse_limits(raw: &str) -> Result<Vec<TenorLimit>> {
    raw.split('|')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (tenor, amount) = pair
                .split_once('=')
                .ok_or_else(|| malformed(format!("limit pair '{pair}' is not tenor=amount")))?;
            let tenor = tenor
                .trim()
                .parse::<u32>()
                .map_err(|_| malformed(format!("tenor '{}' is not a number", tenor.trim())))?;
            let amount = amount
                .trim()
                .parse::<Decimal>()
                .map_err(|_| malformed(format!("limit amount '{}' is not a number", amount.trim())))?;
            Ok(TenorLimit::new(tenor, amount))
        })
        .collect()
}

fn malformed(message: String) -> LendingError {
    FieldError::Malformed(message).into()
}

/// Reads customers from a CSV source.
pub struct CustomerReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CustomerReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes one record per row.
    pub fn customers(self) -> impl Iterator<Item = Result<CustomerRecord>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LendingError::from))
    }
}
