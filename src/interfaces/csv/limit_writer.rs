use crate::domain::limit::CustomerLimit;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct LimitRecord {
    customer: u64,
    tenor: u32,
    limit: Decimal,
    used: Decimal,
    available: Decimal,
}

impl From<&CustomerLimit> for LimitRecord {
    fn from(row: &CustomerLimit) -> Self {
        Self {
            customer: row.customer_id,
            tenor: row.tenor.months(),
            limit: row.limit_amount.value().normalize(),
            used: row.used_amount.value().normalize(),
            available: row.available_amount().value().normalize(),
        }
    }
}

/// Writes the limit ledger as CSV: `customer,tenor,limit,used,available`.
pub struct LimitWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> LimitWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes the header even when `limits` is empty.
    pub fn write_limits(&mut self, limits: &[CustomerLimit]) -> Result<()> {
        if limits.is_empty() {
            self.writer
                .write_record(["customer", "tenor", "limit", "used", "available"])?;
        }
        for row in limits {
            self.writer.serialize(LimitRecord::from(row))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
