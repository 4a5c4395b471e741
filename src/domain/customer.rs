use crate::error::FieldError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identity and profile data submitted when a customer is onboarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerProfile {
    /// National identity number, 16 digits.
    pub nik: String,
    pub full_name: String,
    pub legal_name: String,
    pub birth_place: String,
    pub birth_date: NaiveDate,
    pub salary: Decimal,
    #[serde(default)]
    pub ktp_photo_path: Option<String>,
    #[serde(default)]
    pub selfie_photo_path: Option<String>,
}

impl CustomerProfile {
    pub fn validate(&self) -> Result<(), FieldError> {
        if !is_valid_nik(&self.nik) {
            return Err(FieldError::InvalidNik);
        }
        for (field, value) in [
            ("full_name", &self.full_name),
            ("legal_name", &self.legal_name),
            ("birth_place", &self.birth_place),
        ] {
            if value.trim().is_empty() {
                return Err(FieldError::Empty(field));
            }
        }
        if self.salary < Decimal::ZERO {
            return Err(FieldError::Negative("salary"));
        }
        Ok(())
    }
}

/// Profile fields that may change after onboarding. The NIK is identity and
/// stays fixed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub legal_name: Option<String>,
    pub birth_place: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub salary: Option<Decimal>,
    pub ktp_photo_path: Option<String>,
    pub selfie_photo_path: Option<String>,
}

/// A persisted customer.
///
/// Limits and transactions reference the customer by `id`; they are queried on
/// demand rather than held here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: u64,
    #[serde(flatten)]
    pub profile: CustomerProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Tombstone. Customers are never physically removed.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Customer {
    pub fn new(id: u64, profile: CustomerProfile, now: DateTime<Utc>) -> Self {
        Self {
            id,
            profile,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn apply(&mut self, update: ProfileUpdate, now: DateTime<Utc>) {
        let profile = &mut self.profile;
        if let Some(full_name) = update.full_name {
            profile.full_name = full_name;
        }
        if let Some(legal_name) = update.legal_name {
            profile.legal_name = legal_name;
        }
        if let Some(birth_place) = update.birth_place {
            profile.birth_place = birth_place;
        }
        if let Some(birth_date) = update.birth_date {
            profile.birth_date = birth_date;
        }
        if let Some(salary) = update.salary {
            profile.salary = salary;
        }
        if update.ktp_photo_path.is_some() {
            profile.ktp_photo_path = update.ktp_photo_path;
        }
        if update.selfie_photo_path.is_some() {
            profile.selfie_photo_path = update.selfie_photo_path;
        }
        self.updated_at = now;
    }
}

pub fn is_valid_nik(nik: &str) -> bool {
    nik.len() == 16 && nik.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn profile() -> CustomerProfile {
        CustomerProfile {
            nik: "3171234567890001".to_string(),
            full_name: "Budi Santoso".to_string(),
            legal_name: "Budi Santoso".to_string(),
            birth_place: "Jakarta".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
            salary: dec!(8500000),
            ktp_photo_path: None,
            selfie_photo_path: None,
        }
    }

    #[test]
    fn test_nik_format() {
        assert!(is_valid_nik("3171234567890001"));
        assert!(!is_valid_nik("317123456789000"));
        assert!(!is_valid_nik("31712345678900011"));
        assert!(!is_valid_nik("31712345678900a1"));
    }

    #[test]
    fn test_profile_validation() {
        assert!(profile().validate().is_ok());

        let mut p = profile();
        p.nik = "123".to_string();
        assert_eq!(p.validate(), Err(FieldError::InvalidNik));

        let mut p = profile();
        p.legal_name = "  ".to_string();
        assert_eq!(p.validate(), Err(FieldError::Empty("legal_name")));

        let mut p = profile();
        p.salary = dec!(-1);
        assert_eq!(p.validate(), Err(FieldError::Negative("salary")));
    }

    #[test]
    fn test_apply_update_keeps_identity() {
        let now = Utc::now();
        let mut customer = Customer::new(7, profile(), now);
        customer.apply(
            ProfileUpdate {
                salary: Some(dec!(9000000)),
                ..Default::default()
            },
            now,
        );
        assert_eq!(customer.profile.nik, "3171234567890001");
        assert_eq!(customer.profile.salary, dec!(9000000));
        assert_eq!(customer.profile.full_name, "Budi Santoso");
    }
}
