//! Producers of the opaque field values that fill step payloads.
//!
//! The workflow never inspects these values beyond placing them into
//! requests. [`RandomDataSource`] draws them from small fixed pools.

use chrono::{Duration as ChronoDuration, Local, NaiveDate};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonName {
    pub first: String,
    pub middle: String,
    pub last: String,
}

impl PersonName {
    /// "First M. Last", as signed on the submission disclosure.
    pub fn signature_name(&self) -> String {
        match self.middle.chars().next() {
            Some(initial) => format!("{} {initial}. {}", self.first, self.last),
            None => format!("{} {}", self.first, self.last),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    pub county: String,
}

impl Address {
    pub fn full_address(&self) -> String {
        format!(
            "{},{}, {}, {} {}",
            self.address1, self.address2, self.city, self.state, self.zip
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employment {
    pub company: String,
    pub job_title: String,
    pub start_date: NaiveDate,
    pub monthly_salary: u64,
}

/// Supplies applicant-facing values consumed as-is by payload construction.
pub trait ApplicantDataSource {
    fn full_name(&self) -> PersonName;
    fn email(&self) -> String;
    /// Ten-digit national phone number.
    fn phone(&self) -> String;
    /// Six-digit one-time passcode accepted by the test environment.
    fn otp(&self) -> String;
    fn address(&self) -> Address;
    fn employment(&self) -> Employment;
    fn monthly_mortgage_payment(&self) -> u64;
}

/// Default data source backed by `rand`.
#[derive(Debug, Clone)]
pub struct RandomDataSource {
    email_domain: String,
}

impl Default for RandomDataSource {
    fn default() -> Self {
        Self::new("mail.tm")
    }
}

const FIRST_NAMES: &[&str] = &[
    "Avery", "Jordan", "Morgan", "Riley", "Casey", "Taylor", "Quinn", "Harper", "Rowan", "Emerson",
];
const MIDDLE_NAMES: &[&str] = &["Lee", "Marie", "James", "Ann", "Ray", "Jo", "Kai", "Elise"];
const LAST_NAMES: &[&str] = &[
    "Walker", "Bennett", "Hayes", "Brooks", "Foster", "Reed", "Sullivan", "Ramirez", "Coleman",
];
const COMPANIES: &[&str] = &["Northwind Traders", "Blue Harbor Labs", "Cedar & Pine LLC"];
const JOB_TITLES: &[&str] = &["Consultant", "Designer", "Contractor", "Photographer"];

struct Locality {
    city: &'static str,
    state: &'static str,
    zip: &'static str,
    county: &'static str,
}

const LOCALITIES: &[Locality] = &[
    Locality { city: "Austin", state: "TX", zip: "78701", county: "Travis County" },
    Locality { city: "Denver", state: "CO", zip: "80202", county: "Denver County" },
    Locality { city: "Portland", state: "OR", zip: "97205", county: "Multnomah County" },
    Locality { city: "Raleigh", state: "NC", zip: "27601", county: "Wake County" },
];
const STREETS: &[&str] = &["Maple Avenue", "Oak Street", "Cedar Lane", "Elm Drive", "Lake Road"];

fn pick(pool: &[&'static str]) -> String {
    pool.choose(&mut rand::rng()).copied().unwrap_or_default().to_string()
}

impl RandomDataSource {
    pub fn new(email_domain: impl Into<String>) -> Self {
        Self {
            email_domain: email_domain.into(),
        }
    }
}

impl ApplicantDataSource for RandomDataSource {
    fn full_name(&self) -> PersonName {
        PersonName {
            first: pick(FIRST_NAMES),
            middle: pick(MIDDLE_NAMES),
            last: pick(LAST_NAMES),
        }
    }

    fn email(&self) -> String {
        let mut rng = rand::rng();
        let local: String = (0..12)
            .map(|_| {
                let n = rng.random_range(0..36u32);
                std::char::from_digit(n, 36).unwrap_or('x')
            })
            .collect();
        format!("{local}@{}", self.email_domain)
    }

    fn phone(&self) -> String {
        let mut rng = rand::rng();
        // NANP: area code and exchange never start with 0 or 1.
        let area = rng.random_range(200..=989u32);
        let exchange = rng.random_range(200..=999u32);
        let line = rng.random_range(0..=9999u32);
        format!("{area}{exchange}{line:04}")
    }

    fn otp(&self) -> String {
        rand::rng().random_range(100_000..=999_999u32).to_string()
    }

    fn address(&self) -> Address {
        let mut rng = rand::rng();
        let locality = LOCALITIES.choose(&mut rng).unwrap_or(&LOCALITIES[0]);
        let house = rng.random_range(10..=9999u32);
        let street = STREETS.choose(&mut rng).copied().unwrap_or("Main Street");
        Address {
            address1: format!("{house} {street}"),
            address2: rng.random_range(1..100u32).to_string(),
            city: locality.city.to_string(),
            state: locality.state.to_string(),
            zip: locality.zip.to_string(),
            country: "US".to_string(),
            county: locality.county.to_string(),
        }
    }

    fn employment(&self) -> Employment {
        let mut rng = rand::rng();
        let days_ago = rng.random_range(365..=3650i64);
        Employment {
            company: pick(COMPANIES),
            job_title: pick(JOB_TITLES),
            start_date: Local::now().date_naive() - ChronoDuration::days(days_ago),
            monthly_salary: rng.random_range(3_000..=12_000u64),
        }
    }

    fn monthly_mortgage_payment(&self) -> u64 {
        rand::rng().random_range(1000..=3000u64)
    }
}
