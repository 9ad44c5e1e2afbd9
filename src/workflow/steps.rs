//! Request bodies for the step submissions.

use chrono::{Datelike, NaiveDate};
use serde_json::{Value, json};

use crate::config::StepDefaults;
use crate::data::{Address, Employment, PersonName};

pub const STATUS_STARTED: &str = "started";
pub const STATUS_SUBMITTED: &str = "submitted";
pub const STATUS_FINISHED: &str = "finished";
pub const STATUS_VERIFIED: &str = "verified";

pub const HOUSING_HISTORY_STEP: &str = "address";
pub const SUBMISSION_DISCLOSURE_STEP: &str = "submission_disclosure_step";

/// Contact details copied into the `personal_details` step.
pub struct Contact<'a> {
    pub name: &'a PersonName,
    pub email: &'a str,
    pub phone: &'a str,
}

/// Emergency contact listed in the `emergency_contacts` step.
pub struct EmergencyContact {
    pub name: PersonName,
    pub phone: String,
}

/// The seven personal details steps, in submission order.
pub fn personal_details_steps(
    contact: &Contact<'_>,
    emergency: &EmergencyContact,
    defaults: &StepDefaults,
) -> Vec<(&'static str, Value)> {
    vec![
        (
            "personal_details",
            json!({ "data": {
                "contact_first_name": contact.name.first,
                "contact_last_name": contact.name.last,
                "contact_middle_name": contact.name.middle,
                "contact_email": contact.email,
                "contact_phone_number": contact.phone,
            }}),
        ),
        (
            "dependents",
            json!({ "data": { "dependents": defaults.dependents } }),
        ),
        (
            "emergency_contacts",
            json!({ "data": { "emergency_contacts": [{
                "first_name": emergency.name.first,
                "last_name": emergency.name.last,
                "phone_number": emergency.phone,
                "relationship": defaults.emergency_contact_relationship,
            }]}}),
        ),
        (
            "pets",
            json!({ "data": { "do_you_have_pets": defaults.pets } }),
        ),
        (
            "vehicles",
            json!({ "data": { "do_you_have_vehicles": defaults.vehicles } }),
        ),
        (
            "military_first_responder_teacher",
            json!({ "data": {
                "are_you_military_first_responder_teacher": defaults.military_first_responder_teacher,
            }}),
        ),
        (
            "lead_source",
            json!({ "data": { "lead_source": defaults.lead_source } }),
        ),
    ]
}

/// A single own-home residence marked as current.
pub fn housing_history_payload(
    address: &Address,
    monthly_mortgage_payment: u64,
    defaults: &StepDefaults,
) -> Value {
    json!({ "data": { "address": [{
        "housing_type": defaults.housing_type,
        "own_home": {
            "address": address.full_address(),
            "address_components": {
                "address1": address.address1,
                "address2": address.address2,
                "city": address.city,
                "state": address.state,
                "zip": address.zip,
                "country": address.country,
                "county": address.county,
            },
            "current_residence": true,
            "move_in_date": "2020-01-01",
            "monthly_mortgage_payment": monthly_mortgage_payment,
            "reason_for_leaving": "Just because",
        },
    }]}})
}

pub fn self_employment_payload(employment: &Employment) -> Value {
    json!({
        "type": "self_employment",
        "start_date": employment.start_date.format("%Y-%m-%d").to_string(),
        "additional_data": {
            "company": employment.company,
            "job_title": employment.job_title,
        },
        "amount": {
            "cents": employment.monthly_salary * 100,
            "currency": "USD",
        },
        "pay_period": "monthly",
    })
}

pub fn paystub_source_payload(income_id: &str) -> Value {
    json!({ "income_id": income_id, "type": "paystub" })
}

pub fn move_in_payload(date: NaiveDate) -> Value {
    json!({ "desired_move_in_date": date.format("%Y-%m-%d").to_string() })
}

pub fn disclosure_payload(name: &PersonName, signature_asset_id: &str) -> Value {
    json!({ "data": {
        "full_name": name.signature_name(),
        "signature": signature_asset_id,
    }})
}

/// Last calendar day of the month containing `date`.
pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .unwrap_or(date)
}

/// Rewrite the remote application view into a final submission body.
///
/// Every `status: "started"` and `application_status: "finished"` becomes
/// `"submitted"`, at any depth. Everything else is copied unchanged.
pub fn mark_submitted(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(mark_submitted).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let replaced = match (key.as_str(), &value) {
                        ("status", Value::String(s)) if s == STATUS_STARTED => {
                            Value::String(STATUS_SUBMITTED.to_string())
                        }
                        ("application_status", Value::String(s)) if s == STATUS_FINISHED => {
                            Value::String(STATUS_SUBMITTED.to_string())
                        }
                        _ => mark_submitted(value),
                    };
                    (key, replaced)
                })
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name() -> PersonName {
        PersonName {
            first: "Riley".into(),
            middle: "Jo".into(),
            last: "Hayes".into(),
        }
    }

    #[test]
    fn last_day_handles_month_lengths() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert_eq!(last_day_of_month(d(2024, 2, 10)), d(2024, 2, 29));
        assert_eq!(last_day_of_month(d(2023, 2, 1)), d(2023, 2, 28));
        assert_eq!(last_day_of_month(d(2025, 12, 31)), d(2025, 12, 31));
        assert_eq!(last_day_of_month(d(2025, 4, 15)), d(2025, 4, 30));
    }

    #[test]
    fn move_in_date_format() {
        let payload = move_in_payload(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
        assert_eq!(payload, json!({"desired_move_in_date": "2025-06-30"}));
    }

    #[test]
    fn mark_submitted_rewrites_nested_statuses() {
        let view = json!({
            "application": {
                "status": "started",
                "application_status": "finished",
                "applicants": [
                    {"status": "started", "verifications": [{"status": "verified"}]},
                    {"status": "pending"}
                ],
                "note": "started"
            }
        });
        let out = mark_submitted(view);
        assert_eq!(out["application"]["status"], "submitted");
        assert_eq!(out["application"]["application_status"], "submitted");
        assert_eq!(out["application"]["applicants"][0]["status"], "submitted");
        assert_eq!(
            out["application"]["applicants"][0]["verifications"][0]["status"],
            "verified"
        );
        assert_eq!(out["application"]["applicants"][1]["status"], "pending");
        assert_eq!(out["application"]["note"], "started");
    }

    #[test]
    fn application_status_started_is_left_alone() {
        let out = mark_submitted(json!({"application_status": "started", "status": "finished"}));
        assert_eq!(out, json!({"application_status": "started", "status": "finished"}));
    }

    #[test]
    fn personal_details_cover_seven_steps_in_order() {
        let name = name();
        let contact = Contact {
            name: &name,
            email: "riley@example.test",
            phone: "5125550100",
        };
        let emergency = EmergencyContact {
            name: name.clone(),
            phone: "5125550101".into(),
        };
        let steps = personal_details_steps(&contact, &emergency, &StepDefaults::default());

        let names: Vec<_> = steps.iter().map(|(step, _)| *step).collect();
        assert_eq!(
            names,
            [
                "personal_details",
                "dependents",
                "emergency_contacts",
                "pets",
                "vehicles",
                "military_first_responder_teacher",
                "lead_source"
            ]
        );
        assert_eq!(steps[0].1["data"]["contact_email"], "riley@example.test");
        assert_eq!(steps[2].1["data"]["emergency_contacts"][0]["relationship"], "Other");
        assert_eq!(steps[6].1["data"]["lead_source"], "Google");
    }

    #[test]
    fn disclosure_uses_signature_name() {
        let payload = disclosure_payload(&name(), "gid://asset/9");
        assert_eq!(payload["data"]["full_name"], "Riley J. Hayes");
        assert_eq!(payload["data"]["signature"], "gid://asset/9");
    }

    #[test]
    fn self_employment_amount_in_cents() {
        let employment = Employment {
            company: "Blue Harbor Labs".into(),
            job_title: "Designer".into(),
            start_date: NaiveDate::from_ymd_opt(2019, 3, 4).unwrap(),
            monthly_salary: 4500,
        };
        let payload = self_employment_payload(&employment);
        assert_eq!(payload["amount"]["cents"], 450_000);
        assert_eq!(payload["start_date"], "2019-03-04");
        assert_eq!(payload["type"], "self_employment");
    }
}
