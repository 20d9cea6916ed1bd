//! Customer profile submitted for assessment

use serde::{Deserialize, Serialize};

/// Customer attributes used by both models.
///
/// Missing fields take the values from [`CustomerProfile::default`], so a
/// partially filled JSON payload always deserializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerProfile {
    pub age: f64,
    pub family_size: f64,
    pub dependents: f64,
    #[serde(alias = "experience")]
    pub years_of_employment: f64,
    #[serde(alias = "income")]
    pub monthly_salary: f64,
    pub credit_score: f64,
    pub bank_balance: f64,
    pub emergency_fund: f64,
    pub monthly_rent: f64,
    pub school_fees: f64,
    pub college_fees: f64,
    pub travel_expenses: f64,
    pub groceries_utilities: f64,
    pub other_monthly_expenses: f64,
    pub current_emi_amount: f64,
    #[serde(alias = "loan_amount")]
    pub requested_amount: f64,
    /// Months
    #[serde(alias = "loan_tenure")]
    pub requested_tenure: f64,

    pub gender: String,
    pub marital_status: String,
    pub education: String,
    pub employment_type: String,
    pub company_type: String,
    pub house_type: String,
    pub existing_loans: String,
    pub emi_scenario: String,

    /// Quoted annual rate; informational, not a model input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest_rate: Option<f64>,
}

impl Default for CustomerProfile {
    fn default() -> Self {
        Self {
            age: 30.0,
            family_size: 3.0,
            dependents: 1.0,
            years_of_employment: 5.0,
            monthly_salary: 50_000.0,
            credit_score: 700.0,
            bank_balance: 200_000.0,
            emergency_fund: 100_000.0,
            monthly_rent: 25_000.0,
            school_fees: 5_000.0,
            college_fees: 0.0,
            travel_expenses: 5_000.0,
            groceries_utilities: 15_000.0,
            other_monthly_expenses: 5_000.0,
            current_emi_amount: 0.0,
            requested_amount: 500_000.0,
            requested_tenure: 240.0,
            gender: "Male".to_string(),
            marital_status: "Married".to_string(),
            education: "Graduate".to_string(),
            employment_type: "Private".to_string(),
            company_type: "MNC".to_string(),
            house_type: "Rented".to_string(),
            existing_loans: "No".to_string(),
            emi_scenario: "New_Loan".to_string(),
            interest_rate: None,
        }
    }
}

impl CustomerProfile {
    /// Built-in demo customers, in a fixed order.
    pub fn samples() -> Vec<CustomerProfile> {
        let sample = |income: f64,
                      age: f64,
                      experience: f64,
                      family_size: f64,
                      credit_score: f64,
                      loan_amount: f64,
                      loan_tenure: f64,
                      interest_rate: f64| CustomerProfile {
            monthly_salary: income,
            age,
            years_of_employment: experience,
            family_size,
            credit_score,
            requested_amount: loan_amount,
            requested_tenure: loan_tenure,
            interest_rate: Some(interest_rate),
            ..CustomerProfile::default()
        };

        vec![
            sample(75_000.0, 28.0, 3.0, 2.0, 750.0, 800_000.0, 240.0, 8.2),
            sample(120_000.0, 35.0, 8.0, 4.0, 720.0, 1_200_000.0, 300.0, 8.5),
            sample(45_000.0, 25.0, 2.0, 2.0, 680.0, 500_000.0, 180.0, 9.0),
            sample(95_000.0, 32.0, 6.0, 3.0, 780.0, 900_000.0, 240.0, 8.0),
            sample(60_000.0, 29.0, 4.0, 3.0, 710.0, 600_000.0, 200.0, 8.7),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let profile: CustomerProfile =
            serde_json::from_str(r#"{"age": 41, "gender": "Female"}"#).unwrap();

        assert_eq!(profile.age, 41.0);
        assert_eq!(profile.gender, "Female");
        assert_eq!(profile.monthly_salary, 50_000.0);
        assert_eq!(profile.credit_score, 700.0);
        assert_eq!(profile.employment_type, "Private");
        assert_eq!(profile.emi_scenario, "New_Loan");
    }

    #[test]
    fn test_short_aliases() {
        let profile: CustomerProfile = serde_json::from_str(
            r#"{"income": 75000, "loan_amount": 800000, "loan_tenure": 240, "experience": 3}"#,
        )
        .unwrap();

        assert_eq!(profile.monthly_salary, 75_000.0);
        assert_eq!(profile.requested_amount, 800_000.0);
        assert_eq!(profile.requested_tenure, 240.0);
        assert_eq!(profile.years_of_employment, 3.0);
    }

    #[test]
    fn test_samples_are_fixed() {
        let samples = CustomerProfile::samples();
        assert_eq!(samples.len(), 5);
        assert_eq!(samples[0].monthly_salary, 75_000.0);
        assert_eq!(samples[2].credit_score, 680.0);
        assert_eq!(samples, CustomerProfile::samples());
    }
}
