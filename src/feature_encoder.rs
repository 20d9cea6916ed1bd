//! Feature encoding for EMI model inference.
//!
//! Both models were trained on the same input schema, so a single encoder
//! serves eligibility and EMI-amount predictions alike. Features are produced
//! in the exact order expected by the ONNX graphs.

use crate::types::profile::CustomerProfile;

/// Width of the model input.
pub const FEATURE_DIM: usize = 65;

/// Number of numeric attributes at the head of the vector.
pub const NUMERIC_FEATURES: usize = 17;

/// Number of one-hot slots following the numeric attributes.
pub const CATEGORICAL_FEATURES: usize = 25;

/// Dimensions carrying information; the rest of the vector is zero padding.
pub const INFORMATIVE_FEATURES: usize = NUMERIC_FEATURES + CATEGORICAL_FEATURES;

const NUMERIC_NAMES: [&str; NUMERIC_FEATURES] = [
    "age",
    "family_size",
    "dependents",
    "years_of_employment",
    "monthly_salary",
    "credit_score",
    "bank_balance",
    "emergency_fund",
    "monthly_rent",
    "school_fees",
    "college_fees",
    "travel_expenses",
    "groceries_utilities",
    "other_monthly_expenses",
    "current_emi_amount",
    "requested_amount",
    "requested_tenure",
];

/// A one-hot block: attribute name and its slots. Each slot lists the
/// spellings that switch it on; matching is exact.
struct OneHotBlock {
    attribute: &'static str,
    slots: &'static [&'static [&'static str]],
}

const ONE_HOT_BLOCKS: [OneHotBlock; 8] = [
    OneHotBlock {
        attribute: "gender",
        slots: &[&["Female"], &["Male"]],
    },
    OneHotBlock {
        attribute: "marital_status",
        slots: &[&["Married"], &["Single"]],
    },
    OneHotBlock {
        attribute: "education",
        slots: &[
            &["Graduate"],
            &["Post_Graduate", "Postgraduate"],
            &["High_School", "School"],
            &["Undergraduate"],
        ],
    },
    OneHotBlock {
        attribute: "employment_type",
        slots: &[&["Government"], &["Private"], &["Self_Employed"], &["Contract"]],
    },
    OneHotBlock {
        attribute: "company_type",
        slots: &[&["MNC"], &["Startup"], &["SME"], &["Others"]],
    },
    OneHotBlock {
        attribute: "house_type",
        slots: &[&["Owned"], &["Rented"]],
    },
    OneHotBlock {
        attribute: "existing_loans",
        slots: &[&["No"], &["Yes"]],
    },
    OneHotBlock {
        attribute: "emi_scenario",
        slots: &[
            &["Balance_Transfer"],
            &["Loan_Against_Property"],
            &["New_Loan"],
            &["Refinance"],
            &["Top_Up"],
        ],
    },
];

/// Fixed-width model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f32; FEATURE_DIM]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        FEATURE_DIM
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Bit patterns of every element, for exact equality checks.
    pub fn to_bits(&self) -> [u32; FEATURE_DIM] {
        self.0.map(f32::to_bits)
    }
}

impl AsRef<[f32]> for FeatureVector {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

/// Encoder that transforms customer profiles into model input features.
#[derive(Debug, Clone, Default)]
pub struct FeatureEncoder;

impl FeatureEncoder {
    /// Create a new feature encoder.
    pub fn new() -> Self {
        Self
    }

    /// Encode a profile. Total: unknown categorical values leave their block
    /// all-zero and the tail past the informative dimensions is zero.
    pub fn encode(&self, profile: &CustomerProfile) -> FeatureVector {
        let mut features = [0.0_f32; FEATURE_DIM];

        let numeric = [
            profile.age,
            profile.family_size,
            profile.dependents,
            profile.years_of_employment,
            profile.monthly_salary,
            profile.credit_score,
            profile.bank_balance,
            profile.emergency_fund,
            profile.monthly_rent,
            profile.school_fees,
            profile.college_fees,
            profile.travel_expenses,
            profile.groceries_utilities,
            profile.other_monthly_expenses,
            profile.current_emi_amount,
            profile.requested_amount,
            profile.requested_tenure,
        ];
        for (slot, value) in features.iter_mut().zip(numeric) {
            *slot = value as f32;
        }

        let categorical = [
            profile.gender.as_str(),
            profile.marital_status.as_str(),
            profile.education.as_str(),
            profile.employment_type.as_str(),
            profile.company_type.as_str(),
            profile.house_type.as_str(),
            profile.existing_loans.as_str(),
            profile.emi_scenario.as_str(),
        ];

        let mut offset = NUMERIC_FEATURES;
        for (block, value) in ONE_HOT_BLOCKS.iter().zip(categorical) {
            for (i, spellings) in block.slots.iter().enumerate() {
                if spellings.contains(&value) {
                    features[offset + i] = 1.0;
                }
            }
            offset += block.slots.len();
        }

        FeatureVector(features)
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_DIM
    }

    /// Feature names in vector order; padding slots are named `padding_<n>`.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = NUMERIC_NAMES.iter().map(|n| n.to_string()).collect();

        for block in &ONE_HOT_BLOCKS {
            for spellings in block.slots {
                names.push(format!("{}_{}", block.attribute, spellings[0]));
            }
        }

        let padding = FEATURE_DIM - names.len();
        names.extend((0..padding).map(|i| format!("padding_{i}")));
        names
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn category() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("Male".to_string()),
            Just("Female".to_string()),
            Just("Graduate".to_string()),
            Just("Self_Employed".to_string()),
            Just("Top_Up".to_string()),
            "[A-Za-z_]{0,12}",
        ]
    }

    prop_compose! {
        fn arb_profile()(
            numeric in proptest::collection::vec(-1.0e7f64..1.0e7, NUMERIC_FEATURES),
            cats in proptest::collection::vec(category(), 8),
        ) -> CustomerProfile {
            CustomerProfile {
                age: numeric[0],
                family_size: numeric[1],
                dependents: numeric[2],
                years_of_employment: numeric[3],
                monthly_salary: numeric[4],
                credit_score: numeric[5],
                bank_balance: numeric[6],
                emergency_fund: numeric[7],
                monthly_rent: numeric[8],
                school_fees: numeric[9],
                college_fees: numeric[10],
                travel_expenses: numeric[11],
                groceries_utilities: numeric[12],
                other_monthly_expenses: numeric[13],
                current_emi_amount: numeric[14],
                requested_amount: numeric[15],
                requested_tenure: numeric[16],
                gender: cats[0].clone(),
                marital_status: cats[1].clone(),
                education: cats[2].clone(),
                employment_type: cats[3].clone(),
                company_type: cats[4].clone(),
                house_type: cats[5].clone(),
                existing_loans: cats[6].clone(),
                emi_scenario: cats[7].clone(),
                interest_rate: None,
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_encoding_is_fixed_width_and_deterministic(profile in arb_profile()) {
            let encoder = FeatureEncoder::new();
            let first = encoder.encode(&profile);
            let second = encoder.encode(&profile.clone());

            prop_assert_eq!(first.as_slice().len(), FEATURE_DIM);
            prop_assert_eq!(first.to_bits(), second.to_bits());
            prop_assert!(first.as_slice()[INFORMATIVE_FEATURES..].iter().all(|&x| x == 0.0));
        }
    }
}
