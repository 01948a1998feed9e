//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - deserialized straight from HTTP request bodies
//! - passed through feature derivation and prediction
//! - echoed back in responses and exports

use serde::{Deserialize, Serialize};

/// Feature names in the exact order the trained model consumes them.
///
/// Any artifact whose feature schema differs from this list is refused at load
/// time (`model::artifact`).
pub const MODEL_FEATURES: [&str; 8] = [
    "employeeCount",
    "companyAge",
    "revenue_per_employee",
    "tenure_index",
    "companyType",
    "category",
    "city_tier",
    "state",
];

/// Legal form of a company. The model's categorical encoding is fixed at
/// training time, so anything else is rejected before prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompanyType {
    #[serde(rename = "Private Company")]
    PrivateCompany,
    #[serde(rename = "Public Company")]
    PublicCompany,
    #[serde(rename = "Partnership")]
    Partnership,
    #[serde(rename = "LLP")]
    Llp,
}

impl CompanyType {
    pub const ALL: [CompanyType; 4] = [
        CompanyType::PrivateCompany,
        CompanyType::PublicCompany,
        CompanyType::Partnership,
        CompanyType::Llp,
    ];

    /// Label used by the model encoder and in responses.
    pub fn as_str(self) -> &'static str {
        match self {
            CompanyType::PrivateCompany => "Private Company",
            CompanyType::PublicCompany => "Public Company",
            CompanyType::Partnership => "Partnership",
            CompanyType::Llp => "LLP",
        }
    }

    /// Parse a label, ignoring surrounding whitespace and ASCII case.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
    }
}

/// Industry category. Absence is its own case rather than an empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    Labeled(String),
    Missing,
}

impl Category {
    /// Blank or absent input becomes `Missing`.
    pub fn from_optional(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(s) if !s.is_empty() => Category::Labeled(s.to_string()),
            _ => Category::Missing,
        }
    }
}

/// City bucket used by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CityTier {
    #[serde(rename = "Tier_1")]
    Tier1,
    #[serde(rename = "Tier_2_3")]
    Tier2And3,
}

impl CityTier {
    pub fn as_str(self) -> &'static str {
        match self {
            CityTier::Tier1 => "Tier_1",
            CityTier::Tier2And3 => "Tier_2_3",
        }
    }
}

/// Company attributes as supplied by a caller or a batch row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInput {
    pub employee_count: f64,
    pub company_age: f64,
    /// Free text until derivation validates it against [`CompanyType`].
    pub company_type: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    pub state: String,
    /// Current revenue; only used to derive revenue-per-employee.
    #[serde(default)]
    pub revenue: Option<f64>,
}

impl RawInput {
    /// Trimmed copy with blank optionals cleared and a recognised company
    /// type rewritten to its canonical label.
    pub fn normalized(&self) -> RawInput {
        let company_type = match CompanyType::parse(&self.company_type) {
            Some(kind) => kind.as_str().to_string(),
            None => self.company_type.trim().to_string(),
        };
        RawInput {
            employee_count: self.employee_count,
            company_age: self.company_age,
            company_type,
            category: non_blank(self.category.as_deref()),
            city: non_blank(self.city.as_deref()),
            state: self.state.trim().to_string(),
            revenue: self.revenue,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A fully derived, model-ready company record.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub employee_count: f64,
    pub company_age: f64,
    pub revenue_per_employee: f64,
    pub tenure_index: f64,
    pub company_type: CompanyType,
    pub category: Category,
    pub city: Option<String>,
    pub city_tier: CityTier,
    pub state: String,
    pub revenue: Option<f64>,
}

impl FeatureRecord {
    /// The model view of this record, in [`MODEL_FEATURES`] order.
    pub fn to_vector(&self) -> FeatureVector {
        let category = match &self.category {
            Category::Labeled(label) => FeatureValue::Label(label.clone()),
            Category::Missing => FeatureValue::Missing,
        };
        let values = vec![
            FeatureValue::Numeric(self.employee_count),
            FeatureValue::Numeric(self.company_age),
            FeatureValue::Numeric(self.revenue_per_employee),
            FeatureValue::Numeric(self.tenure_index),
            FeatureValue::Label(self.company_type.as_str().to_string()),
            category,
            FeatureValue::Label(self.city_tier.as_str().to_string()),
            FeatureValue::Label(self.state.clone()),
        ];
        FeatureVector {
            entries: MODEL_FEATURES.into_iter().zip(values).collect(),
        }
    }
}

/// One feature value as handed to a regressor.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Numeric(f64),
    Label(String),
    Missing,
}

/// Named feature values in model order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    entries: Vec<(&'static str, FeatureValue)>,
}

impl FeatureVector {
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FeatureValue)> + '_ {
        self.entries.iter().map(|(name, value)| (*name, value))
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, value)| value)
    }
}

/// Prediction for one company plus the normalized input it was made from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub predicted_revenue: f64,
    #[serde(rename = "input_data")]
    pub input: RawInput,
}

/// Descriptive statistics over the predicted revenue of a batch.
///
/// Only successful rows count. All statistics are `None` for an empty batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub std: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn company_type_parse_is_lenient_on_case_and_space() {
        assert_eq!(CompanyType::parse(" private company "), Some(CompanyType::PrivateCompany));
        assert_eq!(CompanyType::parse("llp"), Some(CompanyType::Llp));
        assert_eq!(CompanyType::parse("Sole Proprietor"), None);
        assert_eq!(CompanyType::parse(""), None);
    }

    #[test]
    fn raw_input_deserializes_camel_case() {
        let raw: RawInput = serde_json::from_str(
            r#"{"employeeCount": 10, "companyAge": 2.5, "companyType": "LLP", "state": "Goa"}"#,
        )
        .unwrap();
        assert_eq!(raw.employee_count, 10.0);
        assert_eq!(raw.company_age, 2.5);
        assert_eq!(raw.category, None);
        assert_eq!(raw.revenue, None);
    }

    #[test]
    fn normalized_trims_and_canonicalizes() {
        let raw = RawInput {
            employee_count: 5.0,
            company_age: 1.0,
            company_type: "public company".to_string(),
            category: Some("  ".to_string()),
            city: Some(" Pune ".to_string()),
            state: " Maharashtra".to_string(),
            revenue: None,
        };
        let norm = raw.normalized();
        assert_eq!(norm.company_type, "Public Company");
        assert_eq!(norm.category, None);
        assert_eq!(norm.city.as_deref(), Some("Pune"));
        assert_eq!(norm.state, "Maharashtra");
    }

    #[test]
    fn prediction_result_uses_wire_names() {
        let result = PredictionResult {
            predicted_revenue: 12.5,
            input: RawInput {
                employee_count: 1.0,
                company_age: 0.0,
                company_type: "LLP".to_string(),
                category: None,
                city: None,
                state: String::new(),
                revenue: None,
            },
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["predicted_revenue"], 12.5);
        assert_eq!(json["input_data"]["companyType"], "LLP");
    }
}
