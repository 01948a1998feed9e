//! Raw input validation and derived features.
//!
//! Both derived ratios divide by `employeeCount`, so it is validated first and
//! a zero or negative count is reported rather than producing infinities.

use crate::domain::{Category, CompanyType, FeatureRecord, RawInput};
use crate::error::AppError;
use crate::features::tier::classify;

/// Revenue-per-employee used when no usable revenue is supplied.
pub const DEFAULT_REVENUE_PER_EMPLOYEE: f64 = 1.0;

/// Validate `raw` and build its feature record.
pub fn derive(raw: &RawInput) -> Result<FeatureRecord, AppError> {
    let employee_count = raw.employee_count;
    if !employee_count.is_finite() || employee_count <= 0.0 {
        return Err(AppError::invalid_input(
            "employeeCount",
            format!("must be a finite number greater than 0 (got {employee_count})"),
        ));
    }

    let company_age = raw.company_age;
    if !company_age.is_finite() || company_age < 0.0 {
        return Err(AppError::invalid_input(
            "companyAge",
            format!("must be a finite number >= 0 (got {company_age})"),
        ));
    }

    let company_type = CompanyType::parse(&raw.company_type).ok_or_else(|| {
        AppError::invalid_input(
            "companyType",
            format!(
                "unrecognized company type '{}'; expected one of: Private Company, Public Company, Partnership, LLP",
                raw.company_type.trim()
            ),
        )
    })?;

    if let Some(revenue) = raw.revenue {
        if revenue.is_finite() && revenue < 0.0 {
            return Err(AppError::invalid_input(
                "revenue",
                format!("must be >= 0 when supplied (got {revenue})"),
            ));
        }
    }

    let revenue_per_employee = match raw.revenue {
        Some(revenue) if revenue.is_finite() => revenue / employee_count,
        _ => DEFAULT_REVENUE_PER_EMPLOYEE,
    };
    let tenure_index = company_age / employee_count;

    let city = raw
        .city
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    Ok(FeatureRecord {
        employee_count,
        company_age,
        revenue_per_employee,
        tenure_index,
        company_type,
        category: Category::from_optional(raw.category.as_deref()),
        city_tier: classify(city.as_deref()),
        city,
        state: raw.state.trim().to_string(),
        revenue: raw.revenue,
    })
}
