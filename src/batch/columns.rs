//! Column-name resolution for batch files.
//!
//! Headers arrive in whatever spelling the spreadsheet author chose
//! (`EmployeeCount`, `Employee Count`, `employee_count`, ...). Each header is
//! normalized once and looked up in an explicit alias table, so by the time
//! rows are processed every logical field has a known column index.

use crate::error::AppError;

/// Logical input fields a batch row can supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    EmployeeCount,
    CompanyAge,
    CompanyType,
    Category,
    City,
    State,
    Revenue,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::EmployeeCount,
        Field::CompanyAge,
        Field::CompanyType,
        Field::Category,
        Field::City,
        Field::State,
        Field::Revenue,
    ];

    /// Canonical column name.
    pub fn canonical_name(self) -> &'static str {
        match self {
            Field::EmployeeCount => "EmployeeCount",
            Field::CompanyAge => "CompanyAge",
            Field::CompanyType => "CompanyType",
            Field::Category => "Category",
            Field::City => "City",
            Field::State => "State",
            Field::Revenue => "Revenue",
        }
    }

    /// Request field name, used when reporting row errors.
    pub fn input_name(self) -> &'static str {
        match self {
            Field::EmployeeCount => "employeeCount",
            Field::CompanyAge => "companyAge",
            Field::CompanyType => "companyType",
            Field::Category => "category",
            Field::City => "city",
            Field::State => "state",
            Field::Revenue => "revenue",
        }
    }

    /// Accepted header spellings, already normalized.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::EmployeeCount => &["employeecount", "employees", "numberofemployees"],
            Field::CompanyAge => &["companyage", "age"],
            Field::CompanyType => &["companytype"],
            Field::Category => &["category", "industry"],
            Field::City => &["city"],
            Field::State => &["state"],
            Field::Revenue => &["revenue"],
        }
    }

    pub fn is_required(self) -> bool {
        matches!(self, Field::EmployeeCount | Field::CompanyAge)
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Normalize a header for alias lookup: strip BOM, lowercase, drop spaces,
/// underscores and hyphens.
pub fn normalize_header(name: &str) -> String {
    name.trim()
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Which logical field (if any) a header refers to.
pub fn resolve_field(header: &str) -> Option<Field> {
    let normalized = normalize_header(header);
    Field::ALL
        .into_iter()
        .find(|field| field.aliases().contains(&normalized.as_str()))
}

/// Resolved column index per logical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    indices: [Option<usize>; 7],
}

impl ColumnMap {
    /// Resolve all headers, failing once for the whole batch if a required
    /// field is missing or a field is supplied by two columns.
    pub fn resolve(headers: &[String]) -> Result<Self, AppError> {
        let mut indices = [None; 7];
        for (idx, header) in headers.iter().enumerate() {
            let Some(field) = resolve_field(header) else {
                continue;
            };
            if let Some(prev) = indices[field.slot()] {
                return Err(AppError::schema(format!(
                    "Columns '{}' and '{}' both map to `{}`.",
                    headers[prev],
                    header,
                    field.canonical_name()
                )));
            }
            indices[field.slot()] = Some(idx);
        }

        let missing: Vec<&str> = Field::ALL
            .into_iter()
            .filter(|f| f.is_required() && indices[f.slot()].is_none())
            .map(Field::canonical_name)
            .collect();
        if !missing.is_empty() {
            return Err(AppError::schema(format!(
                "Missing required column(s): {}. Found: {}.",
                missing.join(", "),
                headers.join(", ")
            )));
        }

        Ok(Self { indices })
    }

    pub fn get(&self, field: Field) -> Option<usize> {
        self.indices[field.slot()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn spelling_variants_resolve_to_the_same_field() {
        for h in ["EmployeeCount", "Employee Count", "employee_count", "EMPLOYEE-COUNT", "\u{feff}employeeCount"] {
            assert_eq!(resolve_field(h), Some(Field::EmployeeCount), "{h}");
        }
        assert_eq!(resolve_field("Company Type"), Some(Field::CompanyType));
        assert_eq!(resolve_field("notes"), None);
    }

    #[test]
    fn resolves_spaced_mixed_case_headers() {
        let map = ColumnMap::resolve(&headers(&["Employee Count", "Company Age", "City", "Website"])).unwrap();
        assert_eq!(map.get(Field::EmployeeCount), Some(0));
        assert_eq!(map.get(Field::CompanyAge), Some(1));
        assert_eq!(map.get(Field::City), Some(2));
        assert_eq!(map.get(Field::Revenue), None);
    }

    #[test]
    fn missing_required_columns_fail_once() {
        let err = ColumnMap::resolve(&headers(&["city", "state"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.message().contains("EmployeeCount, CompanyAge"));
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let err = ColumnMap::resolve(&headers(&["employeeCount", "Employee Count", "companyAge"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.message().contains("both map to `EmployeeCount`"));
    }
}
