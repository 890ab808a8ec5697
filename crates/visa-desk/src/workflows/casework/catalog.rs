use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisaType {
    pub code: String,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementType {
    pub code: String,
    pub name: String,
    pub active: bool,
}

/// Read-only view of which document types each visa type demands.
pub trait RequirementCatalog: Send + Sync {
    /// Ordered requirement codes for an active visa type; inactive requirement types are skipped.
    fn requirements_for(&self, visa_code: &str) -> Result<Vec<String>, CatalogError>;
    fn visa_type(&self, code: &str) -> Option<VisaType>;
    fn requirement_type(&self, code: &str) -> Option<RequirementType>;
    fn active_visa_types(&self) -> Vec<VisaType>;
    fn active_requirement_types(&self) -> Vec<RequirementType>;
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("visa type '{0}' is unknown or inactive")]
    UnknownVisaType(String),
    #[error("visa type '{0}' has no requirements configured")]
    EmptyCatalog(String),
    #[error("requirement type '{0}' is unknown or inactive")]
    UnknownRequirementType(String),
    #[error("a {kind} with {field} '{value}' already exists")]
    Duplicate {
        kind: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    #[error("catalog row could not be read: {0}")]
    Csv(#[from] csv::Error),
    #[error("catalog file could not be opened: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::UnknownVisaType(_)
            | CatalogError::EmptyCatalog(_)
            | CatalogError::UnknownRequirementType(_)
            | CatalogError::Csv(_) => ErrorKind::Configuration,
            CatalogError::Duplicate { .. } | CatalogError::MissingField(_) => ErrorKind::Validation,
            CatalogError::Io(_) => ErrorKind::Internal,
        }
    }
}

/// In-process catalog table, seeded from code or a CSV export.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    visa_types: BTreeMap<String, VisaType>,
    requirement_types: BTreeMap<String, RequirementType>,
    links: BTreeMap<String, Vec<String>>,
}

const STANDARD_REQUIREMENTS: &[(&str, &str)] = &[
    ("passport", "Passport"),
    ("visa_application_form", "Visa application form"),
    ("passport_photo", "Passport photo"),
    ("criminal_record", "Criminal record certificate"),
    ("health_insurance", "Health insurance"),
    ("financial_solvency", "Proof of financial solvency"),
    ("enrollment_letter", "Enrollment letter"),
    ("employment_contract", "Employment contract"),
    ("proof_of_address", "Proof of address"),
    ("return_ticket", "Return ticket"),
];

const STANDARD_VISAS: &[(&str, &str, &[&str])] = &[
    (
        "student",
        "Student",
        &[
            "passport",
            "visa_application_form",
            "passport_photo",
            "enrollment_letter",
            "financial_solvency",
            "health_insurance",
        ],
    ),
    (
        "work",
        "Work",
        &[
            "passport",
            "visa_application_form",
            "passport_photo",
            "employment_contract",
            "criminal_record",
            "health_insurance",
        ],
    ),
    (
        "residence",
        "Residence",
        &[
            "passport",
            "visa_application_form",
            "criminal_record",
            "financial_solvency",
            "proof_of_address",
        ],
    ),
    (
        "tourist",
        "Tourist",
        &["passport", "passport_photo", "return_ticket"],
    ),
];

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the agency's default visa types.
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        for (code, name) in STANDARD_REQUIREMENTS {
            catalog.upsert_requirement_type(code, name);
        }
        for (code, name, requirements) in STANDARD_VISAS {
            catalog.upsert_visa_type(code, name);
            for requirement in *requirements {
                catalog.link_codes(code, requirement);
            }
        }
        catalog
    }

    /// Loads `visa_code,visa_name,requirement_code,requirement_name` rows.
    /// Row order defines the requirement order of each visa type.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut catalog = Self::new();

        for record in csv_reader.deserialize::<CatalogRow>() {
            let row = record?;
            let visa = normalize_code(&row.visa_code);
            let requirement = normalize_code(&row.requirement_code);
            if visa.is_empty() {
                return Err(CatalogError::MissingField("visa_code"));
            }
            if requirement.is_empty() {
                return Err(CatalogError::MissingField("requirement_code"));
            }

            catalog.upsert_visa_type(&visa, &row.visa_name);
            catalog.upsert_requirement_type(&requirement, &row.requirement_name);
            catalog.link_codes(&visa, &requirement);
        }

        Ok(catalog)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let file = File::open(path)?;
        Self::from_csv_reader(file)
    }

    pub fn register_visa_type(&mut self, code: &str, name: &str) -> Result<VisaType, CatalogError> {
        let (code, name) = validated_entry(code, name)?;
        if self.visa_types.contains_key(&code) {
            return Err(duplicate("visa type", "code", code));
        }
        if self.visa_types.values().any(|visa| same_name(&visa.name, &name)) {
            return Err(duplicate("visa type", "name", name));
        }
        Ok(self.upsert_visa_type(&code, &name))
    }

    pub fn register_requirement_type(
        &mut self,
        code: &str,
        name: &str,
    ) -> Result<RequirementType, CatalogError> {
        let (code, name) = validated_entry(code, name)?;
        if self.requirement_types.contains_key(&code) {
            return Err(duplicate("requirement type", "code", code));
        }
        if self
            .requirement_types
            .values()
            .any(|requirement| same_name(&requirement.name, &name))
        {
            return Err(duplicate("requirement type", "name", name));
        }
        Ok(self.upsert_requirement_type(&code, &name))
    }

    /// Appends a requirement type to the visa type's ordered list.
    pub fn link(&mut self, visa_code: &str, requirement_code: &str) -> Result<(), CatalogError> {
        let visa = normalize_code(visa_code);
        let requirement = normalize_code(requirement_code);
        if !self.visa_types.contains_key(&visa) {
            return Err(CatalogError::UnknownVisaType(visa));
        }
        if !self.requirement_types.contains_key(&requirement) {
            return Err(CatalogError::UnknownRequirementType(requirement));
        }
        self.link_codes(&visa, &requirement);
        Ok(())
    }

    pub fn set_visa_type_active(&mut self, code: &str, active: bool) -> Result<(), CatalogError> {
        let code = normalize_code(code);
        let visa = self
            .visa_types
            .get_mut(&code)
            .ok_or(CatalogError::UnknownVisaType(code.clone()))?;
        visa.active = active;
        Ok(())
    }

    pub fn set_requirement_type_active(
        &mut self,
        code: &str,
        active: bool,
    ) -> Result<(), CatalogError> {
        let code = normalize_code(code);
        let requirement = self
            .requirement_types
            .get_mut(&code)
            .ok_or(CatalogError::UnknownRequirementType(code.clone()))?;
        requirement.active = active;
        Ok(())
    }

    fn upsert_visa_type(&mut self, code: &str, name: &str) -> VisaType {
        self.visa_types
            .entry(code.to_string())
            .or_insert_with(|| VisaType {
                code: code.to_string(),
                name: name.trim().to_string(),
                active: true,
            })
            .clone()
    }

    fn upsert_requirement_type(&mut self, code: &str, name: &str) -> RequirementType {
        self.requirement_types
            .entry(code.to_string())
            .or_insert_with(|| RequirementType {
                code: code.to_string(),
                name: name.trim().to_string(),
                active: true,
            })
            .clone()
    }

    fn link_codes(&mut self, visa: &str, requirement: &str) {
        let list = self.links.entry(visa.to_string()).or_default();
        if !list.iter().any(|code| code == requirement) {
            list.push(requirement.to_string());
        }
    }
}

impl RequirementCatalog for StaticCatalog {
    fn requirements_for(&self, visa_code: &str) -> Result<Vec<String>, CatalogError> {
        let code = normalize_code(visa_code);
        let visa = self
            .visa_types
            .get(&code)
            .filter(|visa| visa.active)
            .ok_or_else(|| CatalogError::UnknownVisaType(visa_code.to_string()))?;

        let codes: Vec<String> = self
            .links
            .get(&visa.code)
            .map(|codes| {
                codes
                    .iter()
                    .filter(|code| {
                        self.requirement_types
                            .get(*code)
                            .is_some_and(|requirement| requirement.active)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if codes.is_empty() {
            return Err(CatalogError::EmptyCatalog(visa.code.clone()));
        }
        Ok(codes)
    }

    fn visa_type(&self, code: &str) -> Option<VisaType> {
        self.visa_types.get(&normalize_code(code)).cloned()
    }

    fn requirement_type(&self, code: &str) -> Option<RequirementType> {
        self.requirement_types.get(&normalize_code(code)).cloned()
    }

    fn active_visa_types(&self) -> Vec<VisaType> {
        self.visa_types
            .values()
            .filter(|visa| visa.active)
            .cloned()
            .collect()
    }

    fn active_requirement_types(&self) -> Vec<RequirementType> {
        self.requirement_types
            .values()
            .filter(|requirement| requirement.active)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    visa_code: String,
    visa_name: String,
    requirement_code: String,
    requirement_name: String,
}

/// Canonical catalog code: trimmed, lowercase, spaces as `_`.
pub fn normalize_code(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

fn validated_entry(code: &str, name: &str) -> Result<(String, String), CatalogError> {
    let code = normalize_code(code);
    if code.is_empty() {
        return Err(CatalogError::MissingField("code"));
    }
    let name = name.trim();
    if name.is_empty() {
        return Err(CatalogError::MissingField("name"));
    }
    Ok((code, name.to_string()))
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn duplicate(kind: &'static str, field: &'static str, value: String) -> CatalogError {
    CatalogError::Duplicate { kind, field, value }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_orders_requirements() {
        let catalog = StaticCatalog::standard();
        let student = catalog.requirements_for("student").expect("student visa");
        assert_eq!(student.first().map(String::as_str), Some("passport"));
        assert_eq!(student.len(), 6);
        assert_eq!(catalog.active_visa_types().len(), 4);
    }

    #[test]
    fn unknown_and_inactive_visa_types_fail() {
        let mut catalog = StaticCatalog::standard();
        assert!(matches!(
            catalog.requirements_for("diplomatic"),
            Err(CatalogError::UnknownVisaType(_))
        ));

        catalog.set_visa_type_active("work", false).expect("exists");
        let err = catalog.requirements_for("work").expect_err("inactive");
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn visa_type_without_requirements_is_an_empty_catalog() {
        let mut catalog = StaticCatalog::new();
        catalog
            .register_visa_type("Digital Nomad", "Digital nomad")
            .expect("registered");
        match catalog.requirements_for("digital_nomad") {
            Err(CatalogError::EmptyCatalog(code)) => assert_eq!(code, "digital_nomad"),
            other => panic!("expected empty catalog, got {other:?}"),
        }

        catalog
            .register_requirement_type("remote contract", "Remote work contract")
            .expect("registered");
        catalog
            .link("digital_nomad", "remote_contract")
            .expect("linked");
        catalog
            .set_requirement_type_active("remote_contract", false)
            .expect("exists");
        assert!(matches!(
            catalog.requirements_for("digital_nomad"),
            Err(CatalogError::EmptyCatalog(_))
        ));
    }

    #[test]
    fn registration_rejects_duplicate_codes_and_names() {
        let mut catalog = StaticCatalog::standard();
        let err = catalog
            .register_visa_type(" STUDENT ", "Scholar")
            .expect_err("duplicate code");
        assert!(matches!(err, CatalogError::Duplicate { field: "code", .. }));

        let err = catalog
            .register_requirement_type("passport_copy", "passport")
            .expect_err("duplicate name");
        assert!(matches!(err, CatalogError::Duplicate { field: "name", .. }));

        let err = catalog
            .register_visa_type("  ", "Nameless")
            .expect_err("empty code");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn loads_catalog_from_csv_rows() {
        let csv = "\
visa_code,visa_name,requirement_code,requirement_name
Student, Student ,passport,Passport
student,Student,Enrollment Letter,Enrollment letter
work,Work,passport,Passport
";
        let catalog = StaticCatalog::from_csv_reader(csv.as_bytes()).expect("csv parses");
        assert_eq!(
            catalog.requirements_for("student").expect("student"),
            vec!["passport".to_string(), "enrollment_letter".to_string()]
        );
        assert_eq!(
            catalog.visa_type("student").map(|visa| visa.name),
            Some("Student".to_string())
        );
        assert_eq!(catalog.requirements_for("work").expect("work").len(), 1);
    }

    #[test]
    fn malformed_csv_is_a_configuration_error() {
        let csv = "visa_code,visa_name\nstudent,Student\n";
        let err = StaticCatalog::from_csv_reader(csv.as_bytes()).expect_err("missing columns");
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
