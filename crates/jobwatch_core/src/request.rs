use std::fmt;
use std::str::FromStr;

/// Longest accepted company description, in characters.
pub const MAX_COMPANY_LEN: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("company description must not be empty")]
    EmptyCompany,
    #[error("company description is too long ({len} characters, max {max})")]
    CompanyTooLong { len: usize, max: usize },
    #[error("unknown page set `{0}` (expected small, medium or full)")]
    UnknownPageSet(String),
}

/// How many pages the remote generator should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSet {
    Small,
    Medium,
    #[default]
    Full,
}

impl PageSet {
    pub fn page_count(self) -> u32 {
        match self {
            PageSet::Small => 8,
            PageSet::Medium => 15,
            PageSet::Full => 20,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PageSet::Small => "small",
            PageSet::Medium => "medium",
            PageSet::Full => "full",
        }
    }
}

impl fmt::Display for PageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageSet {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(PageSet::Small),
            "medium" => Ok(PageSet::Medium),
            "full" => Ok(PageSet::Full),
            _ => Err(ValidationError::UnknownPageSet(raw.to_string())),
        }
    }
}

/// Description of the job to generate. The company text is trimmed on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    company: String,
    page_set: PageSet,
}

impl JobRequest {
    pub fn new(company: impl Into<String>) -> Self {
        Self {
            company: company.into().trim().to_string(),
            page_set: PageSet::default(),
        }
    }

    pub fn with_page_set(mut self, page_set: PageSet) -> Self {
        self.page_set = page_set;
        self
    }

    pub fn company(&self) -> &str {
        &self.company
    }

    pub fn page_set(&self) -> PageSet {
        self.page_set
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.company.is_empty() {
            return Err(ValidationError::EmptyCompany);
        }
        let len = self.company.chars().count();
        if len > MAX_COMPANY_LEN {
            return Err(ValidationError::CompanyTooLong {
                len,
                max: MAX_COMPANY_LEN,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{JobRequest, PageSet, ValidationError, MAX_COMPANY_LEN};

    #[test]
    fn company_is_trimmed_and_validated() {
        let request = JobRequest::new("  Acme Bakery \n");
        assert_eq!(request.company(), "Acme Bakery");
        assert_eq!(request.validate(), Ok(()));
        assert_eq!(request.page_set(), PageSet::Full);
    }

    #[test]
    fn blank_company_is_rejected() {
        assert_eq!(
            JobRequest::new("   ").validate(),
            Err(ValidationError::EmptyCompany)
        );
    }

    #[test]
    fn overlong_company_is_rejected() {
        let request = JobRequest::new("x".repeat(MAX_COMPANY_LEN + 1));
        assert_eq!(
            request.validate(),
            Err(ValidationError::CompanyTooLong {
                len: MAX_COMPANY_LEN + 1,
                max: MAX_COMPANY_LEN
            })
        );
    }

    #[test]
    fn page_sets_parse_case_insensitively() {
        assert_eq!("Small".parse::<PageSet>(), Ok(PageSet::Small));
        assert_eq!(" medium ".parse::<PageSet>(), Ok(PageSet::Medium));
        assert_eq!(PageSet::Full.page_count(), 20);
        assert!(matches!(
            "huge".parse::<PageSet>(),
            Err(ValidationError::UnknownPageSet(_))
        ));
    }
}
