//! Test-case records and the case set they belong to

use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CaseError;
use crate::xml;

/// Identity of a test case: its description, unique within a case set
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(String);

impl CaseId {
    #[inline]
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self(description.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value of the first run of ASCII digits in the id, if any.
    ///
    /// Case sets name their records like `"bad 3"` or `"c12"`; this number is
    /// the primary key when choosing among several failing cases.
    #[must_use]
    pub fn numeric_order(&self) -> Option<u64> {
        let start = self.0.find(|c: char| c.is_ascii_digit())?;
        let digits: String = self.0[start..]
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        digits.parse().ok()
    }
}

impl Display for CaseId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CaseId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CaseId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CaseId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One labeled test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub description: CaseId,
    pub code: String,
    pub expected_problems: u32,
}

impl TestCase {
    #[must_use]
    pub fn new(description: impl Into<String>, code: impl Into<String>, expected_problems: u32) -> Self {
        Self {
            description: CaseId::new(description),
            code: code.into(),
            expected_problems,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> &CaseId {
        &self.description
    }

    /// A negative case is expected to trigger at least one violation
    #[inline]
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.expected_problems > 0
    }

    /// Code with surrounding whitespace and one leading `//` comment line removed
    #[must_use]
    pub fn display_code(&self) -> &str {
        let code = self.code.trim();
        if code.starts_with("//") {
            match code.find('\n') {
                Some(idx) => code[idx + 1..].trim_start_matches(['\r', '\n']),
                None => "",
            }
        } else {
            code
        }
    }

    /// Rendering used when the case is embedded in a prompt
    #[must_use]
    pub fn prompt_text(&self) -> String {
        format!(
            "{}\nThe description of this test case is: {}\nThe number of violating the rule in this test case is: {}\n",
            self.code.trim(),
            self.description,
            self.expected_problems
        )
    }
}

/// All cases of one rule, in storage order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSet {
    cases: Vec<TestCase>,
}

impl CaseSet {
    /// Build a set from already-parsed records, rejecting duplicate ids
    pub fn new(cases: Vec<TestCase>) -> Result<Self, CaseError> {
        let mut seen = std::collections::HashSet::with_capacity(cases.len());
        for case in &cases {
            if !seen.insert(case.description.as_str()) {
                return Err(CaseError::DuplicateDescription(case.description.to_string()));
            }
        }
        Ok(Self { cases })
    }

    /// Read and parse a case-set document from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CaseError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| CaseError::io(path, e))?;
        let set = Self::from_xml_str(&text)?;
        tracing::debug!(
            "Loaded {} cases ({} negative) from {}",
            set.len(),
            count_negative(set.cases()),
            path.display()
        );
        Ok(set)
    }

    pub fn from_xml_str(text: &str) -> Result<Self, CaseError> {
        Self::new(xml::parse_cases(text)?)
    }

    #[inline]
    #[must_use]
    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&TestCase> {
        self.cases.iter().find(|c| c.description.as_str() == id)
    }

    /// Storage position of a case
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.cases.iter().position(|c| c.description.as_str() == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestCase> {
        self.cases.iter()
    }
}

impl<'a> IntoIterator for &'a CaseSet {
    type Item = &'a TestCase;
    type IntoIter = std::slice::Iter<'a, TestCase>;

    fn into_iter(self) -> Self::IntoIter {
        self.cases.iter()
    }
}

/// Number of negative cases
#[must_use]
pub fn count_negative(cases: &[TestCase]) -> usize {
    cases.iter().filter(|c| c.is_negative()).count()
}

#[inline]
#[must_use]
pub fn count_all(cases: &[TestCase]) -> usize {
    cases.len()
}

/// First negative case in storage order that has not been skipped
#[must_use]
pub fn select_next_negative<'a, S>(cases: &'a [TestCase], skipped: &S) -> Option<&'a TestCase>
where
    S: CaseMembership + ?Sized,
{
    cases
        .iter()
        .find(|c| c.is_negative() && !skipped.contains_case(c.id()))
}

/// Block describing which cases a checker already satisfies, in storage order
#[must_use]
pub fn passed_cases_summary<S>(cases: &[TestCase], passed: &S) -> String
where
    S: CaseMembership + ?Sized,
{
    let mut out = String::new();
    for case in cases.iter().filter(|c| passed.contains_case(c.id())) {
        let polarity = if case.is_negative() { "negative" } else { "positive" };
        out.push_str("This checker has passed this ");
        out.push_str(polarity);
        out.push_str(" testcase:\n");
        out.push_str(case.display_code());
        out.push('\n');
    }
    out
}

/// Anything that can answer "is this case in here"
pub trait CaseMembership {
    fn contains_case(&self, id: &CaseId) -> bool;
}

impl CaseMembership for crate::CaseIdSet {
    fn contains_case(&self, id: &CaseId) -> bool {
        self.contains(id)
    }
}

impl CaseMembership for [CaseId] {
    fn contains_case(&self, id: &CaseId) -> bool {
        self.contains(id)
    }
}

impl CaseMembership for Vec<CaseId> {
    fn contains_case(&self, id: &CaseId) -> bool {
        self.contains(id)
    }
}

impl CaseMembership for std::collections::HashSet<CaseId> {
    fn contains_case(&self, id: &CaseId) -> bool {
        self.contains(id)
    }
}
