//! Case-set document reading, filtering and rendering
//!
//! Case sets are PMD `test-data` documents: a root element holding any number
//! of `<test-code>` records, each with `<description>`, `<expected-problems>`
//! and `<code>` children. Filtering streams the document through a
//! [`quick_xml::Writer`] so everything outside dropped records is written
//! back as it was read.

use quick_xml::events::Event;
use quick_xml::{Reader, Writer};

use crate::case::TestCase;
use crate::error::CaseError;

const TEST_CODE: &[u8] = b"test-code";
const DESCRIPTION: &[u8] = b"description";
const EXPECTED_PROBLEMS: &[u8] = b"expected-problems";
const CODE: &[u8] = b"code";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Description,
    ExpectedProblems,
    Code,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            DESCRIPTION => Some(Self::Description),
            EXPECTED_PROBLEMS => Some(Self::ExpectedProblems),
            CODE => Some(Self::Code),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct RecordBuilder {
    description: Option<String>,
    expected_problems: Option<String>,
    code: Option<String>,
}

impl RecordBuilder {
    fn push(&mut self, field: Field, text: &str) {
        let slot = match field {
            Field::Description => &mut self.description,
            Field::ExpectedProblems => &mut self.expected_problems,
            Field::Code => &mut self.code,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    }

    fn finish(self, ordinal: usize) -> Result<TestCase, CaseError> {
        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| CaseError::malformed(format!("record {ordinal} lacks <description>")))?;

        let code = self
            .code
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                CaseError::malformed(format!("record '{description}' lacks a <code> body"))
            })?;

        let raw = self.expected_problems.unwrap_or_default();
        let expected_problems = raw.trim().parse::<u32>().map_err(|_| {
            CaseError::malformed(format!(
                "record '{description}' has non-integer <expected-problems> '{}'",
                raw.trim()
            ))
        })?;

        Ok(TestCase::new(description, code, expected_problems))
    }
}

fn xml_err(err: impl std::fmt::Display) -> CaseError {
    CaseError::Xml(err.to_string())
}

/// Parse every `<test-code>` record of a case-set document in document order
pub(crate) fn parse_cases(text: &str) -> Result<Vec<TestCase>, CaseError> {
    let mut reader = Reader::from_str(text);
    let mut cases = Vec::new();
    let mut record: Option<RecordBuilder> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.local_name();
                if name.as_ref() == TEST_CODE {
                    record = Some(RecordBuilder::default());
                } else if record.is_some() {
                    field = Field::from_tag(name.as_ref());
                }
            }
            Event::End(e) => {
                let name = e.local_name();
                if name.as_ref() == TEST_CODE {
                    if let Some(done) = record.take() {
                        cases.push(done.finish(cases.len() + 1)?);
                    }
                    field = None;
                } else if Field::from_tag(name.as_ref()).is_some() {
                    field = None;
                }
            }
            Event::Text(t) => {
                if let (Some(rec), Some(f)) = (record.as_mut(), field) {
                    rec.push(f, &t.unescape().map_err(xml_err)?);
                }
            }
            Event::CData(c) => {
                if let (Some(rec), Some(f)) = (record.as_mut(), field) {
                    rec.push(f, &String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if record.is_some() {
        return Err(CaseError::malformed("unterminated <test-code> record"));
    }
    Ok(cases)
}

/// Description text of a buffered `<test-code>` element
fn buffered_description(events: &[Event<'static>]) -> Result<Option<String>, CaseError> {
    let mut inside = false;
    let mut text: Option<String> = None;
    for event in events {
        match event {
            Event::Start(e) if e.local_name().as_ref() == DESCRIPTION => inside = true,
            Event::End(e) if e.local_name().as_ref() == DESCRIPTION => inside = false,
            Event::Text(t) if inside => text
                .get_or_insert_with(String::new)
                .push_str(&t.unescape().map_err(xml_err)?),
            Event::CData(c) if inside => text
                .get_or_insert_with(String::new)
                .push_str(&String::from_utf8_lossy(c)),
            _ => {}
        }
    }
    Ok(text.map(|t| t.trim().to_string()))
}

fn is_blank(event: &Event<'_>) -> bool {
    matches!(event, Event::Text(t) if t.iter().all(u8::is_ascii_whitespace))
}

/// Keep only the `<test-code>` records whose description satisfies `keep`.
///
/// Returns the filtered document and the number of records kept. Records
/// are written back in source order; the whitespace that led a dropped
/// record is dropped with it.
pub fn filter_case_document<F>(text: &str, keep: F) -> Result<(String, usize), CaseError>
where
    F: Fn(&str) -> bool,
{
    let mut reader = Reader::from_str(text);
    let mut writer = Writer::new(Vec::with_capacity(text.len()));
    let mut leading: Option<Event<'static>> = None;
    let mut record: Option<Vec<Event<'static>>> = None;
    let mut depth = 0usize;
    let mut kept = 0usize;

    loop {
        let event = reader.read_event()?;
        if matches!(event, Event::Eof) {
            break;
        }

        if let Some(buffer) = record.as_mut() {
            match &event {
                Event::Start(_) => depth += 1,
                Event::End(_) => depth -= 1,
                _ => {}
            }
            buffer.push(event.into_owned());
            if depth == 0 {
                let buffer = record.take().unwrap_or_default();
                let description = buffered_description(&buffer)?;
                let retain = description.as_deref().is_some_and(&keep);
                let lead = leading.take();
                if retain {
                    kept += 1;
                    for ev in lead.into_iter().chain(buffer) {
                        writer.write_event(ev).map_err(xml_err)?;
                    }
                }
            }
            continue;
        }

        if let Event::Start(e) = &event {
            if e.local_name().as_ref() == TEST_CODE {
                depth = 1;
                record = Some(vec![event.into_owned()]);
                continue;
            }
        }

        if let Some(lead) = leading.take() {
            writer.write_event(lead).map_err(xml_err)?;
        }
        if is_blank(&event) {
            leading = Some(event.into_owned());
        } else {
            writer.write_event(event).map_err(xml_err)?;
        }
    }

    if record.is_some() {
        return Err(CaseError::malformed("unterminated <test-code> record"));
    }
    if let Some(lead) = leading {
        writer.write_event(lead).map_err(xml_err)?;
    }

    let out = String::from_utf8(writer.into_inner()).map_err(xml_err)?;
    Ok((out, kept))
}

/// One case rendered as a standalone document rooted at `<test-code>`
#[must_use]
pub fn single_case_document(case: &TestCase) -> String {
    let code = case.code.replace("]]>", "]]]]><![CDATA[>");
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <test-code>\n    \
         <description>{}</description>\n    \
         <expected-problems>{}</expected-problems>\n    \
         <code><![CDATA[{}]]></code>\n\
         </test-code>\n",
        quick_xml::escape::escape(case.description.as_str()),
        case.expected_problems,
        code
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<test-data xmlns="http://pmd.sourceforge.net/rule-tests">
    <!-- octal literals -->
    <test-code>
        <description>bad 1</description>
        <expected-problems>1</expected-problems>
        <code><![CDATA[
// leading comment
class A { int x = 012; }
]]></code>
    </test-code>
    <test-code>
        <description>ok 2</description>
        <expected-problems>0</expected-problems>
        <code>class B { int y = 10 &lt; 12 ? 1 : 0; }</code>
    </test-code>
</test-data>
"#;

    #[test]
    fn parses_records_in_order() {
        let cases = parse_cases(DOC).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].description.as_str(), "bad 1");
        assert_eq!(cases[0].expected_problems, 1);
        assert_eq!(cases[0].display_code(), "class A { int x = 012; }");
        assert_eq!(cases[1].code, "class B { int y = 10 < 12 ? 1 : 0; }");
        assert!(!cases[1].is_negative());
    }

    #[test]
    fn missing_code_is_malformed() {
        let doc = "<test-data><test-code><description>x</description>\
                   <expected-problems>0</expected-problems></test-code></test-data>";
        assert!(parse_cases(doc).unwrap_err().is_malformed());
    }

    #[test]
    fn missing_description_is_malformed() {
        let doc = "<test-data><test-code><expected-problems>0</expected-problems>\
                   <code>class A {}</code></test-code></test-data>";
        let err = parse_cases(doc).unwrap_err();
        assert!(err.to_string().contains("record 1 lacks <description>"));
    }

    #[test]
    fn non_integer_problem_count_is_malformed() {
        let doc = "<test-data><test-code><description>x</description>\
                   <expected-problems>many</expected-problems><code>c</code></test-code></test-data>";
        assert!(parse_cases(doc).unwrap_err().to_string().contains("'many'"));
    }

    #[test]
    fn filter_keeps_selected_records_and_surroundings() {
        let (out, kept) = filter_case_document(DOC, |d| d == "ok 2").unwrap();
        assert_eq!(kept, 1);
        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(out.contains("<!-- octal literals -->"));
        assert!(!out.contains("bad 1"));
        assert!(out.contains("10 &lt; 12"));

        let reparsed = parse_cases(&out).unwrap();
        assert_eq!(reparsed.len(), 1);
        assert_eq!(reparsed[0].description.as_str(), "ok 2");
    }

    #[test]
    fn filter_keeping_everything_is_identity() {
        let (out, kept) = filter_case_document(DOC, |_| true).unwrap();
        assert_eq!(kept, 2);
        assert_eq!(out, DOC);
    }

    #[test]
    fn single_case_document_reparses() {
        let case = TestCase::new("a < b", "class A { String s = \"]]>\"; }", 3);
        let doc = single_case_document(&case);
        assert!(doc.contains("<description>a &lt; b</description>"));
        let parsed = parse_cases(&doc).unwrap();
        assert_eq!(parsed, vec![case]);
    }
}
