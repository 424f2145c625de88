//! JUnit artifact parsing.
//!
//! An artifact is read once into typed [`Suite`]s and outcome records are
//! derived from those. The suite's `failures` attribute gates case
//! inspection: a suite reporting zero failures yields only passing records,
//! even when one of its cases happens to carry a `<failure>` child.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JunitError {
    #[error("artifact is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("malformed XML at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("<{element}> attribute '{attribute}' is not an integer: '{value}'")]
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },

    #[error("document ended inside <{open}>")]
    Truncated { open: String },
}

/// One `<testsuite>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suite {
    pub name: String,
    pub failures: i64,
    pub tests: i64,
    pub cases: Vec<Case>,
}

/// One `<testcase>` directly inside a suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case {
    pub class: String,
    pub method: String,
    /// Has at least one direct `<failure>` child.
    pub has_failure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeRecord {
    pub suite: String,
    pub class: String,
    pub method: String,
    pub failed: bool,
}

/// A suite's contribution from one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteOutcome {
    pub name: String,
    /// The suite's `failures` attribute was non-zero.
    pub failed: bool,
    pub records: Vec<OutcomeRecord>,
}

impl Suite {
    pub fn outcome(&self) -> SuiteOutcome {
        let failed = self.failures != 0;
        let records = self
            .cases
            .iter()
            .map(|case| OutcomeRecord {
                suite: self.name.clone(),
                class: case.class.clone(),
                method: case.method.clone(),
                failed: failed && case.has_failure,
            })
            .collect();
        SuiteOutcome {
            name: self.name.clone(),
            failed,
            records,
        }
    }
}

/// Parse an artifact into per-suite outcomes.
pub fn parse(bytes: &[u8]) -> Result<Vec<SuiteOutcome>, JunitError> {
    Ok(parse_suites(bytes)?.iter().map(Suite::outcome).collect())
}

/// Parse an artifact into a flat list of outcome records.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<OutcomeRecord>, JunitError> {
    Ok(parse(bytes)?
        .into_iter()
        .flat_map(|suite| suite.records)
        .collect())
}

/// An element the parser is currently inside.
enum Open {
    Suite(Suite),
    Case(Case),
    Failure,
    Other(String),
}

impl Open {
    fn tag(&self) -> &str {
        match self {
            Open::Suite(_) => "testsuite",
            Open::Case(_) => "testcase",
            Open::Failure => "failure",
            Open::Other(name) => name.as_str(),
        }
    }
}

/// Parse an artifact into typed suites, in document order of their closing
/// tags. Suites may appear at any depth.
pub fn parse_suites(bytes: &[u8]) -> Result<Vec<Suite>, JunitError> {
    let text = std::str::from_utf8(bytes)?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Open> = Vec::new();
    let mut suites = Vec::new();

    loop {
        let event = reader.read_event().map_err(|source| JunitError::Xml {
            position: reader.error_position() as u64,
            source,
        })?;
        let position = reader.buffer_position() as u64;

        match event {
            Event::Start(e) => {
                let open = open_element(&e, stack.last(), position)?;
                stack.push(open);
            }
            Event::Empty(e) => {
                let open = open_element(&e, stack.last(), position)?;
                close(open, &mut stack, &mut suites);
            }
            Event::End(_) => {
                if let Some(open) = stack.pop() {
                    close(open, &mut stack, &mut suites);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(JunitError::Truncated {
            open: open.tag().to_string(),
        });
    }
    Ok(suites)
}

fn open_element(
    e: &BytesStart<'_>,
    parent: Option<&Open>,
    position: u64,
) -> Result<Open, JunitError> {
    let open = match e.local_name().as_ref() {
        b"testsuite" => Open::Suite(Suite {
            name: required(e, "testsuite", "name", position)?,
            failures: count(e, "testsuite", "failures", position)?,
            tests: count(e, "testsuite", "tests", position)?,
            cases: Vec::new(),
        }),
        b"testcase" if matches!(parent, Some(Open::Suite(_))) => Open::Case(Case {
            class: required(e, "testcase", "classname", position)?,
            method: required(e, "testcase", "name", position)?,
            has_failure: false,
        }),
        b"failure" if matches!(parent, Some(Open::Case(_))) => Open::Failure,
        _ => Open::Other(String::from_utf8_lossy(e.name().as_ref()).into_owned()),
    };
    Ok(open)
}

/// Attach a finished element to its parent.
fn close(open: Open, stack: &mut [Open], suites: &mut Vec<Suite>) {
    match open {
        Open::Suite(suite) => suites.push(suite),
        Open::Case(case) => {
            if let Some(Open::Suite(suite)) = stack.last_mut() {
                suite.cases.push(case);
            }
        }
        Open::Failure => {
            if let Some(Open::Case(case)) = stack.last_mut() {
                case.has_failure = true;
            }
        }
        Open::Other(_) => {}
    }
}

fn attribute(
    e: &BytesStart<'_>,
    name: &str,
    position: u64,
) -> Result<Option<String>, JunitError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| JunitError::Xml {
            position,
            source: quick_xml::Error::InvalidAttr(err),
        })?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|source| JunitError::Xml { position, source })?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn required(
    e: &BytesStart<'_>,
    element: &'static str,
    name: &'static str,
    position: u64,
) -> Result<String, JunitError> {
    attribute(e, name, position)?.ok_or(JunitError::MissingAttribute {
        element,
        attribute: name,
    })
}

fn count(
    e: &BytesStart<'_>,
    element: &'static str,
    name: &'static str,
    position: u64,
) -> Result<i64, JunitError> {
    let value = required(e, element, name, position)?;
    value
        .trim()
        .parse()
        .map_err(|_| JunitError::InvalidAttribute {
            element,
            attribute: name,
            value,
        })
}
