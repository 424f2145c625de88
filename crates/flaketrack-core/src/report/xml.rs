use std::collections::BTreeMap;

use quick_xml::escape::escape;

use super::{FlakeReport, ReportRecord};

/// Render the report in the flakiness dashboard's XML shape:
///
/// ```text
/// <testsuites>
///   <branch name="master">
///     <testcase path="suite" class=".." method=".." failures="1" total="2"/>
///   </branch>
/// </testsuites>
/// ```
pub fn render(report: &FlakeReport) -> String {
    let mut branches: BTreeMap<&str, Vec<&ReportRecord>> = BTreeMap::new();
    for record in &report.records {
        branches.entry(record.branch.as_str()).or_default().push(record);
    }

    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str("<testsuites>\n");

    for (branch, records) in branches {
        xml.push_str(&format!(r#"  <branch name="{}">"#, escape(branch)));
        xml.push('\n');
        for r in records {
            xml.push_str(&format!(
                r#"    <testcase path="{}" class="{}" method="{}" failures="{}" total="{}"/>"#,
                escape(r.suite.as_str()),
                escape(r.class.as_str()),
                escape(r.method.as_str()),
                r.failures,
                r.total
            ));
            xml.push('\n');
        }
        xml.push_str("  </branch>\n");
    }

    xml.push_str("</testsuites>\n");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_state;
    use chrono::NaiveDate;

    fn report() -> FlakeReport {
        FlakeReport::from_state(
            &sample_state(),
            30,
            NaiveDate::from_ymd_opt(2019, 2, 5).unwrap(),
        )
    }

    #[test]
    fn test_groups_records_under_branch_elements() {
        let xml = render(&report());
        assert_eq!(xml.matches("<branch ").count(), 2);
        assert!(xml.contains(r#"<branch name="master">"#));
        assert!(xml.contains(
            r#"<testcase path="pilot" class="pilot.Discovery" method="TestPush" failures="1" total="2"/>"#
        ));
        assert!(xml.contains(
            r#"<testcase path="pilot" class="pilot.Discovery" method="TestWatch" failures="0" total="1"/>"#
        ));
        assert!(xml.trim_end().ends_with("</testsuites>"));
    }

    #[test]
    fn test_escapes_attribute_values() {
        let report = FlakeReport {
            window_days: 7,
            date: NaiveDate::from_ymd_opt(2019, 2, 5).unwrap(),
            records: vec![ReportRecord {
                branch: "feat/\"quotes\"".into(),
                suite: "a & b".into(),
                class: "Map<K, V>".into(),
                method: "it's".into(),
                failures: 0,
                total: 1,
            }],
        };
        let xml = render(&report);
        assert!(xml.contains("feat/&quot;quotes&quot;"));
        assert!(xml.contains("a &amp; b"));
        assert!(xml.contains("Map&lt;K, V&gt;"));
    }

    #[test]
    fn test_output_parses_back() {
        let xml = render(&report());
        let mut reader = quick_xml::Reader::from_str(&xml);
        let mut testcases = 0;
        loop {
            match reader.read_event().unwrap() {
                quick_xml::events::Event::Empty(e) if e.name().as_ref() == b"testcase" => {
                    testcases += 1
                }
                quick_xml::events::Event::Eof => break,
                _ => {}
            }
        }
        assert_eq!(testcases, 4);
    }

    #[test]
    fn test_empty_report() {
        let report = FlakeReport {
            window_days: 7,
            date: NaiveDate::from_ymd_opt(2019, 2, 5).unwrap(),
            records: Vec::new(),
        };
        let xml = render(&report);
        assert!(xml.contains("<testsuites>\n</testsuites>"));
    }
}
