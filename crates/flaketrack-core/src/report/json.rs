use super::FlakeReport;

pub fn render(report: &FlakeReport) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec_pretty(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_state;
    use chrono::NaiveDate;

    #[test]
    fn test_json_shape() {
        let report = FlakeReport::from_state(
            &sample_state(),
            7,
            NaiveDate::from_ymd_opt(2019, 2, 5).unwrap(),
        );
        let bytes = render(&report).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(v["window_days"], 7);
        assert_eq!(v["date"], "2019-02-05");
        let records = v["records"].as_array().unwrap();
        assert_eq!(records.len(), 4);
        let first = &records[0];
        assert_eq!(first["branch"], "master");
        assert_eq!(first["path"], "pilot");
        assert!(first.get("suite").is_none());
        assert!(first["failures"].is_u64());
    }
}
