use crate::record::Record;

/// Records whose name contains `term`, ignoring case. An empty term matches
/// everything. Order is preserved.
pub fn filtered(records: &[Record], term: &str) -> Vec<Record> {
    if term.is_empty() {
        return records.to_vec();
    }
    let needle = term.to_lowercase();
    records
        .iter()
        .filter(|r| r.name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Record> {
        vec![
            Record::new("CNN", "http://a/cnn.m3u8"),
            Record::new("BBC", "http://b/bbc.m3u8"),
            Record::new("CNN International", "http://a/cnni.m3u8"),
            Record::new("Canal+", "http://c/canal.m3u8"),
        ]
    }

    #[test]
    fn test_filter_is_case_insensitive_substring() {
        let records = vec![
            Record::new("CNN", "http://a/cnn.m3u8"),
            Record::new("BBC", "http://b/bbc.m3u8"),
        ];
        let hits = filtered(&records, "nn");
        assert_eq!(hits, vec![records[0].clone()]);
    }

    #[test]
    fn test_filter_matches_name_only() {
        let records = sample();
        // "bbc.m3u8" appears in a url but no name contains "m3u8".
        assert!(filtered(&records, "m3u8").is_empty());
    }

    #[test]
    fn test_filter_preserves_order() {
        let records = sample();
        let names: Vec<_> = filtered(&records, "CN")
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["CNN", "CNN International"]);
    }

    #[test]
    fn test_empty_term_is_identity() {
        let records = sample();
        assert_eq!(filtered(&records, ""), records);
        assert!(filtered(&[], "").is_empty());
    }

    #[test]
    fn test_filter_is_idempotent() {
        let records = sample();
        for term in ["", "c", "CNN", "nal", "zzz", " "] {
            let once = filtered(&records, term);
            assert_eq!(filtered(&once, term), once, "term {:?}", term);
        }
    }

    #[test]
    fn test_filter_folds_non_ascii_case() {
        let records = vec![
            Record::new("ÖRF Eins", "http://orf/1"),
            Record::new("Ария", "http://aria"),
        ];
        assert_eq!(filtered(&records, "örf").len(), 1);
        assert_eq!(filtered(&records, "АРИЯ").len(), 1);
    }
}
