//! Component 2: run identifier generation (§4.2). IDs are
//! `run_<ms-since-epoch>_<8-char random suffix>`, monotonically
//! non-decreasing within a process because the millisecond component
//! only grows.

use rand::Rng;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub fn generate() -> String {
    let ms = chrono::Utc::now().timestamp_millis();
    format!("run_{ms}_{}", random_suffix())
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..8).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char).collect()
}

/// The parsed halves of a run id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRunId {
    pub timestamp_ms: i64,
    pub random: String,
}

/// Recover `{timestamp, random}` from a generated id, rejecting
/// malformed input.
pub fn parse(run_id: &str) -> Option<ParsedRunId> {
    let rest = run_id.strip_prefix("run_")?;
    let (ts_str, random) = rest.split_once('_')?;
    if random.len() != 8 || !random.bytes().all(|b| ALPHABET.contains(&b)) {
        return None;
    }
    let timestamp_ms: i64 = ts_str.parse().ok()?;
    Some(ParsedRunId { timestamp_ms, random: random.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_round_trip_through_parse() {
        let id = generate();
        let parsed = parse(&id).expect("should parse a freshly generated id");
        assert_eq!(parsed.random.len(), 8);
    }

    #[test]
    fn ids_are_monotonically_non_decreasing() {
        let a = generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = generate();
        let pa = parse(&a).unwrap();
        let pb = parse(&b).unwrap();
        assert!(pb.timestamp_ms >= pa.timestamp_ms);
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(parse("123_abcdefgh").is_none());
    }

    #[test]
    fn rejects_wrong_length_suffix() {
        assert!(parse("run_123_abc").is_none());
    }

    #[test]
    fn rejects_non_numeric_timestamp() {
        assert!(parse("run_notanumber_abcdefgh").is_none());
    }

    #[test]
    fn rejects_suffix_outside_alphabet() {
        assert!(parse("run_123_ABCDEFGH").is_none());
    }
}
