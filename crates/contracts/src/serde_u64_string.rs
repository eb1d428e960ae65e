//! Serialize `u64` values as decimal strings so RNG state words and seeds
//! survive JSON consumers that round-trip numbers through IEEE doubles.

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum U64Input {
        String(String),
        Number(u64),
    }

    match U64Input::deserialize(deserializer)? {
        U64Input::String(raw) => raw.parse::<u64>().map_err(D::Error::custom),
        U64Input::Number(value) => Ok(value),
    }
}

/// Same treatment for fixed arrays of four words (xoshiro state).
pub mod array4 {
    use serde::de::Error;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u64; 4], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(4))?;
        for word in value {
            seq.serialize_element(&word.to_string())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u64; 4], D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Word {
            String(String),
            Number(u64),
        }

        let raw: Vec<Word> = Vec::deserialize(deserializer)?;
        if raw.len() != 4 {
            return Err(D::Error::custom(format!(
                "expected 4 state words, got {}",
                raw.len()
            )));
        }
        let mut out = [0u64; 4];
        for (slot, word) in out.iter_mut().zip(raw) {
            *slot = match word {
                Word::String(s) => s.parse::<u64>().map_err(D::Error::custom)?,
                Word::Number(n) => n,
            };
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct Wrapper {
        #[serde(with = "super")]
        seed: u64,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct StateWrapper {
        #[serde(with = "super::array4")]
        words: [u64; 4],
    }

    #[test]
    fn deserialize_accepts_string() {
        let parsed: Wrapper = serde_json::from_str(r#"{"seed":"1337"}"#).expect("string seed");
        assert_eq!(parsed.seed, 1337);
    }

    #[test]
    fn deserialize_accepts_number() {
        let parsed: Wrapper = serde_json::from_str(r#"{"seed":1337}"#).expect("numeric seed");
        assert_eq!(parsed.seed, 1337);
    }

    #[test]
    fn large_words_round_trip_exactly() {
        let state = StateWrapper {
            words: [u64::MAX, 1, (1 << 53) + 1, 0],
        };
        let encoded = serde_json::to_string(&state).expect("encode");
        let decoded: StateWrapper = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(state, decoded);
    }
}
