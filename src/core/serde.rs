use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// Serializes Duration as seconds
pub fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    duration.as_secs_f64().serialize(serializer)
}

/// Deserializes Duration from seconds
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(serde::de::Error::custom(format!(
            "duration must be a non-negative number of seconds, got {}",
            secs
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Serializes a 4-byte reference tag as a string
pub fn serialize_tag<S>(tag: &[u8; 4], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let text: String = tag
        .iter()
        .take_while(|b| **b != 0)
        .map(|b| *b as char)
        .collect();
    text.serialize(serializer)
}

/// Deserializes a reference tag of at most four ASCII characters
pub fn deserialize_tag<'de, D>(deserializer: D) -> Result<[u8; 4], D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    if text.len() > 4 || !text.is_ascii() {
        return Err(serde::de::Error::custom(format!(
            "reference tag must be at most 4 ASCII characters, got {:?}",
            text
        )));
    }
    let mut tag = [0u8; 4];
    tag[..text.len()].copy_from_slice(text.as_bytes());
    Ok(tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json;

    #[derive(Serialize, Deserialize)]
    struct Test {
        #[serde(serialize_with = "serialize_duration")]
        #[serde(deserialize_with = "deserialize_duration")]
        timeout: Duration,
        #[serde(serialize_with = "serialize_tag")]
        #[serde(deserialize_with = "deserialize_tag")]
        tag: [u8; 4],
    }

    #[test]
    fn test_duration_serialization() {
        let original = Test {
            timeout: Duration::from_millis(1500),
            tag: *b"WWVB",
        };

        let serialized = serde_json::to_string(&original).unwrap();
        assert_eq!(serialized, r#"{"timeout":1.5,"tag":"WWVB"}"#);

        let deserialized: Test = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized.timeout, original.timeout);
        assert_eq!(deserialized.tag, original.tag);
    }

    #[test]
    fn test_negative_duration_rejected() {
        let result: Result<Test, _> = serde_json::from_str(r#"{"timeout":-1.0,"tag":"GPS"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_short_tag_padded() {
        let parsed: Test = serde_json::from_str(r#"{"timeout":0.0,"tag":"GPS"}"#).unwrap();
        assert_eq!(parsed.tag, *b"GPS\0");
        assert!(serde_json::from_str::<Test>(r#"{"timeout":0.0,"tag":"TOOLONG"}"#).is_err());
    }
}
