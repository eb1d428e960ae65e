//! Nested-`Option` fields whose wire `null` means "clear", not "absent".
//!
//! A plain derive decodes an explicit `null` into the outer `None`, which is
//! indistinguishable from a missing field. Ownership references in state
//! patches need all three states: absent (leave untouched), `null` (clear),
//! value (set). Pair this module with `#[serde(default,
//! skip_serializing_if = "Option::is_none")]` so absent fields stay `None`
//! and present fields always decode to `Some(_)`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(inner) => inner.serialize(serializer),
        None => serializer.serialize_none(),
    }
}

pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
