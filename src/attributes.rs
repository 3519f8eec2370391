//! Typed reads over the raw attributes of a TMX element.
//!
//! Every getter degrades instead of failing: a missing or malformed value becomes a
//! sentinel (`false`, `-1`, `-1.0` or an empty string).

use std::collections::BTreeMap;

use quick_xml::events::BytesStart;

use crate::error::TmxResult;

/// Attribute name to raw (unescaped) value, as written on one element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    values: BTreeMap<String, String>,
}

impl Attributes {
    /// Collect the attributes of a start tag.
    pub fn from_start(element: &BytesStart<'_>) -> TmxResult<Self> {
        let mut values = BTreeMap::new();
        for attr in element.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            values.insert(key, value);
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// `true` only when the attribute is present and equal to `"1"`.
    pub fn bool(&self, key: &str) -> bool {
        self.get(key).unwrap_or("0") == "1"
    }

    /// Integer value, or `-1` when missing or unparsable.
    pub fn int(&self, key: &str) -> i64 {
        self.get(key).and_then(|v| v.parse().ok()).unwrap_or(-1)
    }

    /// Tile-space numeric value.
    ///
    /// Coerced through an integer first: `"2.75"` reads as `2.0`. Missing or
    /// unparsable values yield `-1.0`. A strict integer parse would give `-1.0` for
    /// `"2.75"` as well; fractions are truncated instead.
    pub fn float(&self, key: &str) -> f32 {
        let whole = self.get(key).and_then(|v| {
            v.parse::<i64>().ok().or_else(|| {
                v.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        });
        whole.unwrap_or(-1) as f32
    }

    /// Raw value, or an empty string when missing.
    pub fn string(&self, key: &str) -> String {
        self.get(key).unwrap_or_default().to_string()
    }

    /// Drop the given keys and return whatever is left.
    pub fn without(mut self, keys: &[&str]) -> BTreeMap<String, String> {
        for key in keys {
            self.values.remove(*key);
        }
        self.values
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
