//! Lenient offset decoding for payloads from the labeling service.
//!
//! Offsets arrive as JSON numbers most of the time, occasionally as numeric
//! strings, and sometimes as garbage. Anything that is not a number decodes to
//! NaN so validation can drop the span instead of failing the whole payload.

use serde::de::{self, Deserializer, Visitor};
use std::fmt;

pub(crate) const fn missing() -> f64 {
    f64::NAN
}

pub(crate) fn lenient<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(LenientOffset)
}

struct LenientOffset;

impl<'de> Visitor<'de> for LenientOffset {
    type Value = f64;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a number or numeric string")
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_i64<E: de::Error>(self, v: i64) -> Result<f64, E> {
        Ok(v as f64)
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_u64<E: de::Error>(self, v: u64) -> Result<f64, E> {
        Ok(v as f64)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<f64, E> {
        Ok(v)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<f64, E> {
        Ok(v.trim().parse::<f64>().unwrap_or(f64::NAN))
    }

    fn visit_bool<E: de::Error>(self, _v: bool) -> Result<f64, E> {
        Ok(f64::NAN)
    }

    fn visit_unit<E: de::Error>(self) -> Result<f64, E> {
        Ok(f64::NAN)
    }

    fn visit_none<E: de::Error>(self) -> Result<f64, E> {
        Ok(f64::NAN)
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<f64, A::Error> {
        while seq.next_element::<de::IgnoredAny>()?.is_some() {}
        Ok(f64::NAN)
    }

    fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<f64, A::Error> {
        while map.next_entry::<de::IgnoredAny, de::IgnoredAny>()?.is_some() {}
        Ok(f64::NAN)
    }
}
