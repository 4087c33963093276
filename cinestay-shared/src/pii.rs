use serde::{Serialize, Deserialize, Serializer};
use std::fmt;

/// Number of trailing characters left visible when a value is rendered.
const VISIBLE_TAIL: usize = 3;

/// A wrapper for customer contact data (phone numbers, emails) that masks its
/// value in Debug/Display output while serializing the real value.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

fn mask(raw: &str) -> String {
    let count = raw.chars().count();
    if count <= VISIBLE_TAIL {
        return "*".repeat(count.max(1));
    }
    let tail: String = raw.chars().skip(count - VISIBLE_TAIL).collect();
    format!("{}{}", "*".repeat(count - VISIBLE_TAIL), tail)
}

impl<T: fmt::Display> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", mask(&self.0.to_string()))
    }
}

impl<T: fmt::Display> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", mask(&self.0.to_string()))
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // API responses need the real value; masking only applies to log output.
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl From<String> for Masked<String> {
    fn from(value: String) -> Self {
        Masked(value)
    }
}
