//! Categorical encoders.
//!
//! An encoder maps each distinct training value of one attribute to a dense
//! integer code. Codes follow the sorted (byte-wise) order of the distinct
//! values, so the class list alone reproduces every code.

use crate::record::CategoricalAttribute;
use crate::{DataError, Result};
use serde::{Deserialize, Serialize};

/// Lookup table for a single categorical attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    /// Attribute this encoder was fit on.
    pub attribute: CategoricalAttribute,
    /// Distinct values, sorted; the index is the code.
    classes: Vec<String>,
}

impl CategoryEncoder {
    /// Fits an encoder on the given values. Duplicates are collapsed.
    pub fn fit<I, S>(attribute: CategoricalAttribute, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut classes: Vec<String> = values.into_iter().map(Into::into).collect();
        classes.sort_unstable();
        classes.dedup();
        Self { attribute, classes }
    }

    /// Rebuilds an encoder from a persisted class list.
    ///
    /// Returns `None` if the list is not strictly sorted, since codes would
    /// then differ from the ones produced at training time.
    pub fn from_classes(attribute: CategoricalAttribute, classes: Vec<String>) -> Option<Self> {
        if classes.windows(2).all(|w| w[0] < w[1]) {
            Some(Self { attribute, classes })
        } else {
            None
        }
    }

    /// Returns the code for `value`.
    ///
    /// # Errors
    ///
    /// [`DataError::UnknownCategory`] if `value` was not seen at fit time.
    pub fn encode(&self, value: &str) -> Result<u32> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .map(|code| code as u32)
            .map_err(|_| DataError::UnknownCategory {
                attribute: self.attribute.name().to_string(),
                value: value.to_string(),
            })
    }

    /// Returns the value behind `code`, if any.
    pub fn decode(&self, code: u32) -> Option<&str> {
        self.classes.get(code as usize).map(String::as_str)
    }

    /// Known values in code order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// True when `value` was seen during fitting.
    pub fn contains(&self, value: &str) -> bool {
        self.encode(value).is_ok()
    }

    /// Number of known values.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// True when no values are known.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// True when the classes are strictly sorted (the persisted invariant).
    pub fn is_canonical(&self) -> bool {
        self.classes.windows(2).all(|w| w[0] < w[1])
    }
}

/// One encoder per categorical attribute.
///
/// Passed by value from training to inference and persisted with the model;
/// there is no process-wide encoder state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEncoders {
    pub origin: CategoryEncoder,
    pub flight_type: CategoryEncoder,
    pub service_type: CategoryEncoder,
    pub product_name: CategoryEncoder,
}

impl CategoryEncoders {
    /// Returns the encoder for `attribute`.
    pub fn get(&self, attribute: CategoricalAttribute) -> &CategoryEncoder {
        match attribute {
            CategoricalAttribute::Origin => &self.origin,
            CategoricalAttribute::FlightType => &self.flight_type,
            CategoricalAttribute::ServiceType => &self.service_type,
            CategoricalAttribute::ProductName => &self.product_name,
        }
    }

    /// Encodes `value` with the encoder for `attribute`.
    pub fn encode(&self, attribute: CategoricalAttribute, value: &str) -> Result<u32> {
        self.get(attribute).encode(value)
    }

    /// Checks that every slot holds the encoder for its own attribute and
    /// that every class list is canonical. Returns a description of the
    /// first problem found.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for attribute in CategoricalAttribute::ALL {
            let encoder = self.get(attribute);
            if encoder.attribute != attribute {
                return Err(format!(
                    "encoder slot '{}' holds an encoder for '{}'",
                    attribute, encoder.attribute
                ));
            }
            if !encoder.is_canonical() {
                return Err(format!("encoder '{}' classes are not sorted and unique", attribute));
            }
        }
        Ok(())
    }
}
