//! Sample batches and their wire form.
//!
//! A transport message is a JSON object with three equal-length numeric lists:
//!
//! ```json
//! {"x_values": [101.2, 99.8], "y_values": [-50.1, -49.7], "z_values": [0.3, -0.2]}
//! ```
//!
//! Decoding classifies every way a message can be wrong so the engine can
//! count and log discards precisely. A batch that fails validation never
//! reaches engine state.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::axis::{Axis, PerAxis};

/// Why a batch was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedBatch {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("missing field '{}'", .0.field_name())]
    MissingField(Axis),

    #[error("field '{}' is not a list", .0.field_name())]
    NotAList(Axis),

    #[error("field '{}' has non-numeric element at index {index}", axis.field_name())]
    NonNumeric { axis: Axis, index: usize },

    #[error("field '{}' has non-finite element at index {index}", axis.field_name())]
    NonFinite { axis: Axis, index: usize },

    #[error("axis lengths differ (x={x}, y={y}, z={z})")]
    LengthMismatch { x: usize, y: usize, z: usize },

    #[error("batch contains no samples")]
    Empty,
}

/// Serialized shape of a batch on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPayload {
    pub x_values: Vec<f64>,
    pub y_values: Vec<f64>,
    pub z_values: Vec<f64>,
}

/// One batch of raw tri-axial samples (milli-g), in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBatch {
    pub axes: PerAxis<Vec<f64>>,
}

impl SampleBatch {
    pub const fn new(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Self {
        Self {
            axes: PerAxis::new(x, y, z),
        }
    }

    /// Number of samples per axis (the X length; meaningful once validated).
    pub fn len(&self) -> usize {
        self.axes.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn samples(&self, axis: Axis) -> &[f64] {
        &self.axes[axis]
    }

    /// Check structural invariants: equal, non-zero lengths and finite values.
    ///
    /// Returns the per-axis sample count on success.
    pub fn validate(&self) -> Result<usize, MalformedBatch> {
        let (x, y, z) = (self.axes.x.len(), self.axes.y.len(), self.axes.z.len());
        if x != y || y != z {
            return Err(MalformedBatch::LengthMismatch { x, y, z });
        }
        if x == 0 {
            return Err(MalformedBatch::Empty);
        }
        for (axis, values) in self.axes.iter() {
            if let Some(index) = values.iter().position(|v| !v.is_finite()) {
                return Err(MalformedBatch::NonFinite { axis, index });
            }
        }
        Ok(x)
    }

    /// Decode and validate a transport message.
    ///
    /// Checks run in stages over all three axes: field presence, list type,
    /// numeric content, then lengths.
    pub fn from_json(bytes: &[u8]) -> Result<Self, MalformedBatch> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| MalformedBatch::InvalidJson(e.to_string()))?;
        let object = value.as_object().ok_or(MalformedBatch::NotAnObject)?;

        for axis in Axis::ALL {
            if !object.contains_key(axis.field_name()) {
                return Err(MalformedBatch::MissingField(axis));
            }
        }

        let mut lists = Vec::with_capacity(Axis::ALL.len());
        for axis in Axis::ALL {
            let list = object
                .get(axis.field_name())
                .and_then(Value::as_array)
                .ok_or(MalformedBatch::NotAList(axis))?;
            lists.push((axis, list));
        }

        let mut axes: PerAxis<Vec<f64>> = PerAxis::default();
        for (axis, list) in lists {
            let mut values = Vec::with_capacity(list.len());
            for (index, element) in list.iter().enumerate() {
                let v = element
                    .as_f64()
                    .ok_or(MalformedBatch::NonNumeric { axis, index })?;
                values.push(v);
            }
            axes[axis] = values;
        }

        let batch = Self { axes };
        batch.validate()?;
        Ok(batch)
    }

    /// Encode as a transport message.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&BatchPayload::from(self.clone()))
    }
}

impl From<BatchPayload> for SampleBatch {
    fn from(p: BatchPayload) -> Self {
        Self::new(p.x_values, p.y_values, p.z_values)
    }
}

impl From<SampleBatch> for BatchPayload {
    fn from(b: SampleBatch) -> Self {
        let PerAxis { x, y, z } = b.axes;
        Self {
            x_values: x,
            y_values: y,
            z_values: z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_well_formed_message() {
        let msg = br#"{"x_values":[1,2.5],"y_values":[-1,0],"z_values":[3,4]}"#;
        let batch = SampleBatch::from_json(msg).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.samples(Axis::X), &[1.0, 2.5]);
    }

    #[test]
    fn test_missing_field_reported_before_type_errors() {
        let msg = br#"{"x_values":"oops","y_values":[1]}"#;
        assert_eq!(
            SampleBatch::from_json(msg),
            Err(MalformedBatch::MissingField(Axis::Z))
        );
    }

    #[test]
    fn test_non_list_field_rejected() {
        let msg = br#"{"x_values":[1],"y_values":5,"z_values":[1]}"#;
        assert_eq!(
            SampleBatch::from_json(msg),
            Err(MalformedBatch::NotAList(Axis::Y))
        );
    }

    #[test]
    fn test_non_numeric_element_rejected() {
        let msg = br#"{"x_values":[1,2],"y_values":[1,2],"z_values":[1,"a"]}"#;
        assert_eq!(
            SampleBatch::from_json(msg),
            Err(MalformedBatch::NonNumeric { axis: Axis::Z, index: 1 })
        );
    }

    #[test]
    fn test_unequal_lengths_rejected() {
        let msg = br#"{"x_values":[1,2],"y_values":[1],"z_values":[1,2]}"#;
        assert_eq!(
            SampleBatch::from_json(msg),
            Err(MalformedBatch::LengthMismatch { x: 2, y: 1, z: 2 })
        );
    }

    #[test]
    fn test_invalid_utf8_is_invalid_json() {
        let msg = b"\xff\xfe garbage";
        assert!(matches!(SampleBatch::from_json(msg), Err(MalformedBatch::InvalidJson(_))));
    }

    #[test]
    fn test_empty_lists_rejected() {
        let msg = br#"{"x_values":[],"y_values":[],"z_values":[]}"#;
        assert_eq!(SampleBatch::from_json(msg), Err(MalformedBatch::Empty));
    }

    #[test]
    fn test_garbage_and_non_objects_rejected() {
        assert!(matches!(
            SampleBatch::from_json(b"not json"),
            Err(MalformedBatch::InvalidJson(_))
        ));
        assert_eq!(
            SampleBatch::from_json(b"[1,2,3]"),
            Err(MalformedBatch::NotAnObject)
        );
    }

    #[test]
    fn test_validate_flags_nan() {
        let batch = SampleBatch::new(vec![1.0], vec![f64::NAN], vec![0.0]);
        assert_eq!(
            batch.validate(),
            Err(MalformedBatch::NonFinite { axis: Axis::Y, index: 0 })
        );
    }

    #[test]
    fn test_encoded_message_uses_axis_field_names() {
        let batch = SampleBatch::new(vec![1.0], vec![2.0], vec![3.0]);
        let json = batch.to_json().unwrap();
        let v: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["y_values"][0], 2.0);
    }
}
