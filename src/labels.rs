//! Label codec: class name ⇄ training-time class index.
//!
//! The index order is fixed when the codec is fitted (sorted order of the
//! distinct training labels) and persisted as an explicit ordered list.
//! Inference loads the persisted list verbatim and never re-derives the
//! order, so decode cannot silently shift if a different label subset is
//! seen later.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Bidirectional mapping between class names and contiguous indices 0..K-1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelCodec {
    /// Ordered class names; position = class index.
    classes: Vec<String>,
    /// Reverse lookup, rebuilt from `classes` on deserialization.
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl LabelCodec {
    /// Fit from the full set of labels seen in training data.
    ///
    /// Index assignment is the sorted order of distinct label strings.
    pub fn fit(labels: &[String]) -> Result<Self> {
        if labels.is_empty() {
            return Err(PipelineError::artifact(
                "cannot fit label codec on empty label set",
            ));
        }

        let mut classes: Vec<String> = labels.to_vec();
        classes.sort();
        classes.dedup();

        Ok(Self::from_classes(classes))
    }

    /// Reconstruct from a persisted ordered class list.
    pub fn from_classes(classes: Vec<String>) -> Self {
        let index = classes
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { classes, index }
    }

    /// Rebuild the reverse map after deserialization.
    pub fn rehydrate(mut self) -> Self {
        self.index = self
            .classes
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        self
    }

    /// Class index for a name, if known.
    pub fn encode(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Class name for an index.
    pub fn decode(&self, index: usize) -> Result<&str> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(PipelineError::UnknownClass {
                index,
                n_classes: self.classes.len(),
            })
    }

    /// Ordered class names.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Number of classes K.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
