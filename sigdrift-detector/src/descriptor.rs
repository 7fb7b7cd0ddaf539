//! Change descriptor model
//!
//! A [`ChangeDescriptor`] records how a declaration's signature differs from the
//! form it had when tracking began. Descriptors are immutable: every incremental
//! update derives a new descriptor from the previous one, and the change flags are
//! always recomputed against the original signature kept inside the descriptor.

use crate::types::DeclarationRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One parameter of a signature snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Declared type, empty if the parameter has none (yet)
    pub type_text: String,
    pub default_value: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, type_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_text: type_text.into(),
            default_value: None,
        }
    }

    /// Builder method: set the default value text
    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.type_text.is_empty() {
            write!(f, ": {}", self.type_text)?;
        }
        if let Some(default_value) = &self.default_value {
            write!(f, " = {}", default_value)?;
        }
        Ok(())
    }
}

/// A normalized signature snapshot, as produced by a signature extractor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub visibility: Option<String>,
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
}

impl Signature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            visibility: None,
            name: name.into(),
            parameters: Vec::new(),
            return_type: None,
        }
    }

    /// Builder method: append a parameter
    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Builder method: set the return type
    pub fn with_return_type(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = Some(return_type.into());
        self
    }

    /// Builder method: set the visibility modifier
    pub fn with_visibility(mut self, visibility: impl Into<String>) -> Self {
        self.visibility = Some(visibility.into());
        self
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(visibility) = &self.visibility {
            write!(f, "{} ", visibility)?;
        }
        write!(f, "{}(", self.name)?;
        for (idx, parameter) in self.parameters.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", parameter)?;
        }
        write!(f, ")")?;
        if let Some(return_type) = &self.return_type {
            write!(f, ": {}", return_type)?;
        }
        Ok(())
    }
}

/// Where a current parameter came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterOrigin {
    /// Index of the parameter in the original signature
    Original(usize),
    /// Parameter did not exist in the original signature
    New,
}

impl ParameterOrigin {
    pub fn original_index(&self) -> Option<usize> {
        match self {
            ParameterOrigin::Original(idx) => Some(*idx),
            ParameterOrigin::New => None,
        }
    }
}

/// A parameter of the current signature together with its origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    pub type_text: String,
    pub default_value: Option<String>,
    pub origin: ParameterOrigin,
}

impl ParameterInfo {
    pub fn new(parameter: Parameter, origin: ParameterOrigin) -> Self {
        Self {
            name: parameter.name,
            type_text: parameter.type_text,
            default_value: parameter.default_value,
            origin,
        }
    }

    pub fn is_new(&self) -> bool {
        self.origin == ParameterOrigin::New
    }
}

/// Which parts of a signature differ from the original form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChangeFlags {
    pub name_changed: bool,
    pub visibility_changed: bool,
    pub parameter_set_or_order_changed: bool,
    pub parameter_types_changed: bool,
    pub parameter_names_changed: bool,
    pub return_type_changed: bool,
}

impl ChangeFlags {
    /// True if any flag is set
    pub fn any(&self) -> bool {
        self.name_changed
            || self.visibility_changed
            || self.parameter_set_or_order_changed
            || self.parameter_types_changed
            || self.parameter_names_changed
            || self.return_type_changed
    }

    /// True if the only difference is the declared name
    pub fn is_rename_only(&self) -> bool {
        self.name_changed
            && !self.visibility_changed
            && !self.parameter_set_or_order_changed
            && !self.parameter_types_changed
            && !self.parameter_names_changed
            && !self.return_type_changed
    }
}

/// Immutable record of the delta between an original and a current signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeDescriptor {
    /// The tracked declaration
    pub declaration: DeclarationRef,
    original: Signature,
    name: String,
    visibility: Option<String>,
    parameters: Vec<ParameterInfo>,
    return_type: Option<String>,
    flags: ChangeFlags,
}

impl ChangeDescriptor {
    /// Create the initial descriptor for a declaration: nothing has changed yet
    pub fn initial(declaration: DeclarationRef, original: Signature) -> Self {
        let parameters = original
            .parameters
            .iter()
            .cloned()
            .enumerate()
            .map(|(idx, parameter)| ParameterInfo::new(parameter, ParameterOrigin::Original(idx)))
            .collect();

        Self {
            declaration,
            name: original.name.clone(),
            visibility: original.visibility.clone(),
            return_type: original.return_type.clone(),
            parameters,
            original,
            flags: ChangeFlags::default(),
        }
    }

    /// Derive a descriptor for a newer form of the same declaration
    ///
    /// Flags are computed against the original signature, never against `self`,
    /// so folding the same snapshots always yields the same result.
    pub fn derive(
        &self,
        name: impl Into<String>,
        visibility: Option<String>,
        parameters: Vec<ParameterInfo>,
        return_type: Option<String>,
    ) -> Self {
        let mut derived = Self {
            declaration: self.declaration.clone(),
            original: self.original.clone(),
            name: name.into(),
            visibility,
            parameters,
            return_type,
            flags: ChangeFlags::default(),
        };
        derived.flags = derived.compute_flags();
        derived
    }

    fn compute_flags(&self) -> ChangeFlags {
        let original = &self.original;

        let parameter_set_or_order_changed = self.parameters.len() != original.parameters.len()
            || self
                .parameters
                .iter()
                .enumerate()
                .any(|(idx, p)| p.origin != ParameterOrigin::Original(idx));

        let mut parameter_types_changed = false;
        let mut parameter_names_changed = false;
        for parameter in &self.parameters {
            let Some(old) = parameter
                .origin
                .original_index()
                .and_then(|idx| original.parameters.get(idx))
            else {
                continue;
            };
            parameter_types_changed |= parameter.type_text != old.type_text;
            parameter_names_changed |= parameter.name != old.name;
        }

        ChangeFlags {
            name_changed: self.name != original.name,
            visibility_changed: self.visibility != original.visibility,
            parameter_set_or_order_changed,
            parameter_types_changed,
            parameter_names_changed,
            return_type_changed: self.return_type != original.return_type,
        }
    }

    /// The signature this descriptor compares against
    pub fn original(&self) -> &Signature {
        &self.original
    }

    pub fn original_name(&self) -> &str {
        &self.original.name
    }

    /// Current declared name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn visibility(&self) -> Option<&str> {
        self.visibility.as_deref()
    }

    pub fn parameters(&self) -> &[ParameterInfo] {
        &self.parameters
    }

    pub fn return_type(&self) -> Option<&str> {
        self.return_type.as_deref()
    }

    pub fn flags(&self) -> ChangeFlags {
        self.flags
    }

    /// True if the current form differs from the original in any tracked way
    pub fn has_changes(&self) -> bool {
        self.flags.any()
    }

    pub fn is_rename_only(&self) -> bool {
        self.flags.is_rename_only()
    }

    /// Current parameter names, in order
    pub fn new_order(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    /// The current form as a signature snapshot
    pub fn current(&self) -> Signature {
        Signature {
            visibility: self.visibility.clone(),
            name: self.name.clone(),
            parameters: self
                .parameters
                .iter()
                .map(|p| Parameter {
                    name: p.name.clone(),
                    type_text: p.type_text.clone(),
                    default_value: p.default_value.clone(),
                })
                .collect(),
            return_type: self.return_type.clone(),
        }
    }

    /// Normalized rendering of the current form
    pub fn signature_text(&self) -> String {
        self.current().to_string()
    }
}

impl fmt::Display for ChangeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.original, self.current())
    }
}
