//! Per-instance parameter records and typed access.
//!
//! A record is a fixed-size byte buffer laid out by the controller: each
//! parameter owns `byte_size()` bytes at its precomputed offset. Floats and
//! ints are little-endian 4-byte values; bools and triggers are one byte.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::definition::{AnimatorControllerDefinition, Parameter, ParameterType};
use crate::error::{CoreError, CoreResult};
use crate::hash::StringHash;

/// Untyped 4-byte parameter value. The owning parameter decides how the bits
/// are read.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variant(pub u32);

impl Variant {
    #[inline]
    pub fn from_bool(v: bool) -> Self {
        Self(v as u32)
    }

    #[inline]
    pub fn from_int(v: i32) -> Self {
        Self(v as u32)
    }

    #[inline]
    pub fn from_float(v: f32) -> Self {
        Self(v.to_bits())
    }

    #[inline]
    pub fn as_bool(self) -> bool {
        self.0 & 0xFF != 0
    }

    #[inline]
    pub fn as_int(self) -> i32 {
        self.0 as i32
    }

    #[inline]
    pub fn as_float(self) -> f32 {
        f32::from_bits(self.0)
    }
}

/// Snapshot of all parameter values of one instance for one tick.
pub type ParameterValues = SmallVec<[Variant; 16]>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParameterRecord {
    bytes: Vec<u8>,
}

impl ParameterRecord {
    pub fn zeroed(size: usize) -> Self {
        Self {
            bytes: vec![0; size],
        }
    }

    /// Record sized for `controller` with every parameter at its default.
    pub fn for_controller(controller: &AnimatorControllerDefinition) -> Self {
        let mut record = Self::zeroed(controller.parameters_record_size as usize);
        for p in &controller.parameters {
            record.write(p, p.default_value);
        }
        record
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Read a parameter. Out-of-range fields read as zero.
    pub fn read(&self, parameter: &Parameter) -> Variant {
        let start = parameter.offset as usize;
        match parameter.ty {
            ParameterType::Float | ParameterType::Int => self
                .bytes
                .get(start..start + 4)
                .map(|b| Variant(u32::from_le_bytes([b[0], b[1], b[2], b[3]])))
                .unwrap_or_default(),
            ParameterType::Bool | ParameterType::Trigger => self
                .bytes
                .get(start)
                .map(|b| Variant::from_bool(*b != 0))
                .unwrap_or_default(),
        }
    }

    /// Write a parameter. Returns false when the field lies outside the record.
    pub fn write(&mut self, parameter: &Parameter, value: Variant) -> bool {
        let start = parameter.offset as usize;
        match parameter.ty {
            ParameterType::Float | ParameterType::Int => {
                match self.bytes.get_mut(start..start + 4) {
                    Some(dst) => {
                        dst.copy_from_slice(&value.0.to_le_bytes());
                        true
                    }
                    None => false,
                }
            }
            ParameterType::Bool | ParameterType::Trigger => match self.bytes.get_mut(start) {
                Some(dst) => {
                    *dst = value.as_bool() as u8;
                    true
                }
                None => false,
            },
        }
    }
}

/// Gather every parameter value of `record` in declaration order.
pub fn read_parameters(
    controller: &AnimatorControllerDefinition,
    record: &ParameterRecord,
    out: &mut ParameterValues,
) {
    out.clear();
    out.extend(controller.parameters.iter().map(|p| record.read(p)));
}

/// Clear every auto-release trigger.
pub fn release_triggers(controller: &AnimatorControllerDefinition, record: &mut ParameterRecord) {
    for &index in &controller.trigger_parameters {
        if let Some(p) = controller.parameters.get(index as usize) {
            record.write(p, Variant::from_bool(false));
        }
    }
}

/// Typed, name-addressed view over one instance's record.
pub struct ParametersMut<'a> {
    controller: &'a AnimatorControllerDefinition,
    record: &'a mut ParameterRecord,
}

impl<'a> ParametersMut<'a> {
    pub fn new(controller: &'a AnimatorControllerDefinition, record: &'a mut ParameterRecord) -> Self {
        Self { controller, record }
    }

    fn lookup(&self, name: StringHash, accepted: &[ParameterType], expected: &'static str) -> CoreResult<&'a Parameter> {
        let controller: &'a AnimatorControllerDefinition = self.controller;
        let parameter = controller
            .parameters
            .iter()
            .find(|p| p.name == name)
            .ok_or(CoreError::UnknownParameter { name })?;
        if !accepted.contains(&parameter.ty) {
            return Err(CoreError::ParameterTypeMismatch {
                name,
                expected,
                actual: parameter.ty.name(),
            });
        }
        Ok(parameter)
    }

    pub fn set_float(&mut self, name: impl Into<StringHash>, value: f32) -> CoreResult<()> {
        let p = self.lookup(name.into(), &[ParameterType::Float], "float")?;
        self.record.write(p, Variant::from_float(value));
        Ok(())
    }

    pub fn set_int(&mut self, name: impl Into<StringHash>, value: i32) -> CoreResult<()> {
        let p = self.lookup(name.into(), &[ParameterType::Int], "int")?;
        self.record.write(p, Variant::from_int(value));
        Ok(())
    }

    pub fn set_bool(&mut self, name: impl Into<StringHash>, value: bool) -> CoreResult<()> {
        let p = self.lookup(name.into(), &[ParameterType::Bool], "bool")?;
        self.record.write(p, Variant::from_bool(value));
        Ok(())
    }

    /// Raise a trigger. It is cleared again at the end of the next tick.
    pub fn set_trigger(&mut self, name: impl Into<StringHash>) -> CoreResult<()> {
        let p = self.lookup(name.into(), &[ParameterType::Trigger], "trigger")?;
        self.record.write(p, Variant::from_bool(true));
        Ok(())
    }

    pub fn reset_trigger(&mut self, name: impl Into<StringHash>) -> CoreResult<()> {
        let p = self.lookup(name.into(), &[ParameterType::Trigger], "trigger")?;
        self.record.write(p, Variant::from_bool(false));
        Ok(())
    }

    pub fn float(&self, name: impl Into<StringHash>) -> CoreResult<f32> {
        let p = self.lookup(name.into(), &[ParameterType::Float], "float")?;
        Ok(self.record.read(p).as_float())
    }

    pub fn int(&self, name: impl Into<StringHash>) -> CoreResult<i32> {
        let p = self.lookup(name.into(), &[ParameterType::Int], "int")?;
        Ok(self.record.read(p).as_int())
    }

    pub fn bool(&self, name: impl Into<StringHash>) -> CoreResult<bool> {
        let p = self.lookup(
            name.into(),
            &[ParameterType::Bool, ParameterType::Trigger],
            "bool",
        )?;
        Ok(self.record.read(p).as_bool())
    }

    pub fn record(&self) -> &ParameterRecord {
        self.record
    }
}
