// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The interface registry: a stable ordering of interfaces (by 7-bit
//! ordinal) and methods within each interface (by the order the
//! implementer declares them in). This is an explicit, per-endpoint value
//! — never a process-wide singleton.

use std::collections::HashMap;

use crate::error::Error;

/// What a method's response looks like on the wire, and whether the call
/// occupies a call-id at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnShape {
    None,
    FutureUnit,
    FutureTyped,
    FutureErrUnit,
    FutureErrTyped,
}

/// A single method parameter. `nullable` is descriptor metadata derived
/// from whether the declared type is `Option<_>` — the codec itself never
/// consults it.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    pub name: &'static str,
    pub type_name: &'static str,
    pub nullable: bool,
}

/// Autoref-specialization tag used by `define_interface!` to fill in
/// `ParameterDescriptor::nullable` mechanically: method resolution tries
/// `NullableTag<T>` by value first, where only `NullableTag<Option<_>>`
/// implements [`NullableViaOption`], and falls back to `&NullableTag<T>`
/// (implemented for every `T` via [`NullableDefault`]) otherwise. Diagnostic
/// plumbing only — never consulted by `Encode`/`Decode`.
#[doc(hidden)]
pub struct NullableTag<T>(pub std::marker::PhantomData<T>);

#[doc(hidden)]
pub trait NullableViaOption {
    fn rpc_core_nullable_hint(&self) -> bool;
}

impl<T> NullableViaOption for NullableTag<Option<T>> {
    fn rpc_core_nullable_hint(&self) -> bool {
        true
    }
}

#[doc(hidden)]
pub trait NullableDefault {
    fn rpc_core_nullable_hint(&self) -> bool;
}

impl<T> NullableDefault for &NullableTag<T> {
    fn rpc_core_nullable_hint(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    pub index: u8,
    pub name: &'static str,
    pub parameters: Vec<ParameterDescriptor>,
    pub return_shape: ReturnShape,
}

#[derive(Debug, Clone)]
pub struct InterfaceDescriptor {
    pub ordinal: u8,
    pub name: &'static str,
    pub methods: Vec<MethodDescriptor>,
}

impl InterfaceDescriptor {
    pub fn method(&self, index: u8) -> Option<&MethodDescriptor> {
        self.methods.get(index as usize)
    }
}

/// Lookup surface: `interface_by_ordinal`/`method`.
#[derive(Debug, Default)]
pub struct Registry {
    interfaces: HashMap<u8, InterfaceDescriptor>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn interface_by_ordinal(&self, ordinal: u8) -> Option<&InterfaceDescriptor> {
        self.interfaces.get(&ordinal)
    }

    pub fn method(&self, ordinal: u8, method_index: u8) -> Option<&MethodDescriptor> {
        self.interface_by_ordinal(ordinal)?.method(method_index)
    }

    pub fn ordinals(&self) -> impl Iterator<Item = u8> + '_ {
        self.interfaces.keys().copied()
    }
}

/// Builds a `Registry`, rejecting duplicate or out-of-range ordinals at
/// construction time (a fatal configuration error).
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    interfaces: HashMap<u8, InterfaceDescriptor>,
}

impl RegistryBuilder {
    pub fn interface(mut self, descriptor: InterfaceDescriptor) -> Result<Self, Error> {
        if descriptor.ordinal == 0 || descriptor.ordinal > 127 {
            return Err(Error::SchemaViolation(format!(
                "interface ordinal {} is out of range 1..127",
                descriptor.ordinal
            )));
        }
        if self.interfaces.contains_key(&descriptor.ordinal) {
            return Err(Error::DuplicateOrdinal {
                ordinal: descriptor.ordinal,
            });
        }
        self.interfaces.insert(descriptor.ordinal, descriptor);
        Ok(self)
    }

    pub fn build(self) -> Registry {
        Registry {
            interfaces: self.interfaces,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(ordinal: u8) -> InterfaceDescriptor {
        InterfaceDescriptor {
            ordinal,
            name: "Test",
            methods: vec![MethodDescriptor {
                index: 0,
                name: "test",
                parameters: vec![],
                return_shape: ReturnShape::None,
            }],
        }
    }

    #[test]
    fn duplicate_ordinal_is_fatal_at_construction() {
        let err = Registry::builder()
            .interface(descriptor(1))
            .unwrap()
            .interface(descriptor(1))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateOrdinal { ordinal: 1 }));
    }

    #[test]
    fn out_of_range_ordinal_is_rejected() {
        assert!(Registry::builder().interface(descriptor(0)).is_err());
        assert!(Registry::builder().interface(descriptor(128)).is_err());
    }

    #[test]
    fn lookup_resolves_interface_and_method() {
        let registry = Registry::builder().interface(descriptor(2)).unwrap().build();
        assert_eq!(registry.interface_by_ordinal(2).unwrap().ordinal, 2);
        assert_eq!(registry.method(2, 0).unwrap().name, "test");
        assert!(registry.method(2, 1).is_none());
        assert!(registry.interface_by_ordinal(3).is_none());
    }

    #[test]
    fn nullable_hint_distinguishes_option_from_bare_types() {
        assert!(NullableTag::<Option<i32>>(std::marker::PhantomData).rpc_core_nullable_hint());
        assert!(NullableTag::<Option<String>>(std::marker::PhantomData).rpc_core_nullable_hint());
        assert!(!NullableTag::<i32>(std::marker::PhantomData).rpc_core_nullable_hint());
        assert!(!NullableTag::<String>(std::marker::PhantomData).rpc_core_nullable_hint());
        assert!(!NullableTag::<Vec<u8>>(std::marker::PhantomData).rpc_core_nullable_hint());
    }
}
