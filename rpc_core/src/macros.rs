// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Declarative macros that generate `Encode`/`Decode` impls, wire enums,
//! and interface proxy/dispatch code at the definition site — compile-time
//! code generation in place of a build-time generator or runtime
//! metaprogramming.

/// Generates `Encode`/`Decode` for a struct of named fields, walked in the
/// exact order the fields are listed.
#[macro_export]
macro_rules! define_value_type {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $field_vis:vis $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $field_vis $field : $ty, )*
        }

        impl $crate::codec::Encode for $name {
            fn encode(&self, buf: &mut Vec<u8>) -> Result<(), $crate::error::Error> {
                $( $crate::codec::Encode::encode(&self.$field, buf)?; )*
                Ok(())
            }
        }

        impl $crate::codec::Decode for $name {
            fn decode(input: &mut &[u8]) -> Result<Self, $crate::error::Error> {
                Ok($name {
                    $( $field: $crate::codec::Decode::decode(input)?, )*
                })
            }
        }
    };
}

/// Generates a C-like enum plus `Encode`/`Decode` over a declared
/// primitive repr. An unrecognized discriminant at decode time is a
/// `SchemaViolation` (a value-level problem, the same as a bad `bool` byte
/// or presence tag); a repr that isn't itself `Encode + Decode` (anything
/// but the wire integer types) fails to compile — `InvalidEnumUnderlyingType`
/// names that compile-time condition and is never raised from here.
#[macro_export]
macro_rules! define_wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $repr:ty {
            $( $variant:ident = $value:expr ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr($repr)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $name {
            $( $variant = $value, )*
        }

        impl $crate::codec::Encode for $name {
            fn encode(&self, buf: &mut Vec<u8>) -> Result<(), $crate::error::Error> {
                $crate::codec::Encode::encode(&(*self as $repr), buf)
            }
        }

        impl $crate::codec::Decode for $name {
            fn decode(input: &mut &[u8]) -> Result<Self, $crate::error::Error> {
                let raw = <$repr as $crate::codec::Decode>::decode(input)?;
                match raw {
                    $( x if x == $value => Ok($name::$variant), )*
                    other => Err($crate::error::Error::SchemaViolation(format!(
                        "{:?} is not a declared discriminant of {}",
                        other,
                        stringify!($name)
                    ))),
                }
            }
        }
    };
}

/// Generates a method-index table, an `InterfaceDescriptor` builder, a
/// `Handler<C>` trait for the application to implement, a zero-sized
/// `Proxy` whose inherent methods marshal calls through an `Endpoint<C>`,
/// and a `register` function wiring a dispatch closure into the endpoint's
/// handler table. One invocation = one interface ordinal.
#[macro_export]
macro_rules! define_interface {
    (
        $vis:vis mod $module:ident {
            ordinal = $ordinal:expr;
            name = $iface_name:literal;
            methods {
                $(
                    $index:literal => fn $method:ident (
                        $( $arg:ident : $arg_ty:ty ),* $(,)?
                    ) -> $ret:ty ;
                )*
            }
        }
    ) => {
        $vis mod $module {
            #![allow(unused_imports)]
            use super::*;
            use $crate::codec::{Decode, Encode};
            use $crate::endpoint::{Endpoint, ErasedReturn, HandlerCallContext};
            use $crate::error::Error;
            use $crate::future::RpcReturn;
            use $crate::registry::{
                InterfaceDescriptor, MethodDescriptor, NullableDefault, NullableTag,
                NullableViaOption, ParameterDescriptor,
            };

            pub const ORDINAL: u8 = $ordinal;

            #[allow(non_upper_case_globals, dead_code)]
            pub mod method {
                $( pub const $method: u8 = $index; )*
            }

            /// Builds this interface's registry entry. Call once per
            /// `Endpoint` during setup, before any traffic is exchanged.
            pub fn descriptor() -> InterfaceDescriptor {
                InterfaceDescriptor {
                    ordinal: ORDINAL,
                    name: $iface_name,
                    methods: vec![
                        $(
                            MethodDescriptor {
                                index: $index,
                                name: stringify!($method),
                                parameters: vec![
                                    // Diagnostic metadata only; the codec derives
                                    // nullability from the type itself, not this flag.
                                    $( ParameterDescriptor {
                                        name: stringify!($arg),
                                        type_name: stringify!($arg_ty),
                                        nullable: NullableTag::<$arg_ty>(::std::marker::PhantomData)
                                            .rpc_core_nullable_hint(),
                                    }, )*
                                ],
                                return_shape: <$ret as RpcReturn>::return_shape(),
                            },
                        )*
                    ],
                }
            }

            /// Implemented by the application on the handler side. `C` is
            /// the opaque per-peer session type threaded through dispatch.
            pub trait Handler<C> {
                $(
                    fn $method(&mut self, context: &mut C, $( $arg: $arg_ty ),*) -> $ret;
                )*
            }

            /// Stub for calling this interface's methods against an
            /// `Endpoint<C>`. Zero-sized: nothing about a call is cached
            /// between invocations.
            pub struct Proxy;

            impl Proxy {
                $(
                    pub fn $method<C>(
                        endpoint: &mut Endpoint<C>,
                        $( $arg: $arg_ty ),*
                    ) -> Result<$ret, Error> {
                        let mut call = endpoint.begin_call::<$ret>(ORDINAL, $index)?;
                        $( call.push_arg(&$arg)?; )*
                        Ok(endpoint.complete_call(call))
                    }
                )*
            }

            /// Binds `handler` to this interface's ordinal on `endpoint`.
            pub fn register<C, H>(endpoint: &mut Endpoint<C>, handler: H) -> Result<(), Error>
            where
                H: Handler<C> + 'static,
                C: 'static,
            {
                let handler = ::std::rc::Rc::new(::std::cell::RefCell::new(handler));
                endpoint.register_handler(
                    ORDINAL,
                    Box::new(move |ctx: &mut HandlerCallContext<'_, C>, reader: &mut &[u8]| {
                        match ctx.method_index {
                            $(
                                $index => {
                                    $( let $arg: $arg_ty = Decode::decode(reader)?; )*
                                    let result = handler.borrow_mut().$method(ctx.context, $( $arg ),*);
                                    Ok(Box::new(result) as Box<dyn ErasedReturn>)
                                }
                            )*
                            other => Err(Error::ProtocolViolation(format!(
                                "unknown method index {other} on interface {}",
                                ORDINAL
                            ))),
                        }
                    }),
                )
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::codec::{Decode, Encode};
    use crate::error::Error;

    define_value_type! {
        #[derive(Debug, Clone, PartialEq)]
        pub struct Coordinate {
            pub x: i32,
            pub y: i32,
            pub label: Option<String>,
        }
    }

    define_value_type! {
        #[derive(Debug, Clone, PartialEq)]
        pub struct Waypoint {
            pub at: Coordinate,
            pub altitude_m: f32,
        }
    }

    define_wire_enum! {
        pub enum Severity: u8 {
            Info = 0,
            Warning = 1,
            Critical = 2,
        }
    }

    crate::define_interface! {
        pub mod waypoints {
            ordinal = 5;
            name = "Waypoints";
            methods {
                0 => fn tag(at: Coordinate, label: Option<String>) -> ();
            }
        }
    }

    #[test]
    fn descriptor_derives_nullable_from_option_typed_parameters() {
        let descriptor = waypoints::descriptor();
        let params = &descriptor.method(0).unwrap().parameters;
        assert!(!params[0].nullable, "Coordinate is not Option-typed");
        assert!(params[1].nullable, "Option<String> is nullable");
    }

    fn roundtrip<T: Encode + Decode + PartialEq + std::fmt::Debug>(value: T) {
        let mut buf = Vec::new();
        value.encode(&mut buf).unwrap();
        let mut input = buf.as_slice();
        let decoded = T::decode(&mut input).unwrap();
        assert!(input.is_empty());
        assert_eq!(value, decoded);
    }

    #[test]
    fn value_type_fields_serialize_in_declaration_order() {
        let value = Coordinate {
            x: -7,
            y: 42,
            label: Some("summit".into()),
        };
        let mut buf = Vec::new();
        value.encode(&mut buf).unwrap();
        // x (4 bytes LE), then y (4 bytes LE), then the nullable label.
        assert_eq!(&buf[0..4], &(-7i32).to_le_bytes());
        assert_eq!(&buf[4..8], &42i32.to_le_bytes());
        assert_eq!(buf[8], 1, "presence tag for Some(label)");
        roundtrip(value);
        roundtrip(Coordinate {
            x: 0,
            y: 0,
            label: None,
        });
    }

    #[test]
    fn value_type_can_nest_another_value_type() {
        roundtrip(Waypoint {
            at: Coordinate {
                x: 1,
                y: 2,
                label: None,
            },
            altitude_m: 1200.5,
        });
    }

    #[test]
    fn wire_enum_roundtrips_its_declared_repr() {
        let mut buf = Vec::new();
        Severity::Warning.encode(&mut buf).unwrap();
        assert_eq!(buf, vec![1u8]);
        let mut input = buf.as_slice();
        assert_eq!(Severity::decode(&mut input).unwrap(), Severity::Warning);
    }

    #[test]
    fn wire_enum_rejects_unknown_discriminant() {
        let mut input: &[u8] = &[99u8];
        let err = Severity::decode(&mut input).unwrap_err();
        assert!(matches!(err, Error::SchemaViolation(_)));
    }
}
