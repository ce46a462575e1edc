//! The Bind protocol: resolvers fill typed slots.
//!
//! Both request parameters and group dependencies are obtained the same way:
//! the core creates an empty, typed destination (a [`Slot`]) and hands it to a
//! caller-supplied [`Resolve`] implementation, which fills it or fails.
//!
//! - Parameter slots start with the `Default` value of the parameter type and
//!   are *decodable*: a resolver that holds request data can decode it in place
//!   with [`Slot::decode_json`].
//! - Dependency slots start empty. A resolver recognises them with
//!   [`Slot::is`] and fills them with [`Slot::fill`].

use std::any::{Any, TypeId};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;

use crate::error::{BindError, BindResult, BoxError};

/// Decodes a JSON value into the `Option<T>` behind a slot.
type DecodeFn = fn(&mut (dyn Any + 'static), Value) -> BindResult<()>;

/// A typed destination handed to a resolver.
pub struct Slot<'a> {
    target: &'a mut (dyn Any + 'static),
    type_id: TypeId,
    type_name: &'static str,
    decode: Option<DecodeFn>,
}

impl<'a> Slot<'a> {
    /// Creates a slot over `target`.
    pub fn new<T: Any>(target: &'a mut Option<T>) -> Self {
        Self {
            target,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            decode: None,
        }
    }

    /// Creates a slot that can also be filled from request data.
    pub fn decodable<T: DeserializeOwned + Any>(target: &'a mut Option<T>) -> Self {
        Self {
            decode: Some(decode_into::<T>),
            ..Self::new(target)
        }
    }

    /// [`TypeId`] of the value the slot holds.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Name of the value type the slot holds.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the slot holds a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Returns `true` if the slot accepts [`decode_json`](Self::decode_json).
    pub fn is_decodable(&self) -> bool {
        self.decode.is_some()
    }

    /// Mutable access to the current value, if the slot holds a `T` and is
    /// not empty.
    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.target.downcast_mut::<Option<T>>()?.as_mut()
    }

    /// Stores `value` in the slot.
    pub fn fill<T: Any>(&mut self, value: T) -> BindResult<()> {
        match self.target.downcast_mut::<Option<T>>() {
            Some(target) => {
                trace!(type_name = self.type_name, "Slot filled");
                *target = Some(value);
                Ok(())
            }
            None => Err(BindError::TypeMismatch {
                expected: self.type_name,
                got: std::any::type_name::<T>(),
            }),
        }
    }

    /// Decodes `value` into the slot.
    ///
    /// Fails with [`BindError::NotDecodable`] for dependency slots.
    pub fn decode_json(&mut self, value: Value) -> BindResult<()> {
        let decode = self
            .decode
            .ok_or(BindError::NotDecodable(self.type_name))?;
        decode(&mut *self.target, value)
    }
}

impl std::fmt::Debug for Slot<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("type_name", &self.type_name)
            .field("decodable", &self.is_decodable())
            .finish_non_exhaustive()
    }
}

fn decode_into<T: DeserializeOwned + Any>(
    target: &mut (dyn Any + 'static),
    value: Value,
) -> BindResult<()> {
    let type_name = std::any::type_name::<T>();
    let decoded = serde_json::from_value::<T>(value)
        .map_err(|source| BindError::Decode { type_name, source })?;
    let target = target
        .downcast_mut::<Option<T>>()
        .ok_or(BindError::TypeMismatch {
            expected: type_name,
            got: type_name,
        })?;
    *target = Some(decoded);
    Ok(())
}

// =============================================================================
// Resolve
// =============================================================================

/// Fills slots on behalf of handlers and route groups.
///
/// Implemented for every `Fn(&mut Slot<'_>) -> Result<(), BoxError>`, so most
/// resolvers are plain closures. A resolver that leaves a slot untouched and
/// returns `Ok(())` keeps its initial value.
pub trait Resolve {
    /// Fills `slot` or reports why it cannot be filled.
    fn resolve(&self, slot: &mut Slot<'_>) -> Result<(), BoxError>;
}

impl<F> Resolve for F
where
    F: Fn(&mut Slot<'_>) -> Result<(), BoxError>,
{
    fn resolve(&self, slot: &mut Slot<'_>) -> Result<(), BoxError> {
        self(slot)
    }
}

/// Pins a closure to the resolver signature.
///
/// Closures passed straight to a `&dyn Resolve` parameter often fail to infer
/// the higher-ranked slot lifetime; wrapping them in `resolve_fn` fixes that.
pub fn resolve_fn<F>(f: F) -> F
where
    F: Fn(&mut Slot<'_>) -> Result<(), BoxError>,
{
    f
}
