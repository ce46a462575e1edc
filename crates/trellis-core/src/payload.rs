//! Type-erased values produced and described by handlers.

use std::any::Any;

use serde::Serialize;
use serde_json::Value;

/// A value whose concrete type has been erased but which can still be
/// serialized, named and downcast.
///
/// Implemented for every `Serialize + Send + Sync + 'static` type. Handlers
/// return their responses as `Box<dyn Payload>` and describe their declared
/// parameter and response types with zero values of the same shape.
pub trait Payload: Any + Send + Sync {
    /// Name of the concrete type.
    fn type_name(&self) -> &'static str;

    /// Serializes the value into a JSON tree.
    fn to_json(&self) -> serde_json::Result<Value>;

    /// Borrows the value as [`Any`].
    fn as_any(&self) -> &dyn Any;

    /// Converts the boxed value into a boxed [`Any`].
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
}

impl<T> Payload for T
where
    T: Serialize + Any + Send + Sync,
{
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }
}

impl dyn Payload {
    /// Returns `true` if the erased value is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Borrows the erased value as a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Recovers the owned value, or hands the box back on a type mismatch.
    pub fn downcast<T: Any>(self: Box<Self>) -> Result<Box<T>, Box<dyn Any + Send + Sync>> {
        self.into_any().downcast::<T>()
    }
}

impl std::fmt::Debug for dyn Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Payload").field(&self.type_name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize)]
    struct User {
        name: String,
        age: u32,
    }

    #[test]
    fn test_erased_value_round_trip() {
        let payload: Box<dyn Payload> = Box::new(User {
            name: "alice".into(),
            age: 30,
        });

        assert!(payload.is::<User>());
        assert!(payload.type_name().ends_with("User"));
        assert_eq!(
            payload.to_json().unwrap(),
            serde_json::json!({"name": "alice", "age": 30})
        );

        let user = payload.downcast::<User>().unwrap();
        assert_eq!(user.age, 30);
    }

    #[test]
    fn test_downcast_mismatch_returns_box() {
        let payload: Box<dyn Payload> = Box::new(5u8);
        assert!(payload.downcast_ref::<u16>().is_none());
        assert!(payload.downcast::<String>().is_err());
    }
}
