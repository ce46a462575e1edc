//! Resolvers: request data for handler parameters, services for groups.

use std::sync::Arc;

use serde_json::{Map, Value};
use trellis::runtime::PathParams;
use trellis::{BindError, BoxError, Resolve, Slot, resolve_fn};

use crate::service::UserService;

/// Decodes handler parameters from a JSON body merged with path parameters.
///
/// Path parameters win over body fields of the same name. A parameter that
/// parses as a JSON number is inserted as a number, anything else as a string.
pub struct RequestResolver<'a> {
    body: &'a Value,
    params: &'a PathParams,
}

impl<'a> RequestResolver<'a> {
    pub fn new(body: &'a Value, params: &'a PathParams) -> Self {
        Self { body, params }
    }

    fn merged(&self) -> Result<Map<String, Value>, BindError> {
        let mut fields = match self.body {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                return Err(BindError::custom(format!(
                    "request body must be a JSON object, got {other}"
                )));
            }
        };

        for (name, raw) in self.params.iter() {
            fields.insert(name.to_string(), path_value(raw));
        }
        Ok(fields)
    }
}

fn path_value(raw: &str) -> Value {
    serde_json::from_str::<Value>(raw)
        .ok()
        .filter(Value::is_number)
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

impl Resolve for RequestResolver<'_> {
    fn resolve(&self, slot: &mut Slot<'_>) -> Result<(), BoxError> {
        if !slot.is_decodable() {
            return Err(BindError::custom(format!(
                "request data cannot provide '{}'",
                slot.type_name()
            ))
            .into());
        }

        let fields = self.merged()?;
        // Nothing sent: the parameter keeps its default value.
        if fields.is_empty() {
            return Ok(());
        }
        slot.decode_json(Value::Object(fields))?;
        Ok(())
    }
}

/// Fills `Arc<dyn UserService>` dependency slots with `service`.
pub fn dependencies(service: Arc<dyn UserService>) -> impl Resolve {
    resolve_fn(move |slot| {
        if slot.is::<Arc<dyn UserService>>() {
            slot.fill(Arc::clone(&service))?;
        }
        Ok(())
    })
}
