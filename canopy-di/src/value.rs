//! Values flowing into constructors, properties and dynamically invoked methods.

use crate::error::{ErrorPtr, InvocationError};
use crate::instance::BeanInstance;
use std::any::Any;
use std::sync::Arc;

/// A resolved value - either a literal or a bean instance.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bean(BeanInstance),
    List(Vec<Value>),
}

fn unexpected(expected: &str, actual: &Value) -> ErrorPtr {
    Arc::new(InvocationError::UnexpectedValue {
        expected: expected.to_string(),
        actual: actual.kind().to_string(),
    })
}

impl Value {
    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bean(_) => "bean",
            Value::List(_) => "list",
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn into_bool(self) -> Result<bool, ErrorPtr> {
        match self {
            Value::Bool(value) => Ok(value),
            Value::Text(ref text) => text.parse().map_err(|_| unexpected("bool", &self)),
            other => Err(unexpected("bool", &other)),
        }
    }

    pub fn into_int(self) -> Result<i64, ErrorPtr> {
        match self {
            Value::Int(value) => Ok(value),
            Value::Text(ref text) => text.trim().parse().map_err(|_| unexpected("int", &self)),
            other => Err(unexpected("int", &other)),
        }
    }

    pub fn into_float(self) -> Result<f64, ErrorPtr> {
        match self {
            Value::Float(value) => Ok(value),
            Value::Int(value) => Ok(value as f64),
            Value::Text(ref text) => text.trim().parse().map_err(|_| unexpected("float", &self)),
            other => Err(unexpected("float", &other)),
        }
    }

    pub fn into_text(self) -> Result<String, ErrorPtr> {
        match self {
            Value::Text(value) => Ok(value),
            Value::Bool(value) => Ok(value.to_string()),
            Value::Int(value) => Ok(value.to_string()),
            Value::Float(value) => Ok(value.to_string()),
            other => Err(unexpected("text", &other)),
        }
    }

    pub fn into_instance(self) -> Result<BeanInstance, ErrorPtr> {
        match self {
            Value::Bean(instance) => Ok(instance),
            other => Err(unexpected("bean", &other)),
        }
    }

    /// Returns the concrete bean behind this value.
    pub fn into_bean<T: Any + Send + Sync>(self) -> Result<Arc<T>, ErrorPtr> {
        let instance = self.into_instance()?;
        instance.downcast::<T>().ok_or_else(|| {
            Arc::new(InvocationError::UnexpectedValue {
                expected: std::any::type_name::<T>().to_string(),
                actual: instance.bean_type().name().to_string(),
            }) as ErrorPtr
        })
    }

    /// Returns a typed view of the bean behind this value, e.g. `Arc<dyn Trait>`.
    pub fn into_view<T: ?Sized + 'static>(self) -> Result<Arc<T>, ErrorPtr> {
        let instance = self.into_instance()?;
        instance.cast::<T>().ok_or_else(|| {
            Arc::new(InvocationError::UnexpectedValue {
                expected: std::any::type_name::<T>().to_string(),
                actual: instance.bean_type().name().to_string(),
            }) as ErrorPtr
        })
    }

    pub fn into_list(self) -> Result<Vec<Value>, ErrorPtr> {
        match self {
            Value::List(values) => Ok(values),
            Value::Null => Ok(Vec::new()),
            other => Err(unexpected("list", &other)),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<BeanInstance> for Value {
    fn from(value: BeanInstance) -> Self {
        Value::Bean(value)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Value::List(values.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::value::Value;

    #[test]
    fn should_convert_literals() {
        assert!(Value::from(true).into_bool().unwrap());
        assert_eq!(Value::from("42").into_int().unwrap(), 42);
        assert_eq!(Value::Int(2).into_float().unwrap(), 2.0);
        assert_eq!(Value::Int(7).into_text().unwrap(), "7");
        assert!(Value::Null.into_list().unwrap().is_empty());
    }

    #[test]
    fn should_reject_incompatible_values() {
        assert!(Value::from("x").into_int().is_err());
        assert!(Value::Int(1).into_instance().is_err());
        assert!(Value::List(vec![]).into_text().is_err());
    }
}
