use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::{ThrownValue, Value};

pub(crate) type BoxFuture<'a, T> = std::pin::Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of invoking a function: a value, or what it threw.
pub type CallResult = std::result::Result<Value, ThrownValue>;

type CallFn = dyn Fn(Value, Vec<Value>) -> BoxFuture<'static, CallResult> + Send + Sync;
type ConstructFn = dyn Fn(Vec<Value>) -> BoxFuture<'static, CallResult> + Send + Sync;

/// A callable value in an exposed object graph.
///
/// Functions are async and may be invoked concurrently. A function may be
/// callable, constructible, or both:
///
/// ```
/// use peerlink::{Function, Object, ThrownValue, Value};
///
/// let add = Function::new(|args: Vec<Value>| async move {
///     let a = args.first().and_then(|v| v.as_raw()?.as_i64()).unwrap_or(0);
///     let b = args.get(1).and_then(|v| v.as_raw()?.as_i64()).unwrap_or(0);
///     Ok::<_, ThrownValue>(Value::from(a + b))
/// });
///
/// let point = Function::class(|args: Vec<Value>| async move {
///     let x = args.into_iter().next().unwrap_or_default();
///     Ok::<_, ThrownValue>(Value::from(Object::new().with("x", x)))
/// });
/// # let _ = (add, point);
/// ```
#[derive(Clone)]
pub struct Function {
    inner: Arc<Inner>,
}

struct Inner {
    call: Option<Box<CallFn>>,
    construct: Option<Box<ConstructFn>>,
}

impl Function {
    // ---
    /// A plain function. `this` is ignored.
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        Self::method(move |_this, args| func(args))
    }

    /// A function that receives `this`: the object it was reached through.
    pub fn method<F, Fut>(func: F) -> Self
    where
        F: Fn(Value, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                call: Some(Box::new(
                    move |this: Value, args: Vec<Value>| -> BoxFuture<'static, CallResult> {
                        Box::pin(func(this, args))
                    },
                )),
                construct: None,
            }),
        }
    }

    /// A constructor that cannot be called without `new`.
    pub fn class<F, Fut>(ctor: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                call: None,
                construct: Some(Box::new(
                    move |args: Vec<Value>| -> BoxFuture<'static, CallResult> {
                        Box::pin(ctor(args))
                    },
                )),
            }),
        }
    }

    /// Make this function constructible as well.
    ///
    /// Wraps the existing call behavior in a new function value; clones of
    /// `self` are unaffected.
    pub fn with_constructor<F, Fut>(self, ctor: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallResult> + Send + 'static,
    {
        let callee = self.clone();
        let call: Option<Box<CallFn>> = if self.is_callable() {
            Some(Box::new(move |this: Value, args: Vec<Value>| {
                callee.call(this, args)
            }))
        } else {
            None
        };
        Self {
            inner: Arc::new(Inner {
                call,
                construct: Some(Box::new(
                    move |args: Vec<Value>| -> BoxFuture<'static, CallResult> {
                        Box::pin(ctor(args))
                    },
                )),
            }),
        }
    }

    pub fn is_callable(&self) -> bool {
        self.inner.call.is_some()
    }

    pub fn is_constructible(&self) -> bool {
        self.inner.construct.is_some()
    }

    /// Invoke the function with `this` bound to `this`.
    pub fn call(&self, this: Value, args: Vec<Value>) -> BoxFuture<'static, CallResult> {
        match &self.inner.call {
            Some(call) => call(this, args),
            None => Box::pin(async {
                Err(ThrownValue::type_error(
                    "class constructor cannot be invoked without 'new'",
                ))
            }),
        }
    }

    /// Invoke the function as a constructor.
    pub fn construct(&self, args: Vec<Value>) -> BoxFuture<'static, CallResult> {
        match &self.inner.construct {
            Some(ctor) => ctor(args),
            None => Box::pin(async { Err(ThrownValue::type_error("value is not a constructor")) }),
        }
    }

    /// True when both handles refer to the same function.
    pub fn ptr_eq(&self, other: &Function) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("callable", &self.is_callable())
            .field("constructible", &self.is_constructible())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_method_receives_this() {
        // ---
        let f = Function::method(|this, _args| async move { Ok(this) });
        let out = f.call(Value::from("ctx"), Vec::new()).await.unwrap();
        assert_eq!(out.as_raw(), Some(&json!("ctx")));
    }

    #[tokio::test]
    async fn test_plain_function_is_not_constructor() {
        // ---
        let f = Function::new(|_args| async { Ok(Value::undefined()) });
        let err = f.construct(Vec::new()).await.unwrap_err();
        assert_eq!(err.message(), "value is not a constructor");
    }

    #[tokio::test]
    async fn test_class_requires_new() {
        // ---
        let f = Function::class(|_args| async { Ok(Value::undefined()) });
        assert!(f.call(Value::undefined(), Vec::new()).await.is_err());
        assert!(f.construct(Vec::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_with_constructor_keeps_call() {
        // ---
        let f = Function::new(|_args| async { Ok(Value::from(1)) })
            .with_constructor(|_args| async { Ok(Value::from(2)) });

        let called = f.call(Value::undefined(), Vec::new()).await.unwrap();
        let built = f.construct(Vec::new()).await.unwrap();
        assert_eq!(called.as_raw(), Some(&json!(1)));
        assert_eq!(built.as_raw(), Some(&json!(2)));
    }
}
