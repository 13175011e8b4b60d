//! Path resolution against an exposed object graph.
//!
//! The callee interprets an arbitrary `path` at runtime. [`PathResolver`]
//! is the capability doing that; [`GraphResolver`] is the implementation
//! used unless a peer is built with another one.

use crate::{Object, ProxyError, Result, Value};

/// Outcome of walking a path.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// The value at the end of the path.
    pub value: Value,

    /// The value the last segment was read from; `undefined` for the root.
    ///
    /// This is what `this` is bound to when the value is applied.
    pub parent: Value,

    /// The last path segment, if any.
    pub key: Option<String>,
}

/// Walks and writes paths on a local value graph.
pub trait PathResolver: Send + Sync {
    /// Resolve `path` starting from `root`.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::PathResolution`] if any segment is missing.
    fn resolve(&self, root: &Value, path: &[String]) -> Result<Resolved>;

    /// Store `value` at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::PathResolution`] if the parent does not exist
    /// or cannot hold the value.
    fn assign(&self, root: &Value, path: &[String], value: Value) -> Result<()>;
}

/// Resolver over [`Object`]s and the structured data they hold.
///
/// - objects are indexed by property name
/// - structured objects by key, arrays by decimal index
/// - error values expose `name`, `message` and `stack`
///
/// Writes go to the nearest enclosing [`Object`]; structured data below it
/// is updated in place. A structured root cannot be written to.
#[derive(Debug, Default, Clone, Copy)]
pub struct GraphResolver;

impl PathResolver for GraphResolver {
    // ---
    fn resolve(&self, root: &Value, path: &[String]) -> Result<Resolved> {
        // ---
        let mut parent = Value::undefined();
        let mut current = root.clone();

        for (i, segment) in path.iter().enumerate() {
            let next = child(&current, segment).ok_or_else(|| {
                ProxyError::path(
                    &path[..=i],
                    format!("property \"{segment}\" not found on {}", current.kind()),
                )
            })?;
            parent = std::mem::replace(&mut current, next);
        }

        Ok(Resolved {
            value: current,
            parent,
            key: path.last().cloned(),
        })
    }

    fn assign(&self, root: &Value, path: &[String], value: Value) -> Result<()> {
        // ---
        let Some((key, parent_path)) = path.split_last() else {
            return Err(ProxyError::path(path, "cannot assign to the root"));
        };

        // Track the deepest object on the way down; everything past it is
        // structured data owned by one of its properties.
        let mut owner: Option<(Object, usize)> = None;
        let mut current = root.clone();

        for (i, segment) in parent_path.iter().enumerate() {
            if let Value::Object(object) = &current {
                owner = Some((object.clone(), i));
            }
            current = child(&current, segment).ok_or_else(|| {
                ProxyError::path(&path[..=i], format!("property \"{segment}\" not found"))
            })?;
        }

        match current {
            Value::Object(object) => {
                object.set(key.clone(), value);
                Ok(())
            }
            Value::Raw(serde_json::Value::Object(_)) | Value::Raw(serde_json::Value::Array(_)) => {
                let Value::Raw(data) = value else {
                    return Err(ProxyError::path(
                        path,
                        format!("cannot store a {} inside structured data", value.kind()),
                    ));
                };
                let (object, start) = owner
                    .ok_or_else(|| ProxyError::path(path, "structured root is read-only"))?;
                assign_within(&object, path, start, data)
            }
            other => Err(ProxyError::path(
                path,
                format!("cannot set property \"{key}\" on {}", other.kind()),
            )),
        }
    }
}

/// Read one property off `parent`.
fn child(parent: &Value, key: &str) -> Option<Value> {
    // ---
    match parent {
        Value::Object(object) => object.get(key),
        Value::Raw(serde_json::Value::Object(map)) => map.get(key).cloned().map(Value::Raw),
        Value::Raw(serde_json::Value::Array(items)) => {
            let index: usize = key.parse().ok()?;
            items.get(index).cloned().map(Value::Raw)
        }
        Value::Error(err) => match key {
            "name" => Some(Value::from(err.name.as_str())),
            "message" => Some(Value::from(err.message.as_str())),
            "stack" => err.stack.as_deref().map(Value::from),
            _ => None,
        },
        _ => None,
    }
}

/// Write `data` at `path`, where `path[start]` is the property of `object`
/// holding the structured data and later segments index into it.
fn assign_within(
    object: &Object,
    path: &[String],
    start: usize,
    data: serde_json::Value,
) -> Result<()> {
    // ---
    object.with_props(|props| {
        let slot = props
            .get_mut(&path[start])
            .ok_or_else(|| ProxyError::path(&path[..=start], "property disappeared"))?;

        let Value::Raw(data_root) = slot else {
            return Err(ProxyError::path(&path[..=start], "property is no longer structured data"));
        };
        let mut target: &mut serde_json::Value = data_root;

        let (key, inner) = path[start + 1..]
            .split_last()
            .ok_or_else(|| ProxyError::path(path, "empty structured path"))?;

        for (offset, segment) in inner.iter().enumerate() {
            target = raw_child_mut(target, segment).ok_or_else(|| {
                ProxyError::path(&path[..=start + 1 + offset], format!("property \"{segment}\" not found"))
            })?;
        }

        raw_set(target, key, data).map_err(|reason| ProxyError::path(path, reason))
    })
}

fn raw_child_mut<'a>(
    value: &'a mut serde_json::Value,
    key: &str,
) -> Option<&'a mut serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map.get_mut(key),
        serde_json::Value::Array(items) => items.get_mut(key.parse::<usize>().ok()?),
        _ => None,
    }
}

fn raw_set(
    target: &mut serde_json::Value,
    key: &str,
    data: serde_json::Value,
) -> std::result::Result<(), String> {
    // ---
    match target {
        serde_json::Value::Object(map) => {
            map.insert(key.to_string(), data);
            Ok(())
        }
        serde_json::Value::Array(items) => {
            let index: usize = key
                .parse()
                .map_err(|_| format!("\"{key}\" is not an array index"))?;
            match index.cmp(&items.len()) {
                std::cmp::Ordering::Less => items[index] = data,
                std::cmp::Ordering::Equal => items.push(data),
                std::cmp::Ordering::Greater => {
                    return Err(format!("index {index} is past the end of the array"))
                }
            }
            Ok(())
        }
        other => Err(format!("cannot set property \"{key}\" on {other}")),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{ErrorValue, Function};
    use serde_json::json;

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    fn root() -> Value {
        Value::from(
            Object::new()
                .with("user", json!({"name": "Ada", "tags": ["a", "b"]}))
                .with("nested", Object::new().with("count", 1))
                .with("greet", Function::new(|_args| async { Ok(Value::from("hi")) })),
        )
    }

    #[test]
    fn test_empty_path_is_root() {
        // ---
        let root = root();
        let resolved = GraphResolver.resolve(&root, &[]).unwrap();
        assert!(matches!(resolved.value, Value::Object(_)));
        assert!(resolved.parent.is_undefined());
        assert!(resolved.key.is_none());
    }

    #[test]
    fn test_resolves_into_structured_data() {
        // ---
        let root = root();
        let name = GraphResolver.resolve(&root, &path(&["user", "name"])).unwrap();
        assert_eq!(name.value.as_raw(), Some(&json!("Ada")));
        assert_eq!(name.key.as_deref(), Some("name"));

        let tag = GraphResolver.resolve(&root, &path(&["user", "tags", "1"])).unwrap();
        assert_eq!(tag.value.as_raw(), Some(&json!("b")));
    }

    #[test]
    fn test_parent_of_method_is_holder() {
        // ---
        let root = root();
        let resolved = GraphResolver.resolve(&root, &path(&["greet"])).unwrap();
        assert!(matches!(resolved.value, Value::Function(_)));
        assert!(matches!(resolved.parent, Value::Object(_)));
    }

    #[test]
    fn test_missing_segment_reports_prefix() {
        // ---
        let root = root();
        let err = GraphResolver
            .resolve(&root, &path(&["user", "email", "domain"]))
            .unwrap_err();
        match err {
            ProxyError::PathResolution { path, .. } => {
                assert_eq!(path, vec!["user".to_string(), "email".to_string()])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_error_fields_are_readable() {
        // ---
        let root = Value::from(Object::new().with("last", ErrorValue::new("boom")));
        let msg = GraphResolver.resolve(&root, &path(&["last", "message"])).unwrap();
        assert_eq!(msg.value.as_raw(), Some(&json!("boom")));
    }

    #[test]
    fn test_assign_on_object() {
        // ---
        let root = root();
        GraphResolver
            .assign(&root, &path(&["nested", "count"]), Value::from(5))
            .unwrap();
        let count = GraphResolver.resolve(&root, &path(&["nested", "count"])).unwrap();
        assert_eq!(count.value.as_raw(), Some(&json!(5)));
    }

    #[test]
    fn test_assign_inside_structured_data() {
        // ---
        let root = root();
        GraphResolver
            .assign(&root, &path(&["user", "name"]), Value::from("Grace"))
            .unwrap();
        GraphResolver
            .assign(&root, &path(&["user", "tags", "2"]), Value::from("c"))
            .unwrap();

        let user = GraphResolver.resolve(&root, &path(&["user"])).unwrap();
        assert_eq!(
            user.value.as_raw(),
            Some(&json!({"name": "Grace", "tags": ["a", "b", "c"]}))
        );
    }

    #[test]
    fn test_assign_rejects_function_in_structured_data() {
        // ---
        let root = root();
        let f = Function::new(|_args| async { Ok(Value::undefined()) });
        let err = GraphResolver
            .assign(&root, &path(&["user", "cb"]), Value::from(f))
            .unwrap_err();
        assert!(matches!(err, ProxyError::PathResolution { .. }));
    }

    #[test]
    fn test_assign_root_fails() {
        // ---
        let err = GraphResolver.assign(&root(), &[], Value::from(1)).unwrap_err();
        assert!(matches!(err, ProxyError::PathResolution { .. }));

        let structured = Value::from(json!({"a": 1}));
        let err = GraphResolver
            .assign(&structured, &path(&["a"]), Value::from(2))
            .unwrap_err();
        assert!(matches!(err, ProxyError::PathResolution { .. }));
    }
}
