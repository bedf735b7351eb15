//! Reference discovery.
//!
//! Before any byte is emitted the whole value graph is walked once. Every
//! referenceable identity moves from unseen to [`Sighting::SeenOnce`] on its
//! first visit and to [`Sighting::Referenced`] on its second. Only
//! referenced identities pay for a declaration on the wire.

use std::collections::HashMap;

use crate::error_value::ErrorValue;
use crate::path::Path;
use crate::value::{rc_identity, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sighting {
    SeenOnce,
    Referenced,
}

/// Sighting state of every referenceable identity in one value graph.
#[derive(Debug, Default)]
pub struct ReferencePlan {
    sightings: HashMap<usize, Sighting>,
}

impl ReferencePlan {
    /// Walks `root` and records how often each identity is reachable.
    pub fn discover(root: &Value) -> Self {
        let mut plan = Self::default();
        plan.visit_value(root);
        plan
    }

    pub fn sighting(&self, identity: usize) -> Option<Sighting> {
        self.sightings.get(&identity).copied()
    }

    pub fn is_referenced(&self, identity: usize) -> bool {
        self.sighting(identity) == Some(Sighting::Referenced)
    }

    /// Number of identities that will be declared on the wire.
    pub fn referenced_count(&self) -> usize {
        self.sightings
            .values()
            .filter(|s| **s == Sighting::Referenced)
            .count()
    }

    /// Records a sighting. Returns `true` on the first one, when the
    /// children still need visiting.
    fn see(&mut self, identity: usize) -> bool {
        match self.sightings.get_mut(&identity) {
            None => {
                self.sightings.insert(identity, Sighting::SeenOnce);
                true
            }
            Some(sighting) => {
                *sighting = Sighting::Referenced;
                false
            }
        }
    }

    fn visit_path(&mut self, path: &Path) {
        self.see(path.identity());
    }

    fn visit_error(&mut self, error: &ErrorValue) {
        for frame in &error.frames {
            if let Some(path) = &frame.path {
                self.visit_path(path);
            }
        }
    }

    /// Worklist walk, so nesting depth costs heap rather than stack.
    fn visit_value(&mut self, root: &Value) {
        let mut pending = vec![root.clone()];
        while let Some(value) = pending.pop() {
            match &value {
                Value::SourceLocation(location) => {
                    self.visit_path(&location.path);
                    continue;
                }
                Value::Path(path) => {
                    self.visit_path(path);
                    continue;
                }
                _ => {}
            }
            let Some(identity) = value.identity() else {
                continue;
            };
            if !self.see(identity) {
                continue;
            }
            match &value {
                Value::Array(items) | Value::Set(items) => {
                    pending.extend(items.borrow().iter().cloned());
                }
                Value::Map(entries) => {
                    for (key, value) in entries.borrow().iter() {
                        pending.push(key.clone());
                        pending.push(value.clone());
                    }
                }
                Value::Object(entries) => {
                    pending.extend(entries.borrow().iter().map(|(_, v)| v.clone()));
                }
                Value::ArrayBufferView(view) => {
                    self.see(rc_identity(&view.buffer));
                }
                Value::Error(error) => self.visit_error(error),
                Value::PathSet(set) => {
                    for path in set.iter() {
                        self.visit_path(path);
                    }
                }
                Value::PathMap(map) => {
                    for (path, value) in map.borrow().iter() {
                        self.visit_path(path);
                        pending.push(value.clone());
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_sighting_marks_referenced() {
        let shared = Value::object([("a", Value::from(1))]);
        let root = Value::array([shared.clone(), shared.clone(), Value::array([])]);
        let plan = ReferencePlan::discover(&root);
        assert!(plan.is_referenced(shared.identity().unwrap()));
        assert_eq!(
            plan.sighting(root.identity().unwrap()),
            Some(Sighting::SeenOnce)
        );
        assert_eq!(plan.referenced_count(), 1);
    }

    #[test]
    fn cycles_terminate() {
        let root = Value::array([]);
        if let Value::Array(items) = &root {
            items.borrow_mut().push(root.clone());
        }
        let plan = ReferencePlan::discover(&root);
        assert!(plan.is_referenced(root.identity().unwrap()));
    }

    #[test]
    fn view_buffer_shares_identity_with_buffer_value() {
        use crate::codes::TypedArrayKind;
        use crate::value::ArrayBufferView;
        use std::rc::Rc;

        let buffer = Value::array_buffer(vec![1, 2, 3, 4]);
        let Value::ArrayBuffer(bytes) = &buffer else {
            unreachable!()
        };
        let view = Value::ArrayBufferView(Rc::new(ArrayBufferView::new(
            TypedArrayKind::Uint8,
            bytes.clone(),
            0,
            4,
        )));
        let plan = ReferencePlan::discover(&Value::array([buffer.clone(), view]));
        assert!(plan.is_referenced(buffer.identity().unwrap()));
    }

    #[test]
    fn paths_inside_source_locations_are_tracked() {
        use crate::units::{OneIndexed, Position, SourceLocation, ZeroIndexed};

        let path = Path::absolute_unix(["src", "main.rs"]);
        let position = Position::new(OneIndexed::MIN, ZeroIndexed::new(0));
        let location = Value::SourceLocation(SourceLocation {
            path: path.clone(),
            identifier_name: None,
            start: position,
            end: position,
        });
        let plan = ReferencePlan::discover(&Value::array([location, Value::Path(path.clone())]));
        assert!(plan.is_referenced(path.identity()));
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let mut value = Value::array([]);
        for _ in 0..100_000 {
            value = Value::array([value]);
        }
        let plan = ReferencePlan::discover(&value);
        assert_eq!(plan.referenced_count(), 0);

        // Unwind by hand; dropping the chain whole would recurse.
        loop {
            let inner = match &value {
                Value::Array(items) => items.borrow_mut().pop(),
                _ => None,
            };
            match inner {
                Some(inner) => value = inner,
                None => break,
            }
        }
    }
}
