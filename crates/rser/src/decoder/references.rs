//! Decode-side reference table.

use crate::error::{DecodeError, DecodeErrorKind};
use crate::value::Value;

#[derive(Debug)]
enum Slot {
    /// Declared, body not decoded yet.
    Pending,
    Ready(Value),
}

/// Values declared in one message, indexed by id.
///
/// Ids are dense and arrive in order. Containers are filled in as soon as
/// their empty shell exists, so members can refer back to them.
#[derive(Debug, Default)]
pub(crate) struct ReferenceTable {
    slots: Vec<Slot>,
}

impl ReferenceTable {
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn declare(&mut self, id: u32, offset: usize) -> Result<(), DecodeError> {
        let expected = self.slots.len() as u32;
        if id != expected {
            return Err(DecodeError::new(
                offset,
                DecodeErrorKind::OutOfOrderDeclaration { id, expected },
            ));
        }
        tracing::trace!(id, "declared reference");
        self.slots.push(Slot::Pending);
        Ok(())
    }

    pub(crate) fn fill(&mut self, id: u32, value: &Value) {
        if let Some(slot) = self.slots.get_mut(id as usize) {
            *slot = Slot::Ready(value.clone());
        }
    }

    /// Resolves `id`, failing on unknown or unfinished declarations.
    pub(crate) fn assert(&self, id: u32, offset: usize) -> Result<Value, DecodeError> {
        match self.slots.get(id as usize) {
            Some(Slot::Ready(value)) => Ok(value.clone()),
            Some(Slot::Pending) => Err(DecodeError::new(
                offset,
                DecodeErrorKind::PendingReference(id),
            )),
            None => Err(DecodeError::new(
                offset,
                DecodeErrorKind::UnknownReference(id),
            )),
        }
    }
}
