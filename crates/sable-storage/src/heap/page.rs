//! Heap page implementation using a fixed-slot format.
//!
//! Page layout:
//! ```text
//! +----------------------+
//! | Occupancy bitmap     |  ceil(slots / 8) bytes, slot i at byte i/8 bit i%8
//! +----------------------+
//! | Slot 0               |  schema.size() bytes each
//! | Slot 1               |
//! | ...                  |
//! +----------------------+
//! | Zero padding         |  up to page_size
//! +----------------------+
//! ```
//!
//! The slot count is the largest `n` with `n * (tuple_size * 8 + 1) <= page_size * 8`,
//! i.e. every slot costs its tuple bytes plus one header bit.

use crate::tuple::{SlotId, Tuple, TupleId};
use sable_common::{PageId, Result, SableError, Schema};
use std::sync::Arc;

/// Number of tuples of `tuple_size` bytes that fit on a page.
pub fn slots_per_page(page_size: usize, tuple_size: usize) -> usize {
    if tuple_size == 0 {
        return 0;
    }
    let slots = (page_size * 8) / (tuple_size * 8 + 1);
    slots.min(u16::MAX as usize)
}

/// Size of the occupancy bitmap for `num_slots` slots.
pub fn header_size(num_slots: usize) -> usize {
    num_slots.div_ceil(8)
}

/// In-memory form of one heap page.
///
/// The bitmap and the slot array always agree: a slot holds a tuple exactly
/// when its bit is set.
#[derive(Debug, Clone)]
pub struct HeapPage {
    page_id: PageId,
    schema: Arc<Schema>,
    page_size: usize,
    header: Vec<u8>,
    slots: Vec<Option<Tuple>>,
}

impl HeapPage {
    /// Creates a page with every slot free.
    pub fn empty(page_id: PageId, schema: Arc<Schema>, page_size: usize) -> Self {
        let num_slots = slots_per_page(page_size, schema.size());
        Self {
            page_id,
            schema,
            page_size,
            header: vec![0u8; header_size(num_slots)],
            slots: vec![None; num_slots],
        }
    }

    /// Parses a page from its on-disk bytes. The page size is `data.len()`.
    pub fn from_bytes(page_id: PageId, schema: Arc<Schema>, data: &[u8]) -> Result<Self> {
        let page_size = data.len();
        let tuple_size = schema.size();
        let num_slots = slots_per_page(page_size, tuple_size);
        let header_len = header_size(num_slots);

        let header = data[..header_len].to_vec();
        let mut slots = Vec::with_capacity(num_slots);

        for i in 0..num_slots {
            if header[i / 8] & (1 << (i % 8)) == 0 {
                slots.push(None);
                continue;
            }
            let start = header_len + i * tuple_size;
            let mut slot_bytes = &data[start..start + tuple_size];
            let mut tuple = Tuple::parse(Arc::clone(&schema), &mut slot_bytes)?;
            tuple.set_tuple_id(Some(TupleId::new(page_id, SlotId(i as u16))));
            slots.push(Some(tuple));
        }

        Ok(Self {
            page_id,
            schema,
            page_size,
            header,
            slots,
        })
    }

    /// Serializes to exactly `page_size` bytes. Free slots are zeroed.
    pub fn to_bytes(&self) -> Vec<u8> {
        let tuple_size = self.schema.size();
        let mut buf = Vec::with_capacity(self.page_size);
        buf.extend_from_slice(&self.header);

        for slot in &self.slots {
            match slot {
                Some(tuple) => tuple.serialize(&mut buf),
                None => buf.resize(buf.len() + tuple_size, 0),
            }
        }

        buf.resize(self.page_size, 0);
        buf
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn num_empty_slots(&self) -> usize {
        (0..self.slots.len())
            .filter(|&i| !self.is_slot_used(i))
            .count()
    }

    /// Returns true if slot `i` holds a tuple. Out-of-range slots are unused.
    pub fn is_slot_used(&self, i: usize) -> bool {
        i < self.slots.len() && self.header[i / 8] & (1 << (i % 8)) != 0
    }

    fn mark_slot(&mut self, i: usize, used: bool) {
        if used {
            self.header[i / 8] |= 1 << (i % 8);
        } else {
            self.header[i / 8] &= !(1 << (i % 8));
        }
    }

    /// Places `tuple` in the first free slot and records its new location.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<SlotId> {
        if **tuple.schema() != *self.schema {
            return Err(SableError::SchemaMismatch {
                expected: self.schema.to_string(),
                actual: tuple.schema().to_string(),
            });
        }

        let slot = (0..self.slots.len())
            .find(|&i| !self.is_slot_used(i))
            .ok_or(SableError::PageFull)?;

        let slot_id = SlotId(slot as u16);
        tuple.set_tuple_id(Some(TupleId::new(self.page_id, slot_id)));
        self.mark_slot(slot, true);
        self.slots[slot] = Some(tuple.clone());
        Ok(slot_id)
    }

    /// Frees the slot named by the tuple's id.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<()> {
        let tuple_id = tuple.tuple_id().ok_or(SableError::MissingTupleId)?;
        if tuple_id.page_id != self.page_id {
            return Err(SableError::WrongPage {
                expected: self.page_id.to_string(),
                actual: tuple_id.page_id.to_string(),
            });
        }

        let slot = tuple_id.slot_id.index();
        if !self.is_slot_used(slot) {
            return Err(SableError::SlotNotOccupied {
                page_id: self.page_id.to_string(),
                slot,
            });
        }

        self.mark_slot(slot, false);
        self.slots[slot] = None;
        Ok(())
    }

    /// Returns the tuple in `slot`, if any.
    pub fn tuple(&self, slot: SlotId) -> Option<&Tuple> {
        self.slots.get(slot.index()).and_then(Option::as_ref)
    }

    /// Iterates over stored tuples in slot order.
    pub fn tuples(&self) -> impl Iterator<Item = &Tuple> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Consumes the page, yielding its tuples in slot order.
    pub fn into_tuples(self) -> Vec<Tuple> {
        self.slots.into_iter().flatten().collect()
    }
}
