//! Index-based slot table with a bounded pool of spare slots.
//!
//! Removed entries leave their slot vacant for reuse, up to `spare_capacity`
//! vacancies. Past that, the last value is moved into the freed slot
//! instead, so storage never exceeds `len + spare_capacity` slots. The last
//! slot is always occupied.

/// A value taken out of the table.
pub(crate) struct Removed<T> {
    pub value: T,
    /// `(from, to)` when the last value was moved into the freed slot.
    pub relocated: Option<(usize, usize)>,
}

pub(crate) struct SlotTable<T> {
    slots: Vec<Option<T>>,
    vacant: Vec<usize>,
    spare_capacity: usize,
    len: usize,
}

impl<T> SlotTable<T> {
    pub fn new(spare_capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(spare_capacity),
            vacant: Vec::with_capacity(spare_capacity),
            spare_capacity,
            len: 0,
        }
    }

    /// Store a value, reusing a vacant slot when one exists.
    pub fn insert(&mut self, value: T) -> usize {
        self.len += 1;
        match self.vacant.pop() {
            Some(index) => {
                self.slots[index] = Some(value);
                index
            }
            None => {
                self.slots.push(Some(value));
                self.slots.len() - 1
            }
        }
    }

    /// Take the value at `index`.
    ///
    /// Callers holding indices must follow `relocated`.
    pub fn remove(&mut self, index: usize) -> Option<Removed<T>> {
        let value = self.slots.get_mut(index)?.take()?;
        self.len -= 1;

        let last = self.slots.len() - 1;
        let relocated = if index == last {
            self.slots.pop();
            self.pop_trailing_vacancies();
            None
        } else if self.vacant.len() < self.spare_capacity {
            self.vacant.push(index);
            None
        } else {
            // Last slot is occupied, so this always moves a value.
            let moved = self.slots.pop().flatten();
            self.slots[index] = moved;
            self.pop_trailing_vacancies();
            Some((last, index))
        };

        Some(Removed { value, relocated })
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index)?.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|value| (index, value)))
    }

    /// Remove every value, keeping storage for `spare_capacity` of them.
    pub fn drain(&mut self) -> Vec<T> {
        let drained: Vec<T> = self.slots.drain(..).flatten().collect();
        self.len = 0;
        self.vacant.clear();
        self.slots.shrink_to(self.spare_capacity);
        drained
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of vacant slots awaiting reuse.
    pub fn spare(&self) -> usize {
        self.vacant.len()
    }

    /// Slots in use or vacant.
    #[cfg(test)]
    fn footprint(&self) -> usize {
        self.slots.len()
    }

    fn pop_trailing_vacancies(&mut self) {
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
            let end = self.slots.len();
            // Bounded by spare_capacity.
            self.vacant.retain(|&index| index != end);
        }
    }
}
