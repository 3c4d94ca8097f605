use std::collections::HashSet;
use std::hash::Hash;

pub trait VecExtensions<T> {
    fn remove_first_where<F>(&mut self, predicate: F) -> Option<T>
    where
        F: Fn(&T) -> bool;

    /// Removes one occurrence of each item, or nothing at all if any item is
    /// missing.
    fn remove_each(&mut self, items: &[T]) -> bool
    where
        T: PartialEq;
}

impl<T> VecExtensions<T> for Vec<T> {
    fn remove_first_where<F>(&mut self, predicate: F) -> Option<T>
    where
        F: Fn(&T) -> bool,
    {
        self.iter()
            .position(predicate)
            .map(|index| self.remove(index))
    }

    fn remove_each(&mut self, items: &[T]) -> bool
    where
        T: PartialEq,
    {
        let mut positions = Vec::with_capacity(items.len());
        for item in items {
            match self
                .iter()
                .enumerate()
                .position(|(i, x)| x == item && !positions.contains(&i))
            {
                Some(i) => positions.push(i),
                None => return false,
            }
        }
        positions.sort_unstable();
        for i in positions.into_iter().rev() {
            self.remove(i);
        }
        true
    }
}

pub trait SliceExtensions<T> {
    fn single_element(&self) -> Option<&T>;

    fn first_duplicate(&self) -> Option<&T>
    where
        T: Eq + Hash;
}

impl<T> SliceExtensions<T> for [T] {
    fn single_element(&self) -> Option<&T> {
        match self.len() {
            1 => self.iter().next(),
            _ => None,
        }
    }

    fn first_duplicate(&self) -> Option<&T>
    where
        T: Eq + Hash,
    {
        let mut seen = HashSet::new();
        self.iter().find(|x| !seen.insert(*x))
    }
}
