use crate::location::*;
use screeps::Position;

pub trait FindNearestItertools: Iterator {
    /// Nearest item by straight-line (Chebyshev) range.
    fn find_nearest_linear_by<F>(self, start_pos: Position, pos_fn: F) -> Option<Self::Item>
    where
        Self: Sized,
        F: Fn(&Self::Item) -> Position,
    {
        self.map(|item| (range_between(start_pos, pos_fn(&item)), item))
            .filter(|(range, _)| *range != u32::MAX)
            .min_by_key(|(range, _)| *range)
            .map(|(_, item)| item)
    }

    /// Nearest item by path length. `generator` returns the length of a path
    /// to the item, or `None` if it cannot be reached.
    fn find_nearest_from<F>(self, start_pos: Position, mut generator: F) -> Option<Self::Item>
    where
        Self: Sized,
        F: FnMut(Position, &Self::Item) -> Option<u32>,
    {
        self.filter_map(|item| generator(start_pos, &item).map(|length| (length, item)))
            .min_by_key(|(length, _)| *length)
            .map(|(_, item)| item)
    }
}

impl<T: ?Sized> FindNearestItertools for T where T: Iterator {}
