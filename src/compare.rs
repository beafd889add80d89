//! Comparison predicates for the ordered containers.
//!
//! A comparator must be a strict weak ordering. Violating that contract does
//! not cause memory unsafety, but the resulting tree shape and lookup results
//! are unspecified.

use core::cmp::Ordering;

/// Three-way comparison over `T`.
pub trait Compare<T: ?Sized> {
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// Orders by `T: Ord`. The default comparator of every container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Natural;

impl<T: Ord + ?Sized> Compare<T> for Natural {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

/// Inverts another comparator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Reversed<C>(pub C);

impl<T: ?Sized, C: Compare<T>> Compare<T> for Reversed<C> {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self.0.compare(b, a)
    }
}

impl<T: ?Sized, F> Compare<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_and_reversed_disagree() {
        assert_eq!(Natural.compare(&1, &2), Ordering::Less);
        assert_eq!(Reversed(Natural).compare(&1, &2), Ordering::Greater);
        assert_eq!(Natural.compare("a", "a"), Ordering::Equal);
    }

    #[test]
    fn closures_are_comparators() {
        let by_len = |a: &String, b: &String| a.len().cmp(&b.len());
        assert_eq!(
            by_len.compare(&"abc".to_string(), &"z".to_string()),
            Ordering::Greater
        );
    }
}
