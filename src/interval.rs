use std::cmp::Ordering;

/// A closed integer interval `[start, end]`.
#[derive(Debug, Clone, Copy, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub struct Interval<T: Number> {
	start: T,
	end: T,
}

/// Sorted list of disjoint, non-adjacent closed intervals.
///
/// This is the alphabet algebra: transition labels for set/not-set edges,
/// vocabularies, and the symbol sets quoted in errors.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
pub struct IntervalSet<T: Number> {
	intervals: Vec<Interval<T>>,
}

pub trait Number: Ord + Copy {
	const MIN: Self;
	const MAX: Self;

	fn up(&self) -> Self;
	fn down(&self) -> Self;
	fn offset_from(&self, other: &Self) -> usize;
}

impl<T: Number> Interval<T> {
	pub fn new(start: T, end: T) -> Self {
		assert!(start <= end);
		Self { start, end }
	}

	pub fn point(at: T) -> Self {
		Self { start: at, end: at }
	}

	pub fn start(&self) -> T {
		self.start
	}

	pub fn end(&self) -> T {
		self.end
	}

	pub fn width(&self) -> usize {
		self.end.offset_from(&self.start) + 1
	}

	/// True when the union of `self` and `other` is itself one interval.
	fn fuses_with(&self, other: &Self) -> bool {
		let (lower, upper): (&Self, &Self) = if self.start <= other.start {
			(self, other)
		} else {
			(other, self)
		};
		(upper.start <= lower.end) || (lower.end < T::MAX && lower.end.up() == upper.start)
	}
}

impl<T: Number> IntervalSet<T> {
	pub fn new() -> Self {
		Self { intervals: Vec::new() }
	}

	pub fn of(start: T, end: T) -> Self {
		let mut set: Self = Self::new();
		set.add(start, end);
		set
	}

	pub fn of_one(at: T) -> Self {
		Self::of(at, at)
	}

	pub fn len(&self) -> usize {
		self.intervals.len()
	}

	pub fn is_empty(&self) -> bool {
		self.intervals.is_empty()
	}

	/// Total number of contained points.
	pub fn size(&self) -> usize {
		self.intervals.iter().map(Interval::width).sum::<usize>()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Interval<T>> {
		self.intervals.iter()
	}

	pub fn min(&self) -> Option<T> {
		self.intervals.first().map(Interval::start)
	}

	pub fn max(&self) -> Option<T> {
		self.intervals.last().map(Interval::end)
	}

	pub fn add_one(&mut self, at: T) {
		self.add(at, at);
	}

	pub fn add(&mut self, start: T, end: T) {
		self.add_interval(Interval::new(start, end));
	}

	/// Insert, fusing with any overlapping or adjacent neighbours.
	pub fn add_interval(&mut self, addition: Interval<T>) {
		let mut result: Vec<Interval<T>> = Vec::with_capacity(self.intervals.len() + 1);
		let mut pending: Interval<T> = addition;
		let mut placed: bool = false;

		for &existing in self.intervals.iter() {
			if placed || (existing.end < pending.start && !existing.fuses_with(&pending)) {
				result.push(existing);
			} else if pending.end < existing.start && !pending.fuses_with(&existing) {
				result.push(pending);
				result.push(existing);
				placed = true;
			} else {
				pending = Interval::new(
					pending.start.min(existing.start),
					pending.end.max(existing.end),
				);
			}
		}
		if !placed {
			result.push(pending);
		}

		self.intervals = result;
		self.invariants();
	}

	pub fn contains(&self, at: T) -> bool {
		// `partition_point` assumes partitioning as `[true, ..., false]` and returns the index of the first `false`.
		let index: usize = self.intervals.partition_point(|interval| interval.end < at);
		match self.intervals.get(index) {
			Some(interval) => interval.start <= at,
			None => false,
		}
	}

	pub fn union(&self, other: &Self) -> Self {
		let mut result: Self = self.clone();
		for &interval in other.intervals.iter() {
			result.add_interval(interval);
		}
		result
	}

	pub fn and(&self, other: &Self) -> Self {
		let mut result: Self = Self::new();
		let mut i: usize = 0;
		let mut j: usize = 0;
		while i < self.intervals.len() && j < other.intervals.len() {
			let a: Interval<T> = self.intervals[i];
			let b: Interval<T> = other.intervals[j];
			let start: T = a.start.max(b.start);
			let end: T = a.end.min(b.end);
			if start <= end {
				result.add(start, end);
			}
			match a.end.cmp(&b.end) {
				Ordering::Less => i += 1,
				Ordering::Greater => j += 1,
				Ordering::Equal => {
					i += 1;
					j += 1;
				},
			}
		}
		result
	}

	pub fn subtract(&self, other: &Self) -> Self {
		let mut result: Self = Self::new();
		for &keep in self.intervals.iter() {
			let mut start: T = keep.start;
			let mut exhausted: bool = false;
			for &cut in other.intervals.iter() {
				if cut.end < start {
					continue;
				}
				if keep.end < cut.start {
					break;
				}
				if start < cut.start {
					result.add(start, cut.start.down());
				}
				if cut.end < keep.end {
					start = cut.end.up();
				} else {
					exhausted = true;
					break;
				}
			}
			if !exhausted {
				result.add(start, keep.end);
			}
		}
		result
	}

	/// Everything in `vocabulary` that is not in `self`.
	pub fn complement(&self, vocabulary: &Self) -> Self {
		vocabulary.subtract(self)
	}

	fn invariants(&self) {
		let mut maybe_previous: Option<T> = None;
		for interval in self.intervals.iter() {
			if let Some(previous) = maybe_previous {
				assert!(previous < T::MAX && previous.up() < interval.start);
			}
			maybe_previous = Some(interval.end);
		}
	}
}

impl<T: Number> std::ops::Index<usize> for IntervalSet<T> {
	type Output = Interval<T>;

	fn index(&self, i: usize) -> &Self::Output {
		&self.intervals[i]
	}
}

impl<T: Number> FromIterator<(T, T)> for IntervalSet<T> {
	fn from_iter<I: IntoIterator<Item = (T, T)>>(iter: I) -> Self {
		let mut set: Self = Self::new();
		for (start, end) in iter {
			set.add(start, end);
		}
		set
	}
}

macro_rules! number_impl {
	($ty:ty, $($tt:tt)*) => {
		number_impl!($ty);
		number_impl!($($tt)*);
	};
	($ty:ty) => {
		impl Number for $ty {
			const MIN: Self = <$ty>::MIN;
			const MAX: Self = <$ty>::MAX;

			fn up(&self) -> Self {
				self + 1
			}

			fn down(&self) -> Self {
				self - 1
			}

			fn offset_from(&self, other: &Self) -> usize {
				(self - other) as usize
			}
		}
	};
}

number_impl!(u8, u16, u32, u64, usize);
number_impl!(i8, i16, i32, i64, isize);

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn add_fuses() {
		let mut set: IntervalSet<i32> = IntervalSet::new();
		set.add(10, 20);
		set.add(30, 40);
		assert_eq!(set.len(), 2);
		// adjacency fuses
		set.add(21, 29);
		assert_eq!(set.len(), 1);
		assert_eq!(set[0], Interval::new(10, 40));
		// overlap fuses
		set.add(5, 12);
		assert_eq!(set[0], Interval::new(5, 40));
		// disjoint stays
		set.add(50, 60);
		assert_eq!(set.len(), 2);
		assert_eq!(set.size(), 36 + 11);
	}

	#[test]
	fn contains() {
		let set: IntervalSet<i32> = IntervalSet::from_iter([(0, 4), (8, 8), (10, 20)]);
		assert!(set.contains(0));
		assert!(set.contains(4));
		assert!(!set.contains(5));
		assert!(set.contains(8));
		assert!(!set.contains(9));
		assert!(set.contains(15));
		assert!(!set.contains(21));
	}

	#[test]
	fn algebra() {
		let a: IntervalSet<i32> = IntervalSet::from_iter([(0, 10), (20, 30)]);
		let b: IntervalSet<i32> = IntervalSet::from_iter([(5, 25)]);

		let union: IntervalSet<i32> = a.union(&b);
		assert_eq!(union.len(), 1);
		assert_eq!(union[0], Interval::new(0, 30));

		let and: IntervalSet<i32> = a.and(&b);
		assert_eq!(and.len(), 2);
		assert_eq!(and[0], Interval::new(5, 10));
		assert_eq!(and[1], Interval::new(20, 25));

		let difference: IntervalSet<i32> = a.subtract(&b);
		assert_eq!(difference.len(), 2);
		assert_eq!(difference[0], Interval::new(0, 4));
		assert_eq!(difference[1], Interval::new(26, 30));
	}

	#[test]
	fn complement_in_vocabulary() {
		let vocabulary: IntervalSet<i32> = IntervalSet::of(0, 100);
		let set: IntervalSet<i32> = IntervalSet::from_iter([(0, 9), (50, 100)]);
		let complement: IntervalSet<i32> = set.complement(&vocabulary);
		assert_eq!(complement.len(), 1);
		assert_eq!(complement[0], Interval::new(10, 49));
	}
}
