use tracing::warn;

/// Reports an approximate in-memory size in bytes.
///
/// Estimates depend only on content, never on allocator capacity, so two equal values
/// always report the same size.
pub trait SizeHint {
    fn size_hint(&self) -> usize;
}

impl<T> SizeHint for Option<T>
where
    T: SizeHint,
{
    fn size_hint(&self) -> usize {
        match self {
            Some(value) => value.size_hint(),
            None => 0,
        }
    }
}

impl<T> SizeHint for [T]
where
    T: SizeHint,
{
    fn size_hint(&self) -> usize {
        self.iter().fold(0, |total, value| {
            checked_add_or_saturating(total, value.size_hint(), "slice.add_element")
        })
    }
}

/// Adds two sizes, saturating and logging on overflow.
pub(crate) fn checked_add_or_saturating(lhs: usize, rhs: usize, context: &'static str) -> usize {
    lhs.checked_add(rhs).unwrap_or_else(|| {
        warn!(context, lhs, rhs, "size estimate overflowed, saturating");
        usize::MAX
    })
}
