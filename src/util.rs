pub mod fmt;
#[cfg(test)]
pub(crate) mod test_utils;

pub trait BreakableIteratorExt: Iterator + Sized {
    /// Yields items up to and including the first one matching
    /// `stop_predicate`. Useful for scanners, which yield end of input
    /// forever.
    fn up_to<P>(self, stop_predicate: P) -> UpTo<Self, P>
    where
        P: FnMut(&Self::Item) -> bool;
}

impl<I: Iterator> BreakableIteratorExt for I {
    fn up_to<P>(self, stop_predicate: P) -> UpTo<Self, P>
    where
        P: FnMut(&Self::Item) -> bool,
    {
        UpTo {
            iter: self,
            stop_predicate,
            done: false,
        }
    }
}

pub struct UpTo<I, P> {
    iter: I,
    stop_predicate: P,
    done: bool,
}

impl<I, P> Iterator for UpTo<I, P>
where
    I: Iterator,
    P: FnMut(&I::Item) -> bool,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.iter.next()?;
        self.done = (self.stop_predicate)(&item);
        Some(item)
    }
}
