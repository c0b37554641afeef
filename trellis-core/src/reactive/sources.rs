//! Source sets for derivations.
//!
//! A derivation reads a positional tuple of source values. [`Sources`] is
//! implemented for tuples of up to six [`Readable`]s (heterogeneous value
//! types) and for `Vec<R>` (any number of sources sharing one value type).

use std::sync::Arc;

use super::readable::Readable;
use super::subscriber::Subscription;

/// Change hook handed to every source of a derivation.
pub type SourceChanged = Arc<dyn Fn() + Send + Sync>;

/// A fixed set of sources a derivation computes from.
pub trait Sources: Send + Sync + 'static {
    /// Current values of every source, in position order.
    type Values;

    /// Read every source.
    fn values(&self) -> Self::Values;

    /// Observe every source with the same change hook. Each returned
    /// subscription has already delivered its immediate notification.
    fn observe_each(&self, on_change: SourceChanged) -> Vec<Subscription>;

    /// Number of sources.
    fn len(&self) -> usize;

    /// Whether the set has no sources at all.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn hook<V>(on_change: &SourceChanged) -> Arc<dyn Fn(&V) + Send + Sync> {
    let on_change = Arc::clone(on_change);
    Arc::new(move |_: &V| on_change())
}

macro_rules! tuple_sources {
    ($count:expr; $($name:ident $idx:tt),+) => {
        impl<$($name: Readable),+> Sources for ($($name,)+) {
            type Values = ($(<$name as Readable>::Value,)+);

            fn values(&self) -> Self::Values {
                ($(self.$idx.get(),)+)
            }

            fn observe_each(&self, on_change: SourceChanged) -> Vec<Subscription> {
                vec![$(self.$idx.observe_with(hook(&on_change))),+]
            }

            fn len(&self) -> usize {
                $count
            }
        }
    };
}

tuple_sources!(1; A 0);
tuple_sources!(2; A 0, B 1);
tuple_sources!(3; A 0, B 1, C 2);
tuple_sources!(4; A 0, B 1, C 2, D 3);
tuple_sources!(5; A 0, B 1, C 2, D 3, E 4);
tuple_sources!(6; A 0, B 1, C 2, D 3, E 4, F 5);

impl<R: Readable> Sources for Vec<R> {
    type Values = Vec<R::Value>;

    fn values(&self) -> Self::Values {
        self.iter().map(Readable::get).collect()
    }

    fn observe_each(&self, on_change: SourceChanged) -> Vec<Subscription> {
        self.iter()
            .map(|source| source.observe_with(hook(&on_change)))
            .collect()
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}
