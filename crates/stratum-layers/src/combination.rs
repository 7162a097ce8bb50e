//! Order-independent layer sets and their combination labels.

use std::fmt;

use crate::classify::Layer;

/// An order-independent set of layers.
///
/// # Examples
///
/// ```
/// use stratum_layers::classify::Layer;
/// use stratum_layers::combination::LayerSet;
///
/// let set: LayerSet = [Layer::View, Layer::Model, Layer::View].into_iter().collect();
/// assert_eq!(set.combination(), "mv");
/// assert_eq!(set.len(), 2);
/// assert_eq!(LayerSet::default().combination(), "");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LayerSet(u8);

impl LayerSet {
    fn bit(layer: Layer) -> u8 {
        match layer {
            Layer::Model => 0b001,
            Layer::View => 0b010,
            Layer::Controller => 0b100,
        }
    }

    pub fn insert(&mut self, layer: Layer) {
        self.0 |= Self::bit(layer);
    }

    pub fn contains(self, layer: Layer) -> bool {
        self.0 & Self::bit(layer) != 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: LayerSet) -> LayerSet {
        LayerSet(self.0 | other.0)
    }

    /// Canonical label: `mvc`, `mv`, `mc`, `vc`, `m`, `v`, `c`, or `""`.
    pub fn combination(self) -> &'static str {
        match (
            self.contains(Layer::Model),
            self.contains(Layer::View),
            self.contains(Layer::Controller),
        ) {
            (true, true, true) => "mvc",
            (true, true, false) => "mv",
            (true, false, true) => "mc",
            (false, true, true) => "vc",
            (true, false, false) => "m",
            (false, true, false) => "v",
            (false, false, true) => "c",
            (false, false, false) => "",
        }
    }
}

impl FromIterator<Layer> for LayerSet {
    fn from_iter<I: IntoIterator<Item = Layer>>(iter: I) -> Self {
        let mut set = LayerSet::default();
        set.extend(iter);
        set
    }
}

impl Extend<Layer> for LayerSet {
    fn extend<I: IntoIterator<Item = Layer>>(&mut self, iter: I) {
        for layer in iter {
            self.insert(layer);
        }
    }
}

impl fmt::Display for LayerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.combination())
    }
}
