//! Meta-fusion trees.
//!
//! A meta fusion groups logical axes without moving any data: the tensor
//! keeps its native axes and records, per logical axis, the nesting of native
//! axes it stands for. Consumers such as tensordot expand the trees back into
//! native axes before touching blocks.

use std::fmt;
use std::ops::Range;

/// Nesting of native axes behind one logical axis.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum FusionTree {
    /// A single native axis.
    #[default]
    Leaf,
    /// An ordered group of subtrees.
    Node(Vec<FusionTree>),
}

impl FusionTree {
    /// Number of native axes covered by this tree.
    pub fn num_native(&self) -> usize {
        match self {
            FusionTree::Leaf => 1,
            FusionTree::Node(children) => children.iter().map(FusionTree::num_native).sum(),
        }
    }

    /// Whether the tree is a single native axis.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self, FusionTree::Leaf)
    }

    /// Direct children (empty for a leaf).
    pub fn children(&self) -> &[FusionTree] {
        match self {
            FusionTree::Leaf => &[],
            FusionTree::Node(children) => children,
        }
    }
}

impl fmt::Display for FusionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FusionTree::Leaf => write!(f, "*"),
            FusionTree::Node(children) => {
                write!(f, "(")?;
                for (i, c) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", c)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Native-axis range of every logical axis.
pub(crate) fn native_ranges(mfs: &[FusionTree]) -> Vec<Range<usize>> {
    let mut start = 0;
    mfs.iter()
        .map(|t| {
            let r = start..start + t.num_native();
            start = r.end;
            r
        })
        .collect()
}

/// Expand logical axes into the native axes they cover, in order.
pub(crate) fn native_axes(mfs: &[FusionTree], axes: &[usize]) -> Vec<usize> {
    let ranges = native_ranges(mfs);
    axes.iter().flat_map(|&a| ranges[a].clone()).collect()
}
