//! Operation graph for semantic descriptions.
//!
//! Every descriptor owns one [`OpGraph`]: a flat arena of [`Node`]s in which
//! children are referenced by [`NodeId`] index. Nodes are pushed leaf-first,
//! so a child always has a smaller index than its parent and a shared
//! subtree is simply the same index used twice.
//!
//! ```text
//! %0 = operand vs2
//! %1 = operand rs1
//! %2 = shift right %0, %1
//! %3 = const bits
//! %4 = arith rsub %1, %3
//! ...
//! ```

use std::fmt;

use crate::core::ElementWidth;

pub mod verify;

pub use verify::{well_formed, ValidationError};

/// Index of a node inside its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Formal parameter a load-operand node refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandRole {
    /// `vs2`, the vector source every instruction has.
    Primary,
    /// `vs1`, `rs1` or `uimm` depending on the operand form.
    Secondary,
    /// `vd` of accumulating instructions.
    Accumulator,
}

/// Width-dependent literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstExpr {
    Literal(u64),
    /// The element width in bits.
    ElementBits,
    /// The element width minus one, the mask for shift amounts.
    ShiftMask,
    /// A 64-bit pattern truncated to the element width.
    Pattern(u64),
}

impl ConstExpr {
    pub fn evaluate(self, width: ElementWidth) -> u64 {
        match self {
            Self::Literal(v) => v,
            Self::ElementBits => u64::from(width.bits()),
            Self::ShiftMask => u64::from(width.bits() - 1),
            Self::Pattern(p) => p & width.mask(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShiftDir {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitOp {
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    /// `rhs - lhs`.
    RevSub,
}

/// Signedness of a widening multiply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MulSign {
    Signed,
    Unsigned,
    /// Signed left operand, unsigned right operand.
    SignedUnsigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddSign {
    Signed,
    Unsigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Half {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlideDir {
    Up,
    Down,
}

/// Signedness relabeling applied by a reinterpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignChange {
    Keep,
    ToSigned,
    ToUnsigned,
}

/// One operation of a semantic description.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Operand(OperandRole),
    Constant(ConstExpr),
    Shift { dir: ShiftDir, value: NodeId, amount: NodeId },
    Bitwise { op: BitOp, lhs: NodeId, rhs: NodeId },
    Invert(NodeId),
    Arith { op: ArithOp, lhs: NodeId, rhs: NodeId },
    /// Doubles width and grouping.
    WidenMul { sign: MulSign, lhs: NodeId, rhs: NodeId },
    /// Doubles width and grouping.
    WidenAdd { sign: AddSign, lhs: NodeId, rhs: NodeId },
    /// Halves width and grouping, keeping the selected half of each element.
    NarrowExtract { half: Half, value: NodeId },
    /// Same bits, element width scaled by `2^width_shift`.
    Reinterpret { value: NodeId, width_shift: i8, sign: SignChange },
    /// Doubles width and grouping, zero-filling the upper half.
    ZeroExtend(NodeId),
    /// Broadcasts a scalar to the format of `like`; vectors pass through.
    Splat { value: NodeId, like: NodeId },
    Compress { value: NodeId, mask: NodeId },
    /// Elements not written by the slide come from `dest`; inactive
    /// elements under `mask` are left undisturbed.
    Slide {
        dir: SlideDir,
        value: NodeId,
        offset: u32,
        dest: Option<NodeId>,
        mask: Option<NodeId>,
    },
    /// Takes `on_true` where the mask bit is set, `on_false` elsewhere.
    Merge { on_false: NodeId, on_true: NodeId, mask: NodeId },
    /// Mask whose bit `i` is bit `i % 8` of `pattern`, sized for `like`.
    LaneMask { pattern: u8, like: NodeId },
    /// Signed `lhs < rhs` per element.
    LessThan { lhs: NodeId, rhs: NodeId },
    /// Halves the grouping, keeping the low part.
    Truncate(NodeId),
    /// `wide` when the base element width exceeds `above`, else `narrow`.
    WidthSwitch { above: ElementWidth, wide: NodeId, narrow: NodeId },
    /// Applies the variant's tail and mask policy to a result.
    Commit(NodeId),
}

impl Node {
    /// Short name for diagnostics and printing.
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Self::Operand(_) => "operand",
            Self::Constant(_) => "const",
            Self::Shift { .. } => "shift",
            Self::Bitwise { .. } => "bitwise",
            Self::Invert(_) => "invert",
            Self::Arith { .. } => "arith",
            Self::WidenMul { .. } => "widen-mul",
            Self::WidenAdd { .. } => "widen-add",
            Self::NarrowExtract { .. } => "narrow",
            Self::Reinterpret { .. } => "reinterpret",
            Self::ZeroExtend(_) => "zext",
            Self::Splat { .. } => "splat",
            Self::Compress { .. } => "compress",
            Self::Slide { .. } => "slide",
            Self::Merge { .. } => "merge",
            Self::LaneMask { .. } => "lane-mask",
            Self::LessThan { .. } => "less-than",
            Self::Truncate(_) => "truncate",
            Self::WidthSwitch { .. } => "width-switch",
            Self::Commit(_) => "commit",
        }
    }

    /// Children in evaluation order; optional slide operands are skipped
    /// when absent.
    pub fn children(&self) -> impl Iterator<Item = NodeId> {
        let slots: [Option<NodeId>; 3] = match *self {
            Self::Operand(_) | Self::Constant(_) => [None, None, None],
            Self::Invert(v) | Self::ZeroExtend(v) | Self::Truncate(v) | Self::Commit(v) => {
                [Some(v), None, None]
            }
            Self::NarrowExtract { value, .. } | Self::Reinterpret { value, .. } => {
                [Some(value), None, None]
            }
            Self::LaneMask { like, .. } => [Some(like), None, None],
            Self::Shift { value, amount, .. } => [Some(value), Some(amount), None],
            Self::Bitwise { lhs, rhs, .. }
            | Self::Arith { lhs, rhs, .. }
            | Self::WidenMul { lhs, rhs, .. }
            | Self::WidenAdd { lhs, rhs, .. }
            | Self::LessThan { lhs, rhs } => [Some(lhs), Some(rhs), None],
            Self::Splat { value, like } => [Some(value), Some(like), None],
            Self::Compress { value, mask } => [Some(value), Some(mask), None],
            Self::Slide { value, dest, mask, .. } => [Some(value), dest, mask],
            Self::Merge { on_false, on_true, mask } => [Some(on_false), Some(on_true), Some(mask)],
            Self::WidthSwitch { wide, narrow, .. } => [Some(wide), Some(narrow), None],
        };
        slots.into_iter().flatten()
    }
}

/// Arena of nodes with one designated root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpGraph {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl OpGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node. Structural checks are deferred to [`well_formed`].
    pub fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    // Builder helpers, one per node kind.

    pub fn operand(&mut self, role: OperandRole) -> NodeId {
        self.push(Node::Operand(role))
    }

    pub fn constant(&mut self, value: ConstExpr) -> NodeId {
        self.push(Node::Constant(value))
    }

    pub fn shift(&mut self, dir: ShiftDir, value: NodeId, amount: NodeId) -> NodeId {
        self.push(Node::Shift { dir, value, amount })
    }

    pub fn bitwise(&mut self, op: BitOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.push(Node::Bitwise { op, lhs, rhs })
    }

    pub fn and(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.bitwise(BitOp::And, lhs, rhs)
    }

    pub fn or(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.bitwise(BitOp::Or, lhs, rhs)
    }

    pub fn invert(&mut self, value: NodeId) -> NodeId {
        self.push(Node::Invert(value))
    }

    pub fn arith(&mut self, op: ArithOp, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.push(Node::Arith { op, lhs, rhs })
    }

    pub fn widen_mul(&mut self, sign: MulSign, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.push(Node::WidenMul { sign, lhs, rhs })
    }

    pub fn widen_add(&mut self, sign: AddSign, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.push(Node::WidenAdd { sign, lhs, rhs })
    }

    pub fn narrow(&mut self, half: Half, value: NodeId) -> NodeId {
        self.push(Node::NarrowExtract { half, value })
    }

    pub fn reinterpret(&mut self, value: NodeId, width_shift: i8) -> NodeId {
        self.push(Node::Reinterpret { value, width_shift, sign: SignChange::Keep })
    }

    pub fn zero_extend(&mut self, value: NodeId) -> NodeId {
        self.push(Node::ZeroExtend(value))
    }

    pub fn splat(&mut self, value: NodeId, like: NodeId) -> NodeId {
        self.push(Node::Splat { value, like })
    }

    pub fn compress(&mut self, value: NodeId, mask: NodeId) -> NodeId {
        self.push(Node::Compress { value, mask })
    }

    pub fn slide(
        &mut self,
        dir: SlideDir,
        value: NodeId,
        offset: u32,
        dest: Option<NodeId>,
        mask: Option<NodeId>,
    ) -> NodeId {
        self.push(Node::Slide { dir, value, offset, dest, mask })
    }

    pub fn merge(&mut self, on_false: NodeId, on_true: NodeId, mask: NodeId) -> NodeId {
        self.push(Node::Merge { on_false, on_true, mask })
    }

    pub fn lane_mask(&mut self, pattern: u8, like: NodeId) -> NodeId {
        self.push(Node::LaneMask { pattern, like })
    }

    pub fn less_than(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.push(Node::LessThan { lhs, rhs })
    }

    pub fn truncate(&mut self, value: NodeId) -> NodeId {
        self.push(Node::Truncate(value))
    }

    pub fn width_switch(&mut self, above: ElementWidth, wide: NodeId, narrow: NodeId) -> NodeId {
        self.push(Node::WidthSwitch { above, wide, narrow })
    }

    pub fn commit(&mut self, value: NodeId) -> NodeId {
        self.push(Node::Commit(value))
    }

    /// Textual dump, one node per line.
    pub fn print(&self) -> String {
        let mut output = String::new();
        for (id, node) in self.iter() {
            let children: Vec<String> = node.children().map(|c| c.to_string()).collect();
            let marker = if Some(id) == self.root { " (root)" } else { "" };
            output.push_str(&format!("{id} = {}", node.mnemonic()));
            if !children.is_empty() {
                output.push(' ');
                output.push_str(&children.join(", "));
            }
            output.push_str(marker);
            output.push('\n');
        }
        output
    }
}

impl fmt::Display for OpGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.print())
    }
}
