use crate::{ArgDir, OpDescriptor};

use crate::ArgDir::{In, InOut, Out};

macro_rules! op {
    ($mnemonic:literal $(, $tag:literal : $dir:ident)* $(,)?) => {
        OpDescriptor {
            mnemonic: $mnemonic,
            args: &[$(($tag, $dir)),*],
            jump: false,
        }
    };
}

macro_rules! jump {
    ($mnemonic:literal $(, $tag:literal : $dir:ident)* $(,)?) => {
        OpDescriptor {
            mnemonic: $mnemonic,
            args: &[$(($tag, $dir)),*],
            jump: true,
        }
    };
}

pub(crate) const CORE_OPS: &[OpDescriptor] = &[
    op!("end"),
    op!("noop"),
    op!("saveall"),
    op!("restoreall"),
    // plain copies
    op!("set", "i": Out, "i": In),
    op!("set", "i": Out, "ic": In),
    op!("set", "i": Out, "n": In),
    op!("set", "i": Out, "p": In),
    op!("set", "n": Out, "n": In),
    op!("set", "n": Out, "nc": In),
    op!("set", "n": Out, "i": In),
    op!("set", "n": Out, "p": In),
    op!("set", "s": Out, "s": In),
    op!("set", "s": Out, "sc": In),
    op!("set", "s": Out, "i": In),
    op!("set", "s": Out, "p": In),
    op!("set", "p": Out, "p": In),
    op!("set", "p": Out, "i": In),
    op!("set", "p": Out, "ic": In),
    op!("set", "p": Out, "n": In),
    op!("set", "p": Out, "nc": In),
    op!("set", "p": Out, "s": In),
    op!("set", "p": Out, "sc": In),
    // keyed fetch: set X, P[key]
    op!("set", "i": Out, "p": In, "k": In),
    op!("set", "i": Out, "p": In, "kc": In),
    op!("set", "i": Out, "p": In, "ki": In),
    op!("set", "i": Out, "p": In, "kic": In),
    op!("set", "n": Out, "p": In, "k": In),
    op!("set", "n": Out, "p": In, "kc": In),
    op!("set", "n": Out, "p": In, "ki": In),
    op!("set", "n": Out, "p": In, "kic": In),
    op!("set", "s": Out, "p": In, "k": In),
    op!("set", "s": Out, "p": In, "kc": In),
    op!("set", "s": Out, "p": In, "ki": In),
    op!("set", "s": Out, "p": In, "kic": In),
    op!("set", "p": Out, "p": In, "k": In),
    op!("set", "p": Out, "p": In, "kc": In),
    op!("set", "p": Out, "p": In, "ki": In),
    op!("set", "p": Out, "p": In, "kic": In),
    // keyed store: set P[key], X
    op!("set", "p": InOut, "k": In, "i": In),
    op!("set", "p": InOut, "k": In, "ic": In),
    op!("set", "p": InOut, "k": In, "n": In),
    op!("set", "p": InOut, "k": In, "nc": In),
    op!("set", "p": InOut, "k": In, "s": In),
    op!("set", "p": InOut, "k": In, "sc": In),
    op!("set", "p": InOut, "k": In, "p": In),
    op!("set", "p": InOut, "kc": In, "i": In),
    op!("set", "p": InOut, "kc": In, "ic": In),
    op!("set", "p": InOut, "kc": In, "n": In),
    op!("set", "p": InOut, "kc": In, "nc": In),
    op!("set", "p": InOut, "kc": In, "s": In),
    op!("set", "p": InOut, "kc": In, "sc": In),
    op!("set", "p": InOut, "kc": In, "p": In),
    op!("set", "p": InOut, "ki": In, "i": In),
    op!("set", "p": InOut, "ki": In, "ic": In),
    op!("set", "p": InOut, "ki": In, "n": In),
    op!("set", "p": InOut, "ki": In, "nc": In),
    op!("set", "p": InOut, "ki": In, "s": In),
    op!("set", "p": InOut, "ki": In, "sc": In),
    op!("set", "p": InOut, "ki": In, "p": In),
    op!("set", "p": InOut, "kic": In, "i": In),
    op!("set", "p": InOut, "kic": In, "ic": In),
    op!("set", "p": InOut, "kic": In, "n": In),
    op!("set", "p": InOut, "kic": In, "nc": In),
    op!("set", "p": InOut, "kic": In, "s": In),
    op!("set", "p": InOut, "kic": In, "sc": In),
    op!("set", "p": InOut, "kic": In, "p": In),
    op!("set_addr", "i": Out, "ic": In),
    op!("new", "p": Out, "ic": In),
    op!("clone", "p": Out, "p": In),
    op!("clone", "s": Out, "s": In),
    op!("defined", "i": Out, "p": In),
    op!("defined", "i": Out, "p": In, "k": In),
    op!("defined", "i": Out, "p": In, "kc": In),
    op!("defined", "i": Out, "p": In, "ki": In),
    op!("defined", "i": Out, "p": In, "kic": In),
    // unary
    op!("not", "i": Out, "i": In),
    op!("not", "p": Out, "p": In),
    op!("neg", "i": InOut),
    op!("neg", "i": Out, "i": In),
    op!("neg", "n": InOut),
    op!("neg", "n": Out, "n": In),
    op!("neg", "p": Out, "p": In),
    op!("bnot", "i": Out, "i": In),
    op!("bnot", "p": Out, "p": In),
    // strings
    op!("concat", "s": InOut, "s": In),
    op!("concat", "s": InOut, "sc": In),
    op!("concat", "s": Out, "s": In, "s": In),
    op!("concat", "s": Out, "s": In, "sc": In),
    op!("concat", "p": InOut, "p": In),
    op!("concat", "p": Out, "p": In, "p": In),
    op!("substr", "s": Out, "s": In, "i": In, "i": In),
    op!("substr", "s": Out, "s": In, "i": In, "ic": In),
    op!("substr", "s": Out, "s": In, "ic": In, "ic": In),
    op!("substr", "s": InOut, "i": In, "ic": In, "s": In),
    op!("substr", "s": InOut, "i": In, "ic": In, "sc": In),
    op!("substr", "s": InOut, "ic": In, "ic": In, "s": In),
    op!("substr", "s": InOut, "ic": In, "ic": In, "sc": In),
    op!("length", "i": Out, "s": In),
    // counters
    op!("inc", "i": InOut),
    op!("inc", "n": InOut),
    op!("inc", "p": InOut),
    op!("dec", "i": InOut),
    op!("dec", "n": InOut),
    op!("dec", "p": InOut),
    // output
    op!("print", "i": In),
    op!("print", "ic": In),
    op!("print", "n": In),
    op!("print", "nc": In),
    op!("print", "s": In),
    op!("print", "sc": In),
    op!("print", "p": In),
    // control flow
    jump!("branch", "ic": In),
    jump!("if", "i": In, "ic": In),
    jump!("if", "n": In, "ic": In),
    jump!("if", "s": In, "ic": In),
    jump!("if", "p": In, "ic": In),
    jump!("unless", "i": In, "ic": In),
    jump!("unless", "n": In, "ic": In),
    jump!("unless", "s": In, "ic": In),
    jump!("unless", "p": In, "ic": In),
    jump!("bsr", "ic": In),
    jump!("ret"),
];

pub(crate) const ARITH_MNEMONICS: [&str; 5] = ["add", "sub", "mul", "div", "mod"];

pub(crate) const ARITH_FORMS: [&[(&str, ArgDir)]; 16] = [
    &[("i", InOut), ("i", In)],
    &[("i", InOut), ("ic", In)],
    &[("n", InOut), ("n", In)],
    &[("n", InOut), ("nc", In)],
    &[("i", Out), ("i", In), ("i", In)],
    &[("i", Out), ("i", In), ("ic", In)],
    &[("i", Out), ("ic", In), ("i", In)],
    &[("n", Out), ("n", In), ("n", In)],
    &[("n", Out), ("n", In), ("nc", In)],
    &[("n", Out), ("nc", In), ("n", In)],
    &[("p", InOut), ("p", In)],
    &[("p", InOut), ("i", In)],
    &[("p", InOut), ("ic", In)],
    &[("p", Out), ("p", In), ("p", In)],
    &[("p", Out), ("p", In), ("i", In)],
    &[("p", Out), ("p", In), ("ic", In)],
];

/// Shifts, logical and bitwise operators. Integer or pmc operands only.
pub(crate) const INTEGER_MNEMONICS: [&str; 9] =
    ["shl", "shr", "lsr", "and", "or", "xor", "band", "bor", "bxor"];

pub(crate) const INTEGER_FORMS: [&[(&str, ArgDir)]; 6] = [
    &[("i", InOut), ("i", In)],
    &[("i", InOut), ("ic", In)],
    &[("i", Out), ("i", In), ("i", In)],
    &[("i", Out), ("i", In), ("ic", In)],
    &[("p", Out), ("p", In), ("p", In)],
    &[("p", Out), ("p", In), ("i", In)],
];

pub(crate) const POW_FORMS: [&[(&str, ArgDir)]; 4] = [
    &[("n", Out), ("n", In), ("n", In)],
    &[("n", Out), ("n", In), ("nc", In)],
    &[("n", Out), ("n", In), ("i", In)],
    &[("n", Out), ("n", In), ("ic", In)],
];

pub(crate) const COMPARE_MNEMONICS: [&str; 6] = ["eq", "ne", "lt", "le", "gt", "ge"];

pub(crate) const COMPARE_FORMS: [&[(&str, ArgDir)]; 7] = [
    &[("i", In), ("i", In), ("ic", In)],
    &[("i", In), ("ic", In), ("ic", In)],
    &[("n", In), ("n", In), ("ic", In)],
    &[("n", In), ("nc", In), ("ic", In)],
    &[("s", In), ("s", In), ("ic", In)],
    &[("s", In), ("sc", In), ("ic", In)],
    &[("p", In), ("p", In), ("ic", In)],
];

pub(crate) const AGGREGATE_TYPES: [(&str, i64); 14] = [
    ("Undef", 0),
    ("Integer", 1),
    ("Float", 2),
    ("String", 3),
    ("Array", 4),
    ("Hash", 5),
    ("Key", 6),
    ("Sub", 7),
    ("PerlUndef", 8),
    ("PerlInt", 9),
    ("PerlNum", 10),
    ("PerlString", 11),
    ("PerlArray", 12),
    ("PerlHash", 13),
];
