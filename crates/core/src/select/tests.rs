use imcc_ops::CoreOps;

use super::*;
use crate::instruction::StructuralKind;
use crate::symbols::SymbolError;

fn local(selector: &mut Selector<'_, CoreOps>, name: &str, class: ValueClass) -> SymbolId {
    selector
        .symbols_mut()
        .declare(name, class)
        .expect("declare local")
}

fn rendered(selector: &Selector<'_, CoreOps>) -> Vec<String> {
    selector
        .instructions()
        .iter()
        .map(|instruction| instruction.render(selector.symbols()))
        .collect()
}

#[test]
fn keyed_fetch_from_aggregate_sets_container_bit() {
    let ops = CoreOps::new();
    let mut selector = Selector::new(&ops, SelectorConfig::default()).expect("default config");
    let result = local(&mut selector, "result", ValueClass::Aggregate);
    let container = local(&mut selector, "container", ValueClass::Aggregate);
    let key = local(&mut selector, "key", ValueClass::Integer);

    let id = selector
        .indexed_fetch(result, container, key)
        .expect("keyed fetch");

    let insn = selector.instruction(id);
    assert_eq!(selector.instructions().len(), 1);
    assert_eq!(insn.full_name, "set_p_p_ki");
    assert!(insn.keyed.contains(1));
    assert_eq!(insn.keyed.count(), 1);
    assert_eq!(rendered(&selector), vec!["set result, container[key]"]);
}

#[test]
fn string_index_fetch_uses_substr() {
    let ops = CoreOps::new();
    let mut selector = Selector::new(&ops, SelectorConfig::default()).expect("default config");
    let dest = local(&mut selector, "dest", ValueClass::String);
    let text = local(&mut selector, "s", ValueClass::String);
    let index = local(&mut selector, "i", ValueClass::Integer);

    let id = selector
        .indexed_fetch(dest, text, index)
        .expect("substr fetch");

    let insn = selector.instruction(id);
    assert_eq!(insn.full_name, "substr_s_s_i_ic");
    assert!(insn.keyed.is_empty());
    assert_eq!(rendered(&selector), vec!["substr dest, s, i, 1"]);
}

#[test]
fn two_keyed_operands_expand_into_four_steps() {
    let ops = CoreOps::new();
    let mut selector = Selector::new(&ops, SelectorConfig::default()).expect("default config");
    let c = local(&mut selector, "c", ValueClass::Aggregate);
    let k1 = local(&mut selector, "k1", ValueClass::Integer);
    let x = local(&mut selector, "x", ValueClass::Aggregate);
    let k2 = local(&mut selector, "k2", ValueClass::Integer);

    let mut context = selector.context();
    context.append_keyed(c, k1).expect("c[k1]");
    context.append_keyed(x, k2).expect("x[k2]");
    let first = selector.resolve("add", context).expect("multi-key add");

    assert_eq!(first, InsnId(0));
    assert_eq!(
        rendered(&selector),
        vec![
            "set $P2, x[k2]",
            "set $P1, c[k1]",
            "add $P1, $P2",
            "set c[k1], $P1",
        ]
    );
    let write_back = &selector.instructions()[3];
    assert_eq!(write_back.full_name, "set_p_ki_p");
    assert!(write_back.keyed.contains(0));
    assert!(selector.instructions()[2].keyed.is_empty());
}

#[test]
fn out_destination_is_initialised_with_new() {
    let ops = CoreOps::new();
    let config = SelectorConfig {
        max_arity: 6,
        ..SelectorConfig::default()
    };
    let mut selector = Selector::new(&ops, config).expect("valid config");
    let a = local(&mut selector, "a", ValueClass::Aggregate);
    let b = local(&mut selector, "b", ValueClass::Aggregate);
    let c = local(&mut selector, "c", ValueClass::Aggregate);
    let zero = selector.symbols_mut().constant("0", ValueClass::Integer);
    let name = selector.symbols_mut().constant("n", ValueClass::String);

    let mut context = selector.context();
    context.append_keyed(a, zero).expect("a[0]");
    context.append_keyed(b, name).expect("b[\"n\"]");
    context.append(c).expect("c");
    selector.resolve("mul", context).expect("multi-key mul");

    assert_eq!(
        rendered(&selector),
        vec![
            "set $P2, b[\"n\"]",
            "set $P3, c",
            "new $P1, 0",
            "mul $P1, $P2, $P3",
            "set a[0], $P1",
        ]
    );
    assert_eq!(selector.instructions()[1].kind, StructuralKind::RegisterAlias);
}

#[test]
fn temporaries_never_collide_with_existing_names() {
    let ops = CoreOps::new();
    let mut selector = Selector::new(&ops, SelectorConfig::default()).expect("default config");
    local(&mut selector, "$P1", ValueClass::Aggregate);
    local(&mut selector, "$P3", ValueClass::Aggregate);
    let c = local(&mut selector, "c", ValueClass::Aggregate);
    let x = local(&mut selector, "x", ValueClass::Aggregate);
    let key = selector.symbols_mut().constant("1", ValueClass::Integer);

    let mut context = selector.context();
    context.append_keyed(c, key).expect("c[1]");
    context.append_keyed(x, key).expect("x[1]");
    selector.resolve("sub", context).expect("multi-key sub");

    assert_eq!(selector.instructions().len(), 4);
    let operation = &selector.instructions()[2];
    let temps = operation
        .operands
        .iter()
        .map(|id| selector.symbols().get(*id).name.clone())
        .collect::<Vec<_>>();
    assert_eq!(temps, vec!["$P2", "$P4"]);
}

#[test]
fn unknown_signature_fails_closed() {
    let ops = CoreOps::new();
    let mut selector = Selector::new(&ops, SelectorConfig::default()).expect("default config");
    let a = local(&mut selector, "a", ValueClass::Integer);
    let b = local(&mut selector, "b", ValueClass::Integer);

    let mut context = selector.context();
    context.append(a).expect("a");
    context.append(b).expect("b");
    let err = selector
        .resolve("frobnicate", context)
        .expect_err("frobnicate is not in the catalog");

    let SelectError::UnresolvedOpcode {
        mnemonic,
        full_name,
        signature,
    } = err
    else {
        panic!("expected unresolved opcode");
    };
    assert_eq!(mnemonic, "frobnicate");
    assert_eq!(full_name, "frobnicate_i_i");
    assert_eq!(signature.to_string(), "(i, i)");
    assert!(selector.instructions().is_empty());
}

#[test]
fn keyed_fetch_from_string_into_aggregate_is_illegal() {
    let ops = CoreOps::new();
    let mut selector = Selector::new(&ops, SelectorConfig::default()).expect("default config");
    let p = local(&mut selector, "p", ValueClass::Aggregate);
    let q = local(&mut selector, "q", ValueClass::String);
    let k = local(&mut selector, "k", ValueClass::Integer);

    let err = selector.indexed_fetch(p, q, k).expect_err("q is a string");
    assert_eq!(
        err,
        SelectError::IllegalKeyedOperand {
            name: "q".to_string(),
            class: ValueClass::String,
        }
    );
    assert!(selector.instructions().is_empty());
}

#[test]
fn multi_key_checks_every_container_before_emitting() {
    let ops = CoreOps::new();
    let mut selector = Selector::new(&ops, SelectorConfig::default()).expect("default config");
    let c = local(&mut selector, "c", ValueClass::Aggregate);
    let s = local(&mut selector, "s", ValueClass::String);
    let k = local(&mut selector, "k", ValueClass::Integer);
    let symbols_before = selector.symbols().len();

    let mut context = selector.context();
    context.append_keyed(c, k).expect("c[k]");
    context.append_keyed(s, k).expect("s[k]");
    let err = selector.resolve("add", context).expect_err("s is a string");

    assert!(matches!(err, SelectError::IllegalKeyedOperand { ref name, .. } if name == "s"));
    assert!(selector.instructions().is_empty());
    assert_eq!(selector.symbols().len(), symbols_before);
}

#[test]
fn multi_key_with_unresolvable_operation_emits_nothing() {
    let ops = CoreOps::new();
    let mut selector = Selector::new(&ops, SelectorConfig::default()).expect("default config");
    let c = local(&mut selector, "c", ValueClass::Aggregate);
    let k = local(&mut selector, "k", ValueClass::Integer);

    let mut context = selector.context();
    context.append_keyed(c, k).expect("c[k]");
    context.append_keyed(c, k).expect("c[k]");
    let symbols_before = selector.symbols().len();
    let err = selector
        .resolve("length", context)
        .expect_err("no length_p_p");
    assert!(matches!(err, SelectError::UnresolvedOpcode { .. }));
    assert!(selector.instructions().is_empty());
    assert_eq!(selector.symbols().len(), symbols_before);
    assert!(selector.symbols().lookup("$P1").is_none());

    let mut context = selector.context();
    context.append_keyed(c, k).expect("c[k]");
    context.append_keyed(c, k).expect("c[k]");
    selector.resolve("set", context).expect("keyed copy");
    assert_eq!(rendered(&selector)[0], "set $P2, c[k]");
}

#[test]
fn selector_rejects_an_out_of_range_arity() {
    let ops = CoreOps::new();
    let config = SelectorConfig {
        max_arity: 17,
        ..SelectorConfig::default()
    };
    let err = Selector::new(&ops, config)
        .err()
        .expect("arity above the limit");
    assert!(matches!(err, ConfigError::ArityOutOfRange { value: 17 }));
}

#[test]
fn keyed_store_on_aggregate_marks_position_zero() {
    let ops = CoreOps::new();
    let mut selector = Selector::new(&ops, SelectorConfig::default()).expect("default config");
    let c = local(&mut selector, "c", ValueClass::Aggregate);
    let k = local(&mut selector, "k", ValueClass::Integer);
    let v = local(&mut selector, "v", ValueClass::String);

    let id = selector.indexed_store(c, k, v).expect("keyed store");
    let insn = selector.instruction(id);
    assert_eq!(insn.full_name, "set_p_ki_s");
    assert!(insn.keyed.contains(0));
    assert!(insn.directions.in_out(0));
    assert_eq!(rendered(&selector), vec!["set c[k], v"]);
}

#[test]
fn string_index_store_replaces_one_character() {
    let ops = CoreOps::new();
    let mut selector = Selector::new(&ops, SelectorConfig::default()).expect("default config");
    let s = local(&mut selector, "s", ValueClass::String);
    let i = local(&mut selector, "i", ValueClass::Integer);
    let v = local(&mut selector, "v", ValueClass::String);

    let id = selector.indexed_store(s, i, v).expect("substr store");
    assert_eq!(selector.instruction(id).full_name, "substr_s_i_ic_s");
    assert!(selector.instruction(id).keyed.is_empty());
    assert_eq!(rendered(&selector), vec!["substr s, i, 1, v"]);
}

#[test]
fn store_into_integer_container_is_unsupported() {
    let ops = CoreOps::new();
    let mut selector = Selector::new(&ops, SelectorConfig::default()).expect("default config");
    let n = local(&mut selector, "n", ValueClass::Integer);
    let k = local(&mut selector, "k", ValueClass::Integer);
    let v = local(&mut selector, "v", ValueClass::Integer);

    let err = selector
        .indexed_store(n, k, v)
        .expect_err("integers are not indexable");
    assert_eq!(
        err,
        SelectError::UnsupportedIndexedAssignment {
            container: ValueClass::Integer,
            key: ValueClass::Integer,
            value: ValueClass::Integer,
        }
    );
}

#[test]
fn aggregate_copy_is_an_alias_and_other_copies_are_plain() {
    let ops = CoreOps::new();
    let mut selector = Selector::new(&ops, SelectorConfig::default()).expect("default config");
    let p0 = local(&mut selector, "p0", ValueClass::Aggregate);
    let p1 = local(&mut selector, "p1", ValueClass::Aggregate);
    let s0 = local(&mut selector, "s0", ValueClass::String);
    let s1 = local(&mut selector, "s1", ValueClass::String);

    let mut context = selector.context();
    context.append(p0).expect("p0");
    context.append(p1).expect("p1");
    let alias = selector.resolve("set", context).expect("alias");

    let mut context = selector.context();
    context.append(s0).expect("s0");
    context.append(s1).expect("s1");
    let copy = selector.resolve("set", context).expect("copy");

    assert_eq!(selector.instruction(alias).kind, StructuralKind::RegisterAlias);
    assert_eq!(selector.instruction(copy).kind, StructuralKind::Plain);
}

#[test]
fn jumps_are_branches_except_call_and_return() {
    let ops = CoreOps::new();
    let mut selector = Selector::new(&ops, SelectorConfig::default()).expect("default config");
    let flag = local(&mut selector, "flag", ValueClass::Integer);
    let target = selector.symbols_mut().address("done").expect("label");

    let mut context = selector.context();
    context.append(target).expect("target");
    let goto = selector.resolve("branch", context).expect("branch");

    let mut context = selector.context();
    context.append(flag).expect("flag");
    context.append(target).expect("target");
    let conditional = selector.resolve("unless", context).expect("unless");

    let mut context = selector.context();
    context.append(flag).expect("flag");
    context.append(flag).expect("flag");
    context.append(target).expect("target");
    let compare = selector.resolve("lt", context).expect("lt");

    let mut context = selector.context();
    context.append(target).expect("target");
    let call = selector.resolve("bsr", context).expect("bsr");
    let ret = selector.resolve("ret", selector.context()).expect("ret");

    assert_eq!(
        selector.instruction(goto).kind,
        StructuralKind::Branch {
            target_arg: 0,
            unconditional: true,
        }
    );
    assert_eq!(
        selector.instruction(conditional).kind,
        StructuralKind::Branch {
            target_arg: 1,
            unconditional: false,
        }
    );
    assert_eq!(
        selector.instruction(compare).kind,
        StructuralKind::Branch {
            target_arg: 2,
            unconditional: false,
        }
    );
    assert_eq!(selector.instruction(compare).target(), Some(target));
    assert_eq!(selector.instruction(call).kind, StructuralKind::Plain);
    assert_eq!(selector.instruction(ret).kind, StructuralKind::Plain);
}

#[test]
fn set_addr_takes_the_address_of_its_second_operand() {
    let ops = CoreOps::new();
    let mut selector = Selector::new(&ops, SelectorConfig::default()).expect("default config");
    let dest = local(&mut selector, "dest", ValueClass::Integer);
    let target = selector.symbols_mut().address("handler").expect("label");

    let mut context = selector.context();
    context.append(dest).expect("dest");
    context.append(target).expect("target");
    let id = selector.resolve("set_addr", context).expect("set_addr");

    let insn = selector.instruction(id);
    assert_eq!(insn.full_name, "set_addr_i_ic");
    assert_eq!(insn.kind, StructuralKind::AddressTaking { target_arg: 1 });
    assert_eq!(insn.target(), Some(target));
}

#[test]
fn resolution_is_deterministic() {
    let ops = CoreOps::new();
    let mut selector = Selector::new(&ops, SelectorConfig::default()).expect("default config");
    let a = local(&mut selector, "a", ValueClass::Float);
    let pi = selector.symbols_mut().constant("3.14", ValueClass::Float);

    let mut ids = Vec::new();
    for _ in 0..2 {
        let mut context = selector.context();
        context.append(a).expect("a");
        context.append(pi).expect("pi");
        ids.push(selector.resolve("add", context).expect("add"));
    }

    let first = selector.instruction(ids[0]);
    let second = selector.instruction(ids[1]);
    assert_eq!(first.full_name, "add_n_nc");
    assert_eq!(first.full_name, second.full_name);
    assert_eq!(first.kind, second.kind);
    assert!(first.directions.in_out(0));
    assert!(first.directions.reads(1));
}

#[test]
fn nested_keys_collapse_into_one_key_operand() {
    let ops = CoreOps::new();
    let mut selector = Selector::new(&ops, SelectorConfig::default()).expect("default config");
    let dest = local(&mut selector, "dest", ValueClass::Aggregate);
    let table = local(&mut selector, "table", ValueClass::Aggregate);
    let outer = selector.symbols_mut().constant("a", ValueClass::String);
    let inner = selector.symbols_mut().constant("b", ValueClass::String);

    let mut chain = crate::symbols::KeyChain::new(outer);
    chain.push(inner);
    let key = chain.collapse(selector.symbols_mut());
    let id = selector
        .indexed_fetch(dest, table, key)
        .expect("nested fetch");

    assert_eq!(selector.instruction(id).full_name, "set_p_p_kc");
    assert_eq!(rendered(&selector), vec!["set dest, table[\"a\";\"b\"]"]);
}

#[test]
fn context_rejects_operands_past_max_arity() {
    let ops = CoreOps::new();
    let selector = Selector::new(&ops, SelectorConfig::default()).expect("default config");
    let mut context = selector.context();
    for _ in 0..4 {
        context.append(SymbolId(0)).expect("within arity");
    }
    assert_eq!(
        context.append(SymbolId(0)),
        Err(SelectError::ArityExceeded { max: 4 })
    );

    context.clear();
    assert_eq!(context.arity(), 0);
    assert!(context.keyed().is_empty());
}

#[test]
fn unknown_init_type_is_reported() {
    let ops = CoreOps::new();
    let config = SelectorConfig {
        max_arity: 6,
        init_type: "Frob".to_string(),
    };
    let mut selector = Selector::new(&ops, config).expect("valid config");
    let a = local(&mut selector, "a", ValueClass::Aggregate);
    let k = local(&mut selector, "k", ValueClass::Integer);

    let mut context = selector.context();
    context.append_keyed(a, k).expect("a[k]");
    context.append_keyed(a, k).expect("a[k]");
    context.append_keyed(a, k).expect("a[k]");
    let err = selector
        .resolve("add", context)
        .expect_err("unknown init type");
    assert_eq!(
        err,
        SelectError::UnknownAggregateType {
            name: "Frob".to_string()
        }
    );
    assert!(selector.instructions().is_empty());
}

#[test]
fn labels_are_defined_once() {
    let ops = CoreOps::new();
    let mut selector = Selector::new(&ops, SelectorConfig::default()).expect("default config");
    let id = selector.label("loop").expect("label");
    assert_eq!(selector.instruction(id).kind, StructuralKind::Label);

    let err = selector.label("loop").expect_err("redefined");
    assert_eq!(
        err,
        SelectError::Symbol(SymbolError::Redefined {
            name: "loop".to_string()
        })
    );
}

#[test]
#[should_panic(expected = "has no key")]
fn keyed_bit_without_key_is_a_contract_violation() {
    let ops = CoreOps::new();
    let mut selector = Selector::new(&ops, SelectorConfig::default()).expect("default config");
    let p = local(&mut selector, "p", ValueClass::Aggregate);
    let mut context = selector.context();
    context.append(p).expect("p");
    context.set_keyed(0);
    let _ = selector.resolve("inc", context);
}
