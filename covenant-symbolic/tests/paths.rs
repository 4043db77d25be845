use covenant_ast::{AstBuilder, BinOp, Literal, PrimType};
use covenant_symbolic::{
    analyze_function, leaves, AnalysisOptions, AnalysisWarning, ProofTree, Term, TrackingStatus,
};

fn last_assertion(tree: &ProofTree) -> String {
    tree.env()
        .and_then(|env| env.last_assertion())
        .map(Term::to_string)
        .expect("node with an assertion")
}

#[test]
fn literal_conditional_splits_into_two_guarded_returns() {
    let mut b = AstBuilder::new();
    let x = b.param("x", PrimType::Integer);
    let (xv, ten) = (b.var(&x), b.int(10));
    let guard = b.binary(BinOp::Gt, xv, ten);
    let (one, two) = (b.int(1), b.int(2));
    let body = vec![b.if_(guard, one, two)];
    let func = b.function("classify", vec![x.clone()], body);

    let analysis = analyze_function(&func, &AnalysisOptions::default());

    let ProofTree::IfBranch {
        env,
        guard,
        then_branch,
        else_branch,
    } = &analysis.tree
    else {
        panic!("expected IfBranch, got {:?}", analysis.tree);
    };
    let guard_text = format!("(> x_{} 10)", x.id);
    assert_eq!(guard.to_string(), guard_text);
    assert_eq!(env.assertions().count(), 0, "branch node keeps the pre-branch state");

    assert!(matches!(
        then_branch.as_ref(),
        ProofTree::ReturnLiteral { value: Literal::Integer(1), .. }
    ));
    assert!(matches!(
        else_branch.as_ref(),
        ProofTree::ReturnLiteral { value: Literal::Integer(2), .. }
    ));
    assert_eq!(last_assertion(then_branch), guard_text);
    assert_eq!(last_assertion(else_branch), format!("(not {guard_text})"));
    assert!(analysis.warnings.is_empty());
}

#[test]
fn final_enforce_returns_unit() {
    let mut b = AstBuilder::new();
    let amount = b.param("amount", PrimType::Decimal);
    let balance = b.param("balance", PrimType::Decimal);
    let (av, bv) = (b.var(&amount), b.var(&balance));
    let guard = b.binary(BinOp::Le, av, bv);
    let body = vec![b.enforce(guard, "Insufficient funds")];
    let func = b.function("withdraw", vec![amount.clone(), balance.clone()], body);

    let analysis = analyze_function(&func, &AnalysisOptions::default());

    match &analysis.tree {
        ProofTree::EnforceConstraint {
            env,
            guard,
            message,
            continuation,
        } => {
            assert_eq!(message, "Insufficient funds");
            assert_eq!(
                guard.to_string(),
                format!("(<= amount_{} balance_{})", amount.id, balance.id)
            );
            assert_eq!(env.declarations().count(), 2);
            assert_eq!(continuation.as_ref(), &ProofTree::ReturnUnit);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn enforce_in_the_middle_assumes_its_guard() {
    let mut b = AstBuilder::new();
    let x = b.param("x", PrimType::Integer);
    let (xv, zero) = (b.var(&x), b.int(0));
    let guard = b.binary(BinOp::Ge, xv, zero);
    let check = b.enforce(guard, "negative");
    let result = b.var(&x);
    let func = b.function("id", vec![x.clone()], vec![check, result]);

    let analysis = analyze_function(&func, &AnalysisOptions::default());

    let ProofTree::EnforceConstraint { continuation, .. } = &analysis.tree else {
        panic!("expected EnforceConstraint");
    };
    match continuation.as_ref() {
        ProofTree::ReturnVariable { env, variable } => {
            assert_eq!(variable.name.as_str(), format!("x_{}", x.id));
            assert_eq!(
                env.last_assertion().map(Term::to_string),
                Some(format!("(>= x_{} 0)", x.id))
            );
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn with_read_then_update_binds_column_and_written_field() {
    let mut b = AstBuilder::new();
    let acct = b.param("acct", PrimType::String);
    let amount = b.param("amount", PrimType::Decimal);
    let col = b.column("balance", "balance", Some(PrimType::Decimal));

    let (bv, av) = (b.var(&col), b.var(&amount));
    let new_balance = b.binary(BinOp::Sub, bv, av);
    let key = b.var(&acct);
    let update = b.update("accounts", key, vec![("balance", new_balance)]);
    let key = b.var(&acct);
    let body = vec![b.with_read("accounts", key, vec![col.clone()], vec![update])];
    let func = b.function("debit", vec![acct.clone(), amount.clone()], body);

    let analysis = analyze_function(&func, &AnalysisOptions::default());

    let ProofTree::WithRead {
        env: read_env,
        table,
        key,
        continuation,
    } = &analysis.tree
    else {
        panic!("expected WithRead, got {:?}", analysis.tree);
    };
    assert_eq!(table, "accounts");
    assert_eq!(key.to_string(), format!("acct_{}", acct.id));
    let balance = format!("balance_{}", col.id);
    assert_eq!(
        read_env.last_assertion().map(Term::to_string),
        Some(format!("(= {balance} accounts_read_balance)"))
    );

    let ProofTree::TableUpdate {
        env: write_env,
        table,
        continuation,
        ..
    } = continuation.as_ref()
    else {
        panic!("expected TableUpdate, got {continuation:?}");
    };
    assert_eq!(table, "accounts");
    assert_eq!(
        write_env.last_assertion().map(Term::to_string),
        Some(format!(
            "(= accounts_update_balance (- {balance} amount_{}))",
            amount.id
        ))
    );
    assert_eq!(continuation.as_ref(), &ProofTree::Terminate);
}

#[test]
fn insert_derives_one_variable_per_field() {
    let mut b = AstBuilder::new();
    let owner = b.param("owner", PrimType::String);
    let ks = b.param("ks", PrimType::Keyset);
    let key = b.string("alice");
    let (ov, zero, kv) = (b.var(&owner), b.decimal(0, 0), b.var(&ks));
    let insert = b.insert(
        "accounts",
        key,
        vec![("owner", ov), ("balance", zero), ("guard", kv)],
    );
    let func = b.function("create", vec![owner, ks], vec![insert]);

    let analysis = analyze_function(&func, &AnalysisOptions::default());

    let ProofTree::TableInsert { env, key, .. } = &analysis.tree else {
        panic!("expected TableInsert");
    };
    assert_eq!(key.to_string(), "\"alice\"");
    let declared: Vec<(String, Option<&str>)> = env
        .declarations()
        .map(|(n, s)| (n.to_string(), s.map(|s| s.as_smtlib())))
        .collect();
    assert!(declared.contains(&("accounts_insert_owner".to_string(), Some("String"))));
    assert!(declared.contains(&("accounts_insert_balance".to_string(), Some("Real"))));
    assert!(declared.contains(&("accounts_insert_guard".to_string(), None)));
    // keyset-typed params and fields are declared but never equated
    assert_eq!(env.assertions().count(), 2);
}

#[test]
fn repeated_writes_get_distinct_symbols() {
    let mut b = AstBuilder::new();
    let (k1, v1) = (b.string("a"), b.int(1));
    let first = b.update("counters", k1, vec![("n", v1)]);
    let (k2, v2) = (b.string("a"), b.int(2));
    let second = b.update("counters", k2, vec![("n", v2)]);
    let func = b.function("bump", vec![], vec![first, second]);

    let analysis = analyze_function(&func, &AnalysisOptions::default());

    let ProofTree::TableUpdate { continuation, .. } = &analysis.tree else {
        panic!("expected TableUpdate");
    };
    let env = continuation.env().expect("second update");
    let names: Vec<String> = env.declarations().map(|(n, _)| n.to_string()).collect();
    assert_eq!(names, ["counters_update_n", "counters_update_n_1"]);
}

#[test]
fn keyset_check_adds_no_assertion() {
    let mut b = AstBuilder::new();
    let check = b.enforce_keyset("admin-keyset");
    let done = b.string("ok");
    let func = b.function("admin", vec![], vec![check, done]);

    let analysis = analyze_function(&func, &AnalysisOptions::default());

    match &analysis.tree {
        ProofTree::EnforceKeySet {
            env,
            keyset,
            continuation,
        } => {
            assert_eq!(keyset, "admin-keyset");
            assert_eq!(env.commands().count(), 0);
            assert!(matches!(
                continuation.as_ref(),
                ProofTree::ReturnLiteral { env, .. } if env.commands().count() == 0
            ));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn let_bindings_see_only_earlier_siblings() {
    let mut b = AstBuilder::new();
    let x = b.param("x", PrimType::Integer);

    let (xv, one) = (b.var(&x), b.int(1));
    let a_value = b.binary(BinOp::Add, xv, one);
    let a = b.binding("a", Some(PrimType::Integer), a_value);
    let (av, two) = (b.var(&a), b.int(2));
    let b_value = b.binary(BinOp::Mul, av, two);
    let second = b.binding("b", Some(PrimType::Integer), b_value);
    let result = b.var(&second);
    let body = vec![b.let_(vec![a.clone(), second.clone()], vec![result])];
    let func = b.function("scale", vec![x.clone()], body);

    let analysis = analyze_function(&func, &AnalysisOptions::default());

    let ProofTree::ReturnVariable { env, variable } = &analysis.tree else {
        panic!("expected ReturnVariable, got {:?}", analysis.tree);
    };
    assert_eq!(variable.status, TrackingStatus::Tracked);
    let assertions: Vec<String> = env.assertions().map(Term::to_string).collect();
    assert_eq!(
        assertions,
        [
            format!("(= a_{} (+ x_{} 1))", a.id, x.id),
            format!("(= b_{} (* a_{} 2))", second.id, a.id),
        ]
    );
}

#[test]
fn forward_reference_in_group_loses_track() {
    let mut b = AstBuilder::new();
    let five = b.int(5);
    let late = b.binding("late", Some(PrimType::Integer), five);
    let early_value = b.var(&late);
    let early = b.binding("early", Some(PrimType::Integer), early_value);
    let result = b.var(&early);
    let body = vec![b.let_(vec![early, late], vec![result])];
    let func = b.function("order", vec![], body);

    let analysis = analyze_function(&func, &AnalysisOptions::default());

    let ProofTree::ReturnVariable { variable, env } = &analysis.tree else {
        panic!("expected ReturnVariable");
    };
    assert!(matches!(variable.status, TrackingStatus::LostTrack(_)));
    assert_eq!(env.assertions().count(), 1, "only `late` is equated");
    assert!(matches!(
        analysis.warnings.as_slice(),
        [AnalysisWarning::LostTrack { .. }]
    ));
}

#[test]
fn duplicate_binding_cuts_only_its_path() {
    let mut b = AstBuilder::new();
    let x = b.param("x", PrimType::Integer);
    let (xv, zero) = (b.var(&x), b.int(0));
    let guard = b.binary(BinOp::Gt, xv, zero);
    let check = b.enforce(guard, "positive");
    let three = b.int(3);
    let shadow = b.binding("x", Some(PrimType::Integer), three);
    let shadowed = b.let_(vec![shadow], vec![]);
    let func = b.function("shadow", vec![x], vec![check, shadowed]);

    let analysis = analyze_function(&func, &AnalysisOptions::default());

    let ProofTree::EnforceConstraint { continuation, .. } = &analysis.tree else {
        panic!("the enforce before the bad binding is kept");
    };
    match continuation.as_ref() {
        ProofTree::CannotAnalyze { reason, env } => {
            assert_eq!(reason.kind(), "DuplicateBinding");
            assert_eq!(env.declarations().count(), 1);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn let_scope_ends_with_its_body() {
    let mut b = AstBuilder::new();
    let amount = b.param("amount", PrimType::Integer);
    let amount_sym = format!("amount_{}", amount.id);

    let one = b.int(1);
    let first = b.binding("x", Some(PrimType::Integer), one);
    let first_sym = format!("x_{}", first.id);
    let (xv, zero) = (b.var(&first), b.int(0));
    let guard = b.binary(BinOp::Gt, xv, zero);
    let inner = b.enforce(guard, "first");
    let first_group = b.let_(vec![first], vec![inner]);

    let (av, zero) = (b.var(&amount), b.int(0));
    let guard = b.binary(BinOp::Gt, av, zero);
    let after = b.enforce(guard, "after");

    let two = b.int(2);
    let second = b.binding("x", Some(PrimType::Integer), two);
    let second_sym = format!("x_{}", second.id);
    let xv = b.var(&second);
    let second_group = b.let_(vec![second], vec![xv]);

    let func = b.function("rebind", vec![amount], vec![first_group, after, second_group]);
    let analysis = analyze_function(&func, &AnalysisOptions::default());

    assert!(
        leaves(&analysis.tree)
            .iter()
            .all(|l| l.outcome.kind() != "unanalyzable"),
        "{:?}",
        analysis.tree
    );

    let ProofTree::EnforceConstraint { continuation, .. } = &analysis.tree else {
        panic!("expected the enforce inside the first group");
    };
    let ProofTree::EnforceConstraint {
        env,
        message,
        continuation,
        ..
    } = continuation.as_ref()
    else {
        panic!("expected the enforce after the first group");
    };
    assert_eq!(message, "after");
    assert!(!env.is_live("x"), "group names are not live after the group");
    let declared: Vec<&str> = env.declarations().map(|(n, _)| n.as_str()).collect();
    assert_eq!(declared, [amount_sym.as_str(), first_sym.as_str()]);
    let assertions: Vec<String> = env.assertions().map(Term::to_string).collect();
    assert_eq!(
        assertions,
        [format!("(= {first_sym} 1)"), format!("(> {first_sym} 0)")]
    );

    match continuation.as_ref() {
        ProofTree::ReturnVariable { variable, env } => {
            assert_eq!(variable.name.as_str(), second_sym);
            assert_eq!(env.declarations().count(), 3);
            assert_eq!(
                env.last_assertion().map(Term::to_string),
                Some(format!("(= {second_sym} 2)"))
            );
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn sequential_with_reads_rebind_the_projection() {
    let mut b = AstBuilder::new();
    let acct = b.param("acct", PrimType::String);

    let first = b.column("balance", "bal", Some(PrimType::Decimal));
    let first_sym = format!("bal_{}", first.id);
    let key = b.var(&acct);
    let first_read = b.with_read("accounts", key, vec![first], vec![]);

    let second = b.column("balance", "bal", Some(PrimType::Decimal));
    let second_sym = format!("bal_{}", second.id);
    let key = b.var(&acct);
    let second_read = b.with_read("accounts", key, vec![second], vec![]);

    let func = b.function("audit", vec![acct], vec![first_read, second_read]);
    let analysis = analyze_function(&func, &AnalysisOptions::default());

    let ProofTree::WithRead { continuation, .. } = &analysis.tree else {
        panic!("expected WithRead, got {:?}", analysis.tree);
    };
    let ProofTree::WithRead {
        env, continuation, ..
    } = continuation.as_ref()
    else {
        panic!("expected the second read to be analyzed, got {continuation:?}");
    };
    assert_eq!(continuation.as_ref(), &ProofTree::Terminate);
    let assertions: Vec<String> = env.assertions().map(Term::to_string).collect();
    assert_eq!(
        assertions,
        [
            format!("(= {first_sym} accounts_read_balance)"),
            format!("(= {second_sym} accounts_read_balance_1)"),
        ]
    );

    let paths = leaves(&analysis.tree);
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].outcome.kind(), "terminated");
}

#[test]
fn nested_group_cannot_rebind_an_enclosing_name() {
    let mut b = AstBuilder::new();
    let one = b.int(1);
    let outer = b.binding("x", Some(PrimType::Integer), one);
    let two = b.int(2);
    let inner = b.binding("x", Some(PrimType::Integer), two);
    let inner_group = b.let_(vec![inner], vec![]);
    let outer_group = b.let_(vec![outer], vec![inner_group]);
    let func = b.function("nested", vec![], vec![outer_group]);

    let analysis = analyze_function(&func, &AnalysisOptions::default());

    match &analysis.tree {
        ProofTree::CannotAnalyze { reason, .. } => assert_eq!(reason.kind(), "DuplicateBinding"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn unsupported_statements_become_cannot_analyze() {
    let mut b = AstBuilder::new();
    let key = b.string("k");
    let read = b.read("accounts", key);
    let func = b.function("peek", vec![], vec![read]);
    let analysis = analyze_function(&func, &AnalysisOptions::default());
    match &analysis.tree {
        ProofTree::CannotAnalyze { reason, .. } => assert_eq!(reason.kind(), "UnsupportedType"),
        other => panic!("unexpected {other:?}"),
    }

    let call = b.call("format", vec![], Some(PrimType::String));
    let func = b.function("fmt", vec![], vec![call]);
    let analysis = analyze_function(&func, &AnalysisOptions::default());
    match &analysis.tree {
        ProofTree::CannotAnalyze { reason, .. } => {
            assert_eq!(reason.kind(), "UnsupportedConstruct");
            assert!(reason.to_string().contains("format"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn malformed_row_key_is_reported_on_the_path() {
    let mut b = AstBuilder::new();
    let (p1, p2) = (b.string("a"), b.string("b"));
    let key = b.call("concat", vec![p1, p2], Some(PrimType::String));
    let value = b.int(1);
    let write = b.update("t", key, vec![("n", value)]);
    let func = b.function("bad-key", vec![], vec![write]);

    let analysis = analyze_function(&func, &AnalysisOptions::default());

    match &analysis.tree {
        ProofTree::CannotAnalyze { reason, .. } => {
            assert_eq!(reason.kind(), "UnsupportedConstruct");
            assert!(reason.to_string().contains("row key"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn conditional_with_computed_branches_is_unsupported() {
    let mut b = AstBuilder::new();
    let x = b.param("x", PrimType::Integer);
    let cond = b.boolean(true);
    let then_branch = b.var(&x);
    let else_branch = b.int(0);
    let body = vec![b.if_(cond, then_branch, else_branch)];
    let func = b.function("pick", vec![x], body);

    let analysis = analyze_function(&func, &AnalysisOptions::default());
    assert_eq!(analysis.tree.kind(), "CannotAnalyze");
}

#[test]
fn duplicate_parameters_poison_the_whole_function() {
    let mut b = AstBuilder::new();
    let first = b.param("x", PrimType::Integer);
    let second = b.param("x", PrimType::Integer);
    let body = vec![b.int(1)];
    let func = b.function("twice", vec![first, second], body);

    let analysis = analyze_function(&func, &AnalysisOptions::default());
    match &analysis.tree {
        ProofTree::CannotAnalyze { reason, .. } => assert_eq!(reason.kind(), "DuplicateBinding"),
        other => panic!("unexpected {other:?}"),
    }
}
