// SPDX-FileCopyrightText: 2025 ECHIDNA Project Team
// SPDX-License-Identifier: PMPL-1.0-or-later

// Property-based tests for the driver's invariants

#[cfg(test)]
mod property_tests {
    use proofdriver::config::NamingConfig;
    use proofdriver::math_object::naming::{fresh_name, hypothesis_name};
    use proofdriver::parsers::parse_math_object;
    use proofdriver::proof_state::Goal;
    use proofdriver::proof_tree::{CursorMove, ProofStep};
    use proofdriver::{MathObject, NodeKind, ProofState, ProofTree, TacticCode, UserAction};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn arb_tactic() -> impl Strategy<Value = TacticCode> {
        let leaf = prop_oneof![
            Just("assumption"),
            Just("linarith"),
            Just("have H1 := H a"),
            Just("apply H"),
            Just("rw h at k"),
            Just("norm_num"),
        ]
        .prop_map(TacticCode::atomic);
        leaf.prop_recursive(4, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 1..4).prop_map(TacticCode::and_then_all),
                (inner.clone(), prop::collection::vec(inner.clone(), 0..3))
                    .prop_map(|(first, rest)| TacticCode::or_else_all(first, rest)),
                inner.clone().prop_map(TacticCode::try_),
                inner.prop_map(TacticCode::solve1),
            ]
        })
    }

    fn prop_var(name: &'static str) -> MathObject {
        MathObject::local_constant(name, format!("0.{name}"), MathObject::prop())
    }

    fn arb_proposition() -> impl Strategy<Value = MathObject> {
        let leaf = prop_oneof![Just(prop_var("P")), Just(prop_var("Q")), Just(prop_var("R"))];
        leaf.prop_recursive(4, 32, 2, |inner| {
            prop_oneof![
                (inner.clone(), inner.clone()).prop_map(|(a, b)| MathObject::binary(NodeKind::And, a, b)),
                (inner.clone(), inner.clone()).prop_map(|(a, b)| MathObject::binary(NodeKind::Or, a, b)),
                (inner.clone(), inner.clone())
                    .prop_map(|(a, b)| MathObject::binary(NodeKind::Implies, a, b)),
                inner.prop_map(|a| MathObject::unary(NodeKind::Not, a)),
            ]
        })
    }

    /// Optionally close the proposition under `∃ x ∈ ℝ, x < x ∧ _`
    fn arb_object() -> impl Strategy<Value = MathObject> {
        (arb_proposition(), any::<bool>()).prop_map(|(p, quantified)| {
            if !quantified {
                return p;
            }
            let real = MathObject::typed_constant("ℝ", MathObject::type_sort());
            let x = MathObject::bound_var("x", 7, real);
            let body = MathObject::binary(
                NodeKind::And,
                MathObject::binary(NodeKind::Less, x.clone(), x.clone()),
                p,
            );
            MathObject::binder(NodeKind::Exists, x, body)
        })
    }

    #[derive(Debug, Clone)]
    enum Move {
        Undo,
        Redo,
        Delta(isize),
        Step,
    }

    fn arb_move() -> impl Strategy<Value = Move> {
        prop_oneof![
            Just(Move::Undo),
            Just(Move::Redo),
            (-3isize..4).prop_map(Move::Delta),
            Just(Move::Step),
        ]
    }

    fn empty_state() -> ProofState {
        ProofState::new(vec![Goal::new(vec![], MathObject::leaf(NodeKind::True))])
    }

    fn seal(tree: &mut ProofTree) {
        let mut step = ProofStep::new(UserAction::default(), tree.current_state_id());
        step.after = Some(tree.push_state(empty_state()));
        tree.record_success(step);
    }

    // Property: the effective code never keeps an alternative and only uses
    // atoms of the original code
    proptest! {
        #[test]
        fn effective_code_is_a_plain_selection(
            code in arb_tactic(),
            probes in prop::collection::vec((0usize..6, 0usize..5), 0..6),
        ) {
            let (numbered, instrumented) = code.clone().add_no_meta_vars().instrument();
            let effective = numbered.resolve_effective(&probes);
            prop_assert!(!effective.has_or_else());

            let original: BTreeSet<&str> = instrumented.atoms().into_iter().collect();
            for atom in effective.atoms() {
                prop_assert!(original.contains(atom), "{} not in {:?}", atom, original);
            }
        }
    }

    // Property: the instrumented source differs from the plain source only
    // by its probes
    proptest! {
        #[test]
        fn instrumented_code_keeps_every_atom(code in arb_tactic()) {
            let (numbered, instrumented) = code.instrument();
            let plain = numbered.atoms();
            let probed: Vec<&str> = instrumented
                .atoms()
                .into_iter()
                .filter(|a| !a.starts_with("trace"))
                .collect();
            prop_assert_eq!(plain, probed);
        }
    }

    // Property: fresh names avoid every forbidden name
    proptest! {
        #[test]
        fn fresh_name_avoids_forbidden(
            hint in "[a-zA-Z]{1,3}",
            taken in prop::collection::btree_set("[a-zA-Z]{1,3}('{0,2}|_[0-9])?", 0..20),
            allow_double_prime in any::<bool>(),
        ) {
            let name = fresh_name(&hint, &taken, allow_double_prime);
            prop_assert!(!taken.contains(&name));
            prop_assert!(name.starts_with(&hint));
            if !allow_double_prime {
                prop_assert!(!name.ends_with("''"));
            }
        }
    }

    proptest! {
        #[test]
        fn hypothesis_names_are_fresh_and_increasing(
            taken in prop::collection::btree_set("H[1-9]", 0..9),
            start in 0usize..5,
        ) {
            let mut counter = start;
            let first = hypothesis_name(&taken, &mut counter);
            let after_first = counter;
            let second = hypothesis_name(&taken, &mut counter);
            prop_assert!(!taken.contains(&first));
            prop_assert!(!taken.contains(&second));
            prop_assert_ne!(first, second);
            prop_assert!(counter > after_first && after_first > start);
        }
    }

    // Property: serialising then parsing gives back the same object
    proptest! {
        #[test]
        fn introspection_round_trip(obj in arb_object()) {
            let text = obj.to_introspection();
            let back = parse_math_object(&text, &NamingConfig::default()).unwrap();
            prop_assert_eq!(back, obj);
        }
    }

    // Property: undo then redo is the identity, and the cursor stays inside
    // the history whatever the moves
    proptest! {
        #[test]
        fn history_moves_stay_consistent(
            initial_steps in 0usize..6,
            moves in prop::collection::vec(arb_move(), 0..30),
        ) {
            let mut tree = ProofTree::new(empty_state());
            for _ in 0..initial_steps {
                seal(&mut tree);
            }
            for m in moves {
                let cursor = tree.history_cursor();
                let state = tree.current_state_id();
                match m {
                    Move::Undo => {
                        if tree.undo() {
                            prop_assert!(tree.redo());
                            prop_assert_eq!(tree.history_cursor(), cursor);
                            prop_assert_eq!(tree.current_state_id(), state);
                            tree.undo();
                        } else {
                            prop_assert_eq!(cursor, 0);
                        }
                    }
                    Move::Redo => {
                        if !tree.redo() {
                            prop_assert_eq!(cursor, tree.history_len());
                        }
                    }
                    Move::Delta(d) => {
                        tree.move_cursor(CursorMove::Delta(d));
                    }
                    Move::Step => {
                        seal(&mut tree);
                        // A new step drops whatever could have been redone
                        prop_assert_eq!(tree.history_len(), cursor + 1);
                        prop_assert!(!tree.can_redo());
                    }
                }
                prop_assert!(tree.history_cursor() <= tree.history_len());
                prop_assert_eq!(tree.accepted().count(), tree.history_cursor());
            }
        }
    }
}
