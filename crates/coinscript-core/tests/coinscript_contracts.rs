use coinscript_core::coinscript::compile_source;
use coinscript_core::curry::curry_tree_hash;
use coinscript_core::hash::tree_hash;
use coinscript_core::parse::parse;
use coinscript_core::{Error, SolutionBuilder, TreeNode};

const OWNER_ADDRESS: &str = "xch1xf23pd3ludh8chksgaxcs6dkhcwpfm0gv64h02q9rmy6mwwp8w7qtsp7ph";
const OWNER_HASH: &str = "325510b63fe36e7c5ed0474d8869b6be1c14ede866ab77a8051ec9adb9c13bbc";

/// Address literals decode to their puzzle hash and end up curried
/// into the generated ChiaLisp as constants.
#[test]
fn address_literal_becomes_curried_constant() {
    let source = format!(
        r#"
        coin Payout {{
            storage address owner = {OWNER_ADDRESS};
            action pay() {{
                send(owner, 100);
            }}
        }}
        "#
    );
    let output = compile_source(&source).expect("compile");
    let text = output.main_puzzle.to_chialisp().expect("chialisp");
    assert!(text.contains(&format!("0x{OWNER_HASH}")), "{text}");
    assert!(!text.contains("owner"), "{text}");
}

#[test]
fn invalid_address_literal_is_a_semantic_error() {
    let source = r#"
        coin Broken {
            storage address owner = xch1invalid11;
            action pay() { send(owner, 1); }
        }
    "#;
    let err = compile_source(source).unwrap_err();
    assert!(matches!(err, Error::Semantic { .. }), "{err}");
    assert!(err.to_string().contains("Invalid Chia address"), "{err}");
}

/// `require(msg.sender == owner)` pins the spender with AGG_SIG_ME
/// before the payout condition.
#[test]
fn sender_validation_emits_signature_then_payment() {
    let source = format!(
        r#"
        coin SenderValidation {{
            storage address owner = {OWNER_ADDRESS};
            action onlyOwner() {{
                require(msg.sender == owner, "Not owner");
                send(owner, 100);
            }}
        }}
        "#
    );
    let output = compile_source(&source).expect("compile");
    let text = output.main_puzzle.to_chialisp().expect("chialisp");
    assert!(text.contains("AGG_SIG_ME"), "{text}");
    assert!(text.contains("CREATE_COIN"), "{text}");

    let mut solution = SolutionBuilder::new();
    solution.add_action("onlyOwner", None);
    let simulation = output
        .main_puzzle
        .simulate(solution.build().expect("solution"))
        .expect("simulate");
    let conditions = simulation.conditions();
    assert_eq!(conditions.len(), 2);

    let sig = conditions[0].proper_list().expect("agg sig");
    assert_eq!(sig[0], TreeNode::int(50));
    assert_eq!(sig[1], TreeNode::bytes(hex::decode(OWNER_HASH).unwrap()));

    let payment = conditions[1].proper_list().expect("create coin");
    assert_eq!(payment[0], TreeNode::int(51));
    assert_eq!(payment[1], TreeNode::bytes(hex::decode(OWNER_HASH).unwrap()));
    assert_eq!(payment[2], TreeNode::int(100));
}

/// The stateful counter: spending the state-curried puzzle recreates
/// exactly one child carrying the incremented state.
#[test]
fn stateful_counter_recreates_with_incremented_state() {
    let source = r#"
        coin Counter {
            state {
                uint256 count;
            }

            @stateful
            action increment() {
                state.count += 1;
                recreateSelf();
            }
        }
    "#;
    let output = compile_source(source).expect("compile");
    assert!(output.metadata.has_stateful_actions);
    assert_eq!(output.metadata.state_fields, vec!["count".to_string()]);
    assert_eq!(output.initial_state, Some(parse("(0)").unwrap()));

    let template = output.main_puzzle.compile().expect("compile template");
    let mod_hash = template.tree_hash().expect("mod hash");

    // the launch puzzle curries the zero state into the template
    let launch = output.launch_puzzle().expect("launch puzzle");
    let expected_launch = curry_tree_hash(
        mod_hash,
        &[
            tree_hash(&TreeNode::bytes(mod_hash.to_vec())),
            tree_hash(&parse("(0)").unwrap()),
        ],
    );
    assert_eq!(launch.mod_hash().expect("launch hash"), expected_launch);

    let current = parse("(5)").expect("state");
    let spendable = template
        .curry(&[TreeNode::bytes(mod_hash.to_vec()), current])
        .expect("curry");

    let mut solution = SolutionBuilder::new();
    solution.add_action("increment", None).add(1000_u64);
    let (result, _) = spendable
        .run(&solution.build().expect("solution"), coinscript_core::DEFAULT_MAX_COST)
        .expect("run");

    let conditions = result.proper_list().expect("conditions");
    let create_coins: Vec<_> = conditions
        .iter()
        .filter(|c| {
            c.proper_list()
                .and_then(|f| f.first().cloned())
                .is_some_and(|op| op == TreeNode::int(51))
        })
        .cloned()
        .collect();
    assert_eq!(create_coins.len(), 1, "exactly one state-carrying child");

    let fields = create_coins[0].proper_list().expect("create coin");
    let next_state = parse("(6)").expect("next state");
    let expected = curry_tree_hash(
        mod_hash,
        &[
            tree_hash(&TreeNode::bytes(mod_hash.to_vec())),
            tree_hash(&next_state),
        ],
    );
    assert_eq!(fields[1], TreeNode::bytes(expected.to_vec()));
    assert_eq!(fields[2], TreeNode::int(1000));

    // the amount is pinned alongside
    assert!(conditions.iter().any(|c| {
        c.proper_list()
            .and_then(|f| f.first().cloned())
            .is_some_and(|op| op == TreeNode::int(73))
    }));
}

#[test]
fn burn_terminates_the_state_chain() {
    let source = r#"
        coin Fuse {
            state {
                uint256 armed;
            }

            @stateful
            action blow() {
                burn();
            }
        }
    "#;
    let output = compile_source(source).expect("compile");
    let template = output.main_puzzle.compile().expect("compile");
    let mod_hash = template.tree_hash().expect("hash");
    let spendable = template
        .curry(&[
            TreeNode::bytes(mod_hash.to_vec()),
            parse("(1)").expect("state"),
        ])
        .expect("curry");

    let mut solution = SolutionBuilder::new();
    solution.add_action("blow", None).add(1_u64);
    let (result, _) = spendable
        .run(&solution.build().expect("solution"), coinscript_core::DEFAULT_MAX_COST)
        .expect("run");
    assert!(result.is_nil(), "no child coin after burn");
}

/// Three actions dispatch on the first solution argument; anything
/// else raises.
#[test]
fn escrow_dispatches_by_action_name() {
    let source = format!(
        r#"
        coin Escrow {{
            storage address owner = {OWNER_ADDRESS};
            action release() {{
                send(owner, 100);
            }}
            action refund() {{
                send(owner, 50);
            }}
            action timeoutRefund() {{
                requireAfterSeconds(3600);
                send(owner, 50);
            }}
        }}
        "#
    );
    let output = compile_source(&source).expect("compile");
    assert_eq!(
        output.metadata.actions,
        vec!["release".to_string(), "refund".to_string(), "timeoutRefund".to_string()]
    );

    for (action, expected_amount) in [("release", 100_i64), ("refund", 50)] {
        let mut solution = SolutionBuilder::new();
        solution.add_action(action, None);
        let simulation = output
            .main_puzzle
            .simulate(solution.build().expect("solution"))
            .expect("simulate");
        let fields = simulation.conditions()[0].proper_list().expect("condition");
        assert_eq!(fields[2], TreeNode::int(expected_amount), "{action}");
    }

    let mut solution = SolutionBuilder::new();
    solution.add_action("timeoutRefund", None);
    let simulation = output
        .main_puzzle
        .simulate(solution.build().expect("solution"))
        .expect("simulate");
    let opcodes: Vec<TreeNode> = simulation
        .conditions()
        .iter()
        .map(|c| c.proper_list().expect("condition")[0].clone())
        .collect();
    assert!(opcodes.contains(&TreeNode::int(80)));
    assert!(opcodes.contains(&TreeNode::int(51)));

    let mut solution = SolutionBuilder::new();
    solution.add_action("unknownAction", None);
    let err = output
        .main_puzzle
        .simulate(solution.build().expect("solution"))
        .unwrap_err();
    assert!(matches!(err, Error::Simulation { .. }));
}

#[test]
fn block_height_requirements_become_absolute_timelocks() {
    let source = r#"
        coin HeightGate {
            action claim() {
                require(block.height >= 100);
                requireAfterSeconds(60);
            }
        }
    "#;
    let output = compile_source(source).expect("compile");
    let mut solution = SolutionBuilder::new();
    solution.add_action("claim", None);
    let simulation = output
        .main_puzzle
        .simulate(solution.build().expect("solution"))
        .expect("simulate");
    let opcodes: Vec<TreeNode> = simulation
        .conditions()
        .iter()
        .map(|c| c.proper_list().expect("condition")[0].clone())
        .collect();
    assert!(opcodes.contains(&TreeNode::int(83)), "{opcodes:?}");
    assert!(opcodes.contains(&TreeNode::int(80)), "{opcodes:?}");
}

#[test]
fn unsupported_block_comparison_is_a_codegen_error() {
    let source = r#"
        coin HeightGate {
            action claim() {
                require(block.height < 100);
            }
        }
    "#;
    let err = compile_source(source).unwrap_err();
    assert!(matches!(err, Error::Codegen { .. }), "{err}");
}

/// Contract-level include minimization mirrors the builder rule.
#[test]
fn contract_includes_track_features() {
    let timelock_only = r#"
        coin Timelock {
            action wait() {
                requireAfterSeconds(3600);
            }
        }
    "#;
    let output = compile_source(timelock_only).expect("compile");
    assert_eq!(
        output.main_puzzle.included_libraries().iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["condition_codes.clib"]
    );

    let with_require = r#"
        coin Timelock {
            action wait(uint256 threshold) {
                requireAfterSeconds(3600);
                require(threshold > 10);
            }
        }
    "#;
    let output = compile_source(with_require).expect("compile");
    assert!(output
        .main_puzzle
        .included_libraries()
        .contains("utility_macros.clib"));
}

#[test]
fn events_announce_with_tagged_messages() {
    let source = format!(
        r#"
        coin Ledger {{
            storage address owner = {OWNER_ADDRESS};
            event Paid(address to, uint256 amount);
            action pay(uint256 amount) {{
                send(owner, amount);
                emit Paid(owner, amount);
            }}
        }}
        "#
    );
    let output = compile_source(&source).expect("compile");
    assert_eq!(output.metadata.events, vec!["Paid".to_string()]);
    let text = output.main_puzzle.to_chialisp().expect("chialisp");
    assert!(text.contains("CREATE_COIN_ANNOUNCEMENT"), "{text}");
    assert!(text.contains("sha256tree"), "{text}");
    assert!(
        output
            .main_puzzle
            .included_libraries()
            .contains("sha256tree.clib"),
        "announcement tags hash their payload"
    );

    let mut solution = SolutionBuilder::new();
    solution.add_action("pay", Some(vec![25_u64.into()]));
    let simulation = output
        .main_puzzle
        .simulate(solution.build().expect("solution"))
        .expect("simulate");
    let opcodes: Vec<TreeNode> = simulation
        .conditions()
        .iter()
        .map(|c| c.proper_list().expect("condition")[0].clone())
        .collect();
    assert!(opcodes.contains(&TreeNode::int(60)));
}

#[test]
fn modifiers_inline_ahead_of_the_body() {
    let source = format!(
        r#"
        coin Gated {{
            storage address owner = {OWNER_ADDRESS};
            modifier minimumFee(uint256 amount) {{
                require(amount > 10);
            }}
            @minimumFee(50)
            action collect() {{
                send(owner, 1);
            }}
        }}
        "#
    );
    let output = compile_source(&source).expect("compile");

    // 50 > 10, so the guard passes and the payment fires
    let mut solution = SolutionBuilder::new();
    solution.add_action("collect", None);
    let simulation = output
        .main_puzzle
        .simulate(solution.build().expect("solution"))
        .expect("simulate");
    assert_eq!(simulation.conditions().len(), 1);
}

#[test]
fn only_owner_decorator_prepends_signature() {
    let source = format!(
        r#"
        coin Guarded {{
            storage address owner = {OWNER_ADDRESS};
            @onlyOwner
            action withdraw(uint256 amount) {{
                send(owner, amount);
            }}
        }}
        "#
    );
    let output = compile_source(&source).expect("compile");
    let mut solution = SolutionBuilder::new();
    solution.add_action("withdraw", Some(vec![7_u64.into()]));
    let simulation = output
        .main_puzzle
        .simulate(solution.build().expect("solution"))
        .expect("simulate");
    let conditions = simulation.conditions();
    let first = conditions[0].proper_list().expect("condition");
    assert_eq!(first[0], TreeNode::int(50), "signature check comes first");
}

#[test]
fn state_mapping_compiles_with_assoc_helpers() {
    let source = r#"
        coin Balances {
            state {
                mapping(address => uint256) balances;
            }

            @stateful
            action credit(address who, uint256 amount) {
                state.balances[who] += amount;
            }
        }
    "#;
    let output = compile_source(source).expect("compile");
    let text = output.main_puzzle.to_chialisp().expect("chialisp");
    assert!(text.contains("(defun assoc_get"), "{text}");
    assert!(text.contains("(defun assoc_set"), "{text}");
    // a plain map never pulls in the sorted-insert helper
    assert!(!text.contains("assoc_set_sorted"), "{text}");
    // the template must compile through the external toolchain
    output.main_puzzle.compile().expect("compiles");
}

/// Maps declared `ordered` mutate through a sorted insert, so the
/// recreated state lists pairs ascending by key bytes regardless of
/// write order.
#[test]
fn ordered_maps_stay_sorted_by_key_bytes() {
    let key_lo = "aa".repeat(32);
    let key_hi = "bb".repeat(32);
    let source = format!(
        r#"
        coin SortedLedger {{
            state {{
                mapping(address => uint256) ordered balances;
            }}

            @stateful
            action seed() {{
                state.balances[0x{key_hi}] = 2;
                state.balances[0x{key_lo}] = 1;
                recreateSelf();
            }}
        }}
        "#
    );
    let output = compile_source(&source).expect("compile");
    let text = output.main_puzzle.to_chialisp().expect("chialisp");
    assert!(text.contains("(defun assoc_set_sorted"), "{text}");

    let template = output.main_puzzle.compile().expect("compile template");
    let mod_hash = template.tree_hash().expect("mod hash");
    let spendable = template
        .curry(&[
            TreeNode::bytes(mod_hash.to_vec()),
            parse("(())").expect("empty state"),
        ])
        .expect("curry");

    let mut solution = SolutionBuilder::new();
    solution.add_action("seed", None).add(500_u64);
    let (result, _) = spendable
        .run(&solution.build().expect("solution"), coinscript_core::DEFAULT_MAX_COST)
        .expect("run");

    let conditions = result.proper_list().expect("conditions");
    let create = conditions
        .iter()
        .find(|c| {
            c.proper_list()
                .and_then(|f| f.first().cloned())
                .is_some_and(|op| op == TreeNode::int(51))
        })
        .expect("create coin")
        .proper_list()
        .expect("fields");

    // written high key first, but the child state sorts low key first
    let sorted_state =
        parse(&format!("(((0x{key_lo} . 1) (0x{key_hi} . 2)))")).expect("sorted state");
    let expected = curry_tree_hash(
        mod_hash,
        &[
            tree_hash(&TreeNode::bytes(mod_hash.to_vec())),
            tree_hash(&sorted_state),
        ],
    );
    assert_eq!(create[1], TreeNode::bytes(expected.to_vec()));

    let insertion_state =
        parse(&format!("(((0x{key_hi} . 2) (0x{key_lo} . 1)))")).expect("insertion state");
    let insertion_hash = curry_tree_hash(
        mod_hash,
        &[
            tree_hash(&TreeNode::bytes(mod_hash.to_vec())),
            tree_hash(&insertion_state),
        ],
    );
    assert_ne!(expected, insertion_hash, "ordering must be observable");
}

#[test]
fn singleton_layer_wraps_and_exports_launcher() {
    let source = r#"
        coin Unique {
            layer singleton(launcher_id = 0x1111111111111111111111111111111111111111111111111111111111111111);
            action noop() {
                requireAfterSeconds(1);
            }
        }
    "#;
    let output = compile_source(source).expect("compile");
    assert!(output.metadata.has_singleton);
    assert_eq!(output.metadata.layers, vec!["singleton".to_string()]);
    assert!(output.additional_puzzles.contains_key("launcher"));
    assert!(output.additional_puzzles.contains_key("inner"));

    // the wrapped program hashes differently from the inner puzzle
    let inner = &output.additional_puzzles["inner"];
    assert_ne!(
        output.main_puzzle.mod_hash().expect("outer hash"),
        inner.mod_hash().expect("inner hash")
    );
}

#[test]
fn inline_inner_puzzle_compiles_and_substitutes() {
    let source = r#"
        coin Wrapper {
            inner puzzle passthrough(bytes32 target, uint256 amount) {
                send(target, amount);
            }
            action run(bytes32 forwarded) {
                return delegateTo(passthrough, forwarded);
            }
        }
    "#;
    let output = compile_source(source).expect("compile");
    assert!(output.additional_puzzles.contains_key("passthrough"));
    let text = output.main_puzzle.to_chialisp().expect("chialisp");
    // the slot symbol is substituted away by the inline definition
    assert!(!text.contains("passthrough_INNER_PUZZLE"), "{text}");
    output.main_puzzle.compile().expect("compiles");
}

#[test]
fn unknown_function_in_delegation_is_rejected() {
    let source = r#"
        coin Wrapper {
            inner puzzle passthrough(bytes32 target, uint256 amount) {
                send(target, amount);
            }
            action run() {
                return delegateTo(passthrough, action_solution());
            }
        }
    "#;
    // `action_solution()` is not a builtin: the contract must fail
    // loudly instead of guessing
    let err = compile_source(source).unwrap_err();
    assert!(matches!(err, Error::Semantic { .. }), "{err}");
}

#[test]
fn missing_external_inner_slot_is_reported() {
    let source = r#"
        coin Wrapper {
            inner puzzle validator;
            action run() {
                requireAfterSeconds(1);
            }
        }
    "#;
    let err = compile_source(source).unwrap_err();
    assert!(matches!(err, Error::Semantic { .. }), "{err}");
    assert!(err.to_string().contains("validator"), "{err}");
}
