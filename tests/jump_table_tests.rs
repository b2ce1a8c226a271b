//! Per-family opcode contract tests. Each test assembles a small script,
//! runs it to completion, and inspects the result stack or the fault.

use num_bigint::BigInt;
use vela_vm::{ExecutionEngine, OpCode, ScriptBuilder, StackItem, VMState};

fn run(builder: &ScriptBuilder) -> ExecutionEngine {
    let mut engine = ExecutionEngine::new();
    engine
        .load_script(builder.to_script(), -1)
        .expect("load should succeed");
    engine.execute();
    engine
}

/// Runs the script and returns the result stack, bottom to top, as
/// integers.
fn run_ints(builder: &ScriptBuilder) -> Vec<BigInt> {
    let engine = run(builder);
    assert_eq!(engine.state(), VMState::HALT, "script should halt");
    engine
        .result_stack()
        .iter()
        .map(|item| item.as_int().expect("numeric result"))
        .collect()
}

fn run_int(builder: &ScriptBuilder) -> BigInt {
    let values = run_ints(builder);
    assert_eq!(values.len(), 1, "expected a single result");
    values.into_iter().next().expect("single result")
}

fn assert_faults(builder: &ScriptBuilder) {
    assert_eq!(run(builder).state(), VMState::FAULT);
}

// ---------------------------------------------------------------------------
// Literal pushes
// ---------------------------------------------------------------------------

#[test]
fn test_push_small_integers() {
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSHM1);
    builder.emit(OpCode::PUSH1);
    builder.emit(OpCode::PUSH16);
    assert_eq!(
        run_ints(&builder),
        vec![BigInt::from(-1), BigInt::from(1), BigInt::from(16)]
    );
}

#[test]
fn test_push_data_and_null() {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_data(&[0xCA, 0xFE]);
    builder.emit(OpCode::PUSHNULL);

    let engine = run(&builder);
    assert_eq!(engine.state(), VMState::HALT);
    let items: Vec<_> = engine.result_stack().iter().collect();
    assert!(items[0].equals(&StackItem::from_byte_string(vec![0xCA, 0xFE])));
    assert!(items[1].is_null());
}

// ---------------------------------------------------------------------------
// Control flow
// ---------------------------------------------------------------------------

#[test]
fn test_jmpif_takes_branch() {
    // 0: PUSH1; 1: JMPIF +4; 4: PUSH9 (skipped); 5: PUSH2
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH1);
    builder.emit_jump(OpCode::JMPIF, 4).expect("JMPIF");
    builder.emit(OpCode::PUSH9);
    builder.emit(OpCode::PUSH2);
    assert_eq!(run_ints(&builder), vec![BigInt::from(2)]);
}

#[test]
fn test_jmpif_skips_branch() {
    // 0: PUSH0; 1: JMPIF +4; 4: PUSH9; 5: PUSH2
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH0);
    builder.emit_jump(OpCode::JMPIF, 4).expect("JMPIF");
    builder.emit(OpCode::PUSH9);
    builder.emit(OpCode::PUSH2);
    assert_eq!(run_ints(&builder), vec![BigInt::from(9), BigInt::from(2)]);
}

#[test]
fn test_jmpifnot_converts_any_item() {
    // Null is falsy, so JMPIFNOT jumps.
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSHNULL);
    builder.emit_jump(OpCode::JMPIFNOT, 4).expect("JMPIFNOT");
    builder.emit(OpCode::PUSH9);
    builder.emit(OpCode::PUSH2);
    assert_eq!(run_ints(&builder), vec![BigInt::from(2)]);
}

#[test]
fn test_backward_jump_loops() {
    // Counts down from 3: x = 3; do { x = x - 1 } while (x); push 42.
    // 0: PUSH3; 1: DEC; 2: DUP; 3: JMPIF -2; 6: DROP; 7: PUSH42...
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH3);
    builder.emit(OpCode::DEC);
    builder.emit(OpCode::DUP);
    builder.emit_jump(OpCode::JMPIF, -2).expect("JMPIF");
    builder.emit(OpCode::DROP);
    builder.emit_push_int(42);
    assert_eq!(run_ints(&builder), vec![BigInt::from(42)]);
}

#[test]
fn test_throw_faults() {
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::THROW);
    assert_faults(&builder);
}

#[test]
fn test_throwifnot() {
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH1);
    builder.emit(OpCode::THROWIFNOT);
    builder.emit(OpCode::PUSH5);
    assert_eq!(run_ints(&builder), vec![BigInt::from(5)]);

    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH0);
    builder.emit(OpCode::THROWIFNOT);
    assert_faults(&builder);
}

// ---------------------------------------------------------------------------
// Stack manipulation
// ---------------------------------------------------------------------------

#[test]
fn test_basic_shuffles() {
    // SWAP: 1 2 -> 2 1
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH1);
    builder.emit(OpCode::PUSH2);
    builder.emit(OpCode::SWAP);
    assert_eq!(run_ints(&builder), vec![BigInt::from(2), BigInt::from(1)]);

    // ROT: 1 2 3 -> 2 3 1
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH1);
    builder.emit(OpCode::PUSH2);
    builder.emit(OpCode::PUSH3);
    builder.emit(OpCode::ROT);
    assert_eq!(
        run_ints(&builder),
        vec![BigInt::from(2), BigInt::from(3), BigInt::from(1)]
    );

    // TUCK: 1 2 -> 2 1 2
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH1);
    builder.emit(OpCode::PUSH2);
    builder.emit(OpCode::TUCK);
    assert_eq!(
        run_ints(&builder),
        vec![BigInt::from(2), BigInt::from(1), BigInt::from(2)]
    );

    // OVER: 1 2 -> 1 2 1; NIP: 1 2 -> 2
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH1);
    builder.emit(OpCode::PUSH2);
    builder.emit(OpCode::OVER);
    builder.emit(OpCode::NIP);
    assert_eq!(
        run_ints(&builder),
        vec![BigInt::from(1), BigInt::from(1)]
    );
}

#[test]
fn test_depth_pick_roll() {
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH5);
    builder.emit(OpCode::PUSH6);
    builder.emit(OpCode::DEPTH);
    assert_eq!(
        run_ints(&builder),
        vec![BigInt::from(5), BigInt::from(6), BigInt::from(2)]
    );

    // PICK 2 copies the third item: 7 8 9 -> 7 8 9 7
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH7);
    builder.emit(OpCode::PUSH8);
    builder.emit(OpCode::PUSH9);
    builder.emit(OpCode::PUSH2);
    builder.emit(OpCode::PICK);
    assert_eq!(
        run_ints(&builder),
        vec![
            BigInt::from(7),
            BigInt::from(8),
            BigInt::from(9),
            BigInt::from(7)
        ]
    );

    // ROLL 2 moves the third item: 7 8 9 -> 8 9 7
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH7);
    builder.emit(OpCode::PUSH8);
    builder.emit(OpCode::PUSH9);
    builder.emit(OpCode::PUSH2);
    builder.emit(OpCode::ROLL);
    assert_eq!(
        run_ints(&builder),
        vec![BigInt::from(8), BigInt::from(9), BigInt::from(7)]
    );
}

#[test]
fn test_xdrop_xswap_xtuck() {
    // XDROP 1 removes the second item: 1 2 3 -> 1 3
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH1);
    builder.emit(OpCode::PUSH2);
    builder.emit(OpCode::PUSH3);
    builder.emit(OpCode::PUSH1);
    builder.emit(OpCode::XDROP);
    assert_eq!(run_ints(&builder), vec![BigInt::from(1), BigInt::from(3)]);

    // XSWAP 2: 1 2 3 -> 3 2 1
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH1);
    builder.emit(OpCode::PUSH2);
    builder.emit(OpCode::PUSH3);
    builder.emit(OpCode::PUSH2);
    builder.emit(OpCode::XSWAP);
    assert_eq!(
        run_ints(&builder),
        vec![BigInt::from(3), BigInt::from(2), BigInt::from(1)]
    );

    // XTUCK 2 inserts a copy of the top two down: 1 2 3 -> 1 3 2 3
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH1);
    builder.emit(OpCode::PUSH2);
    builder.emit(OpCode::PUSH3);
    builder.emit(OpCode::PUSH2);
    builder.emit(OpCode::XTUCK);
    assert_eq!(
        run_ints(&builder),
        vec![
            BigInt::from(1),
            BigInt::from(3),
            BigInt::from(2),
            BigInt::from(3)
        ]
    );

    // XTUCK 0 is invalid.
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH1);
    builder.emit(OpCode::PUSH0);
    builder.emit(OpCode::XTUCK);
    assert_faults(&builder);
}

#[test]
fn test_negative_index_faults() {
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH1);
    builder.emit(OpCode::PUSHM1);
    builder.emit(OpCode::PICK);
    assert_faults(&builder);
}

#[test]
fn test_alt_stack_ops() {
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH1);
    builder.emit(OpCode::PUSH2);
    builder.emit(OpCode::TOALTSTACK); // alt: 2
    builder.emit(OpCode::PUSH3);
    builder.emit(OpCode::TOALTSTACK); // alt: 2 3
    builder.emit(OpCode::DUPFROMALTSTACK); // eval: 1 3
    builder.emit(OpCode::DUPFROMALTSTACKBOTTOM); // eval: 1 3 2
    builder.emit(OpCode::FROMALTSTACK); // eval: 1 3 2 3, alt: 2
    builder.emit(OpCode::FROMALTSTACK); // eval: 1 3 2 3 2
    assert_eq!(
        run_ints(&builder),
        vec![
            BigInt::from(1),
            BigInt::from(3),
            BigInt::from(2),
            BigInt::from(3),
            BigInt::from(2)
        ]
    );
}

#[test]
fn test_isnull() {
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSHNULL);
    builder.emit(OpCode::ISNULL);
    builder.emit(OpCode::PUSH0);
    builder.emit(OpCode::ISNULL);
    assert_eq!(run_ints(&builder), vec![BigInt::from(1), BigInt::from(0)]);
}

#[test]
fn test_underflow_faults() {
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::DROP);
    assert_faults(&builder);

    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH1);
    builder.emit(OpCode::SWAP);
    assert_faults(&builder);
}

// ---------------------------------------------------------------------------
// Byte strings
// ---------------------------------------------------------------------------

#[test]
fn test_cat() {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_data(b"ab");
    builder.emit_push_data(b"cd");
    builder.emit(OpCode::CAT);

    let engine = run(&builder);
    assert_eq!(engine.state(), VMState::HALT);
    assert!(engine
        .result_stack()
        .peek(0)
        .expect("result")
        .equals(&StackItem::from_byte_string(b"abcd".to_vec())));
}

#[test]
fn test_substr_clamps_count() {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_data(b"hello");
    builder.emit_push_int(1);
    builder.emit_push_int(100);
    builder.emit(OpCode::SUBSTR);

    let engine = run(&builder);
    assert!(engine
        .result_stack()
        .peek(0)
        .expect("result")
        .equals(&StackItem::from_byte_string(b"ello".to_vec())));
}

#[test]
fn test_substr_index_past_end_faults() {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_data(b"hi");
    builder.emit_push_int(3);
    builder.emit_push_int(1);
    builder.emit(OpCode::SUBSTR);
    assert_faults(&builder);
}

#[test]
fn test_left_clamps_right_faults() {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_data(b"hello");
    builder.emit_push_int(100);
    builder.emit(OpCode::LEFT);
    let engine = run(&builder);
    assert!(engine
        .result_stack()
        .peek(0)
        .expect("result")
        .equals(&StackItem::from_byte_string(b"hello".to_vec())));

    let mut builder = ScriptBuilder::new();
    builder.emit_push_data(b"hello");
    builder.emit_push_int(2);
    builder.emit(OpCode::RIGHT);
    let engine = run(&builder);
    assert!(engine
        .result_stack()
        .peek(0)
        .expect("result")
        .equals(&StackItem::from_byte_string(b"lo".to_vec())));

    let mut builder = ScriptBuilder::new();
    builder.emit_push_data(b"hello");
    builder.emit_push_int(6);
    builder.emit(OpCode::RIGHT);
    assert_faults(&builder);
}

#[test]
fn test_size() {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_data(&[1, 2, 3]);
    builder.emit(OpCode::SIZE);
    assert_eq!(run_int(&builder), BigInt::from(3));
}

// ---------------------------------------------------------------------------
// Bitwise
// ---------------------------------------------------------------------------

#[test]
fn test_bitwise_ops() {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(0b1100);
    builder.emit_push_int(0b1010);
    builder.emit(OpCode::AND);
    assert_eq!(run_int(&builder), BigInt::from(0b1000));

    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(0b1100);
    builder.emit_push_int(0b1010);
    builder.emit(OpCode::OR);
    assert_eq!(run_int(&builder), BigInt::from(0b1110));

    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(0b1100);
    builder.emit_push_int(0b1010);
    builder.emit(OpCode::XOR);
    assert_eq!(run_int(&builder), BigInt::from(0b0110));

    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(5);
    builder.emit(OpCode::INVERT);
    assert_eq!(run_int(&builder), BigInt::from(-6));
}

#[test]
fn test_equal_semantics() {
    // Cross-type primitive equality by canonical span.
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(1);
    builder.emit_push_data(&[1]);
    builder.emit(OpCode::EQUAL);
    assert_eq!(run_int(&builder), BigInt::from(1));

    // Two separately built arrays are never equal.
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH0);
    builder.emit(OpCode::NEWARRAY);
    builder.emit(OpCode::PUSH0);
    builder.emit(OpCode::NEWARRAY);
    builder.emit(OpCode::EQUAL);
    assert_eq!(run_int(&builder), BigInt::from(0));

    // The same array is equal to itself.
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSH0);
    builder.emit(OpCode::NEWARRAY);
    builder.emit(OpCode::DUP);
    builder.emit(OpCode::EQUAL);
    assert_eq!(run_int(&builder), BigInt::from(1));

    // Null equals only Null.
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSHNULL);
    builder.emit(OpCode::PUSHNULL);
    builder.emit(OpCode::EQUAL);
    assert_eq!(run_int(&builder), BigInt::from(1));

    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::PUSHNULL);
    builder.emit(OpCode::PUSH0);
    builder.emit(OpCode::EQUAL);
    assert_eq!(run_int(&builder), BigInt::from(0));
}

// ---------------------------------------------------------------------------
// Numeric
// ---------------------------------------------------------------------------

#[test]
fn test_arithmetic() {
    let cases: Vec<(OpCode, i64, i64, i64)> = vec![
        (OpCode::ADD, 7, 5, 12),
        (OpCode::SUB, 7, 5, 2),
        (OpCode::MUL, 7, 5, 35),
        (OpCode::DIV, 7, 2, 3),
        (OpCode::DIV, -7, 2, -3),
        (OpCode::MOD, 7, 3, 1),
        (OpCode::MOD, -7, 3, -1),
        (OpCode::MIN, 7, 5, 5),
        (OpCode::MAX, 7, 5, 7),
    ];
    for (opcode, a, b, expected) in cases {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(a);
        builder.emit_push_int(b);
        builder.emit(opcode);
        assert_eq!(
            run_int(&builder),
            BigInt::from(expected),
            "{opcode:?}({a}, {b})"
        );
    }
}

#[test]
fn test_unary_numeric() {
    let cases: Vec<(OpCode, i64, i64)> = vec![
        (OpCode::INC, 7, 8),
        (OpCode::DEC, 7, 6),
        (OpCode::NEGATE, 7, -7),
        (OpCode::ABS, -7, 7),
        (OpCode::SIGN, -7, -1),
        (OpCode::SIGN, 0, 0),
        (OpCode::SIGN, 7, 1),
        (OpCode::NZ, 7, 1),
        (OpCode::NZ, 0, 0),
        (OpCode::NOT, 0, 1),
        (OpCode::NOT, 7, 0),
    ];
    for (opcode, a, expected) in cases {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(a);
        builder.emit(opcode);
        assert_eq!(run_int(&builder), BigInt::from(expected), "{opcode:?}({a})");
    }
}

#[test]
fn test_division_by_zero_faults() {
    for opcode in [OpCode::DIV, OpCode::MOD] {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(7);
        builder.emit_push_int(0);
        builder.emit(opcode);
        assert_faults(&builder);
    }
}

#[test]
fn test_comparisons() {
    let cases: Vec<(OpCode, i64, i64, bool)> = vec![
        (OpCode::NUMEQUAL, 5, 5, true),
        (OpCode::NUMEQUAL, 5, 6, false),
        (OpCode::NUMNOTEQUAL, 5, 6, true),
        (OpCode::LT, 5, 6, true),
        (OpCode::LT, 6, 5, false),
        (OpCode::GT, 6, 5, true),
        (OpCode::LTE, 5, 5, true),
        (OpCode::GTE, 5, 6, false),
        (OpCode::BOOLAND, 1, 0, false),
        (OpCode::BOOLOR, 1, 0, true),
    ];
    for (opcode, a, b, expected) in cases {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(a);
        builder.emit_push_int(b);
        builder.emit(opcode);
        assert_eq!(
            run_int(&builder),
            BigInt::from(expected as i64),
            "{opcode:?}({a}, {b})"
        );
    }
}

#[test]
fn test_within() {
    // WITHIN(x, a, b) == a <= x < b
    let cases = [(5, 1, 10, true), (1, 1, 10, true), (10, 1, 10, false)];
    for (x, a, b, expected) in cases {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(x);
        builder.emit_push_int(a);
        builder.emit_push_int(b);
        builder.emit(OpCode::WITHIN);
        assert_eq!(run_int(&builder), BigInt::from(expected as i64));
    }
}

#[test]
fn test_shift_semantics() {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(1);
    builder.emit_push_int(8);
    builder.emit(OpCode::SHL);
    assert_eq!(run_int(&builder), BigInt::from(256));

    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(256);
    builder.emit_push_int(4);
    builder.emit(OpCode::SHR);
    assert_eq!(run_int(&builder), BigInt::from(16));

    // A zero shift consumes only the count.
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(7);
    builder.emit_push_int(0);
    builder.emit(OpCode::SHL);
    assert_eq!(run_int(&builder), BigInt::from(7));

    // Arithmetic right shift floors negative values.
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(-1);
    builder.emit_push_int(1);
    builder.emit(OpCode::SHR);
    assert_eq!(run_int(&builder), BigInt::from(-1));

    // Out-of-range counts fault.
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(1);
    builder.emit_push_int(257);
    builder.emit(OpCode::SHL);
    assert_faults(&builder);

    // A result past the integer bound faults.
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(1);
    builder.emit_push_int(256);
    builder.emit(OpCode::SHL);
    assert_faults(&builder);
}

// ---------------------------------------------------------------------------
// Compounds
// ---------------------------------------------------------------------------

#[test]
fn test_arraysize() {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(3);
    builder.emit(OpCode::NEWARRAY);
    builder.emit(OpCode::ARRAYSIZE);
    assert_eq!(run_int(&builder), BigInt::from(3));

    let mut builder = ScriptBuilder::new();
    builder.emit_push_data(&[1, 2, 3, 4]);
    builder.emit(OpCode::ARRAYSIZE);
    assert_eq!(run_int(&builder), BigInt::from(4));
}

#[test]
fn test_pack_unpack_round_trip() {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(1);
    builder.emit_push_int(2);
    builder.emit_push_int(3);
    builder.emit_push_int(3);
    builder.emit(OpCode::PACK);
    builder.emit(OpCode::UNPACK);
    // UNPACK restores the stack and pushes the count.
    assert_eq!(
        run_ints(&builder),
        vec![
            BigInt::from(1),
            BigInt::from(2),
            BigInt::from(3),
            BigInt::from(3)
        ]
    );
}

#[test]
fn test_pack_more_than_stack_faults() {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(1);
    builder.emit_push_int(5);
    builder.emit(OpCode::PACK);
    assert_faults(&builder);
}

#[test]
fn test_pickitem_on_primitive_byte_view() {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_data(&[10, 20, 30]);
    builder.emit_push_int(1);
    builder.emit(OpCode::PICKITEM);
    assert_eq!(run_int(&builder), BigInt::from(20));

    let mut builder = ScriptBuilder::new();
    builder.emit_push_data(&[10, 20, 30]);
    builder.emit_push_int(3);
    builder.emit(OpCode::PICKITEM);
    assert_faults(&builder);
}

#[test]
fn test_setitem_and_pickitem_on_array() {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(2);
    builder.emit(OpCode::NEWARRAY);
    builder.emit(OpCode::DUP);
    builder.emit_push_int(1);
    builder.emit_push_int(77);
    builder.emit(OpCode::SETITEM);
    builder.emit_push_int(1);
    builder.emit(OpCode::PICKITEM);
    assert_eq!(run_int(&builder), BigInt::from(77));

    // Out-of-range SETITEM faults; arrays do not grow through it.
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(2);
    builder.emit(OpCode::NEWARRAY);
    builder.emit_push_int(2);
    builder.emit_push_int(77);
    builder.emit(OpCode::SETITEM);
    assert_faults(&builder);
}

#[test]
fn test_newarray_from_struct_shares_elements() {
    // struct [7] -> array via NEWARRAY, then read element 0.
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(1);
    builder.emit(OpCode::NEWSTRUCT);
    builder.emit(OpCode::DUP);
    builder.emit_push_int(0);
    builder.emit_push_int(7);
    builder.emit(OpCode::SETITEM);
    builder.emit(OpCode::NEWARRAY);
    builder.emit_push_int(0);
    builder.emit(OpCode::PICKITEM);
    assert_eq!(run_int(&builder), BigInt::from(7));
}

#[test]
fn test_newarray_oversized_faults() {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(1025);
    builder.emit(OpCode::NEWARRAY);
    assert_faults(&builder);
}

#[test]
fn test_map_operations() {
    // m = {}; m[5] = 55; read it back, check HASKEY on hit and miss.
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::NEWMAP);
    builder.emit(OpCode::DUP);
    builder.emit_push_int(5);
    builder.emit_push_int(55);
    builder.emit(OpCode::SETITEM);
    builder.emit(OpCode::DUP);
    builder.emit_push_int(5);
    builder.emit(OpCode::HASKEY);
    builder.emit(OpCode::TOALTSTACK);
    builder.emit(OpCode::DUP);
    builder.emit_push_int(6);
    builder.emit(OpCode::HASKEY);
    builder.emit(OpCode::TOALTSTACK);
    builder.emit_push_int(5);
    builder.emit(OpCode::PICKITEM);
    builder.emit(OpCode::FROMALTSTACK);
    builder.emit(OpCode::FROMALTSTACK);
    assert_eq!(
        run_ints(&builder),
        vec![BigInt::from(55), BigInt::from(0), BigInt::from(1)]
    );
}

#[test]
fn test_map_missing_key_faults_pickitem() {
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::NEWMAP);
    builder.emit_push_int(5);
    builder.emit(OpCode::PICKITEM);
    assert_faults(&builder);
}

#[test]
fn test_keys_values_order() {
    // Insert 2 then 1; KEYS preserves insertion order.
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::NEWMAP);
    builder.emit(OpCode::DUP);
    builder.emit_push_int(2);
    builder.emit_push_int(20);
    builder.emit(OpCode::SETITEM);
    builder.emit(OpCode::DUP);
    builder.emit_push_int(1);
    builder.emit_push_int(10);
    builder.emit(OpCode::SETITEM);
    builder.emit(OpCode::KEYS);
    builder.emit(OpCode::UNPACK);
    builder.emit(OpCode::DROP); // drop the count
    assert_eq!(run_ints(&builder), vec![BigInt::from(1), BigInt::from(2)]);
}

#[test]
fn test_remove_from_array() {
    // PACK builds [3, 2, 1]; removing index 1 leaves [3, 1].
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(1);
    builder.emit_push_int(2);
    builder.emit_push_int(3);
    builder.emit_push_int(3);
    builder.emit(OpCode::PACK);
    builder.emit(OpCode::DUP);
    builder.emit_push_int(1);
    builder.emit(OpCode::REMOVE);
    builder.emit(OpCode::DUP);
    builder.emit(OpCode::ARRAYSIZE);
    builder.emit(OpCode::TOALTSTACK);
    builder.emit_push_int(1);
    builder.emit(OpCode::PICKITEM);
    builder.emit(OpCode::FROMALTSTACK);
    assert_eq!(run_ints(&builder), vec![BigInt::from(1), BigInt::from(2)]);

    // Out-of-range removal faults.
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(1);
    builder.emit(OpCode::NEWARRAY);
    builder.emit_push_int(1);
    builder.emit(OpCode::REMOVE);
    assert_faults(&builder);
}

#[test]
fn test_remove_absent_map_key_is_ignored() {
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::NEWMAP);
    builder.emit(OpCode::DUP);
    builder.emit_push_int(5);
    builder.emit(OpCode::REMOVE);
    builder.emit(OpCode::ARRAYSIZE);
    assert_eq!(run_int(&builder), BigInt::from(0));
}

#[test]
fn test_reverse_array() {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(1);
    builder.emit_push_int(2);
    builder.emit_push_int(3);
    builder.emit_push_int(3);
    builder.emit(OpCode::PACK);
    builder.emit(OpCode::DUP);
    builder.emit(OpCode::REVERSE);
    builder.emit(OpCode::UNPACK);
    builder.emit(OpCode::DROP);
    // Packed [3, 2, 1], reversed [1, 2, 3]; UNPACK pushes them so the
    // first element ends on top.
    assert_eq!(
        run_ints(&builder),
        vec![BigInt::from(3), BigInt::from(2), BigInt::from(1)]
    );
}

#[test]
fn test_values_deep_clones_structs() {
    // array [struct [9]] -> VALUES -> mutate the fetched copy; the
    // original is unchanged.
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(1);
    builder.emit(OpCode::NEWSTRUCT);
    builder.emit(OpCode::DUP);
    builder.emit_push_int(0);
    builder.emit_push_int(9);
    builder.emit(OpCode::SETITEM); // S = [9]
    builder.emit_push_int(1);
    builder.emit(OpCode::PACK); // A = [S]
    builder.emit(OpCode::DUP);
    builder.emit(OpCode::VALUES); // V = [clone of S]
    builder.emit_push_int(0);
    builder.emit(OpCode::PICKITEM); // S''
    builder.emit_push_int(0);
    builder.emit_push_int(42);
    builder.emit(OpCode::SETITEM); // S''[0] = 42
    builder.emit_push_int(0);
    builder.emit(OpCode::PICKITEM); // A[0]
    builder.emit_push_int(0);
    builder.emit(OpCode::PICKITEM); // A[0][0], still 9
    assert_eq!(run_int(&builder), BigInt::from(9));
}

#[test]
fn test_haskey_negative_index_faults() {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(1);
    builder.emit(OpCode::NEWARRAY);
    builder.emit(OpCode::PUSHM1);
    builder.emit(OpCode::HASKEY);
    assert_faults(&builder);
}
