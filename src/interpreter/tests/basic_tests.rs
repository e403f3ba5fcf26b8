use super::helpers::*;
use crate::bytecode::{FunctionBuilder, Op};
use crate::value::Value;

#[test]
fn test_add_integers() {
    let mut main = FunctionBuilder::new("main");
    main.ld(20).ld(22).op(Op::Add).op(Op::Ret);

    assert_eq!(run_main(main), ints(&[42]));
}

#[test]
fn test_integer_add_wraps() {
    let mut main = FunctionBuilder::new("main");
    main.ld(i64::MAX).ld(1).op(Op::Add).op(Op::Ret);

    assert_eq!(run_main(main), ints(&[i64::MIN]));
}

#[test]
fn test_mixed_arithmetic_widens_to_float() {
    let mut main = FunctionBuilder::new("main");
    main.ld_flt(1.5).ld(2).op(Op::Mul).op(Op::Ret);

    assert_eq!(run_main(main), vec![Value::Float(3.0)]);
}

#[test]
fn test_string_concatenation() {
    let mut main = FunctionBuilder::new("main");
    main.ld_str(0).ld_str(1).op(Op::Add).op(Op::Ret);

    let result = run(vec![main], &["foo", "bar"], &[]);
    assert_eq!(result, vec![Value::string("foobar")]);
}

#[test]
fn test_logical_right_shift() {
    let mut main = FunctionBuilder::new("main");
    main.ld(-1).ld(60).op(Op::Rsh).op(Op::Ret);

    assert_eq!(run_main(main), ints(&[15]));
}

#[test]
fn test_loop_sums_one_to_ten() {
    let mut main = FunctionBuilder::new("main");
    let i = main.local();
    let sum = main.local();
    let top = main.label();
    let end = main.label();

    main.ld(0).st_loc(sum).ld(1).st_loc(i);
    main.mark(top);
    main.ld_loc(i).ld(10).op(Op::Leq).branch(Op::Bf, end);
    main.ld_loc(sum).ld_loc(i).op(Op::Add).st_loc(sum);
    main.ld_loc(i).ld(1).op(Op::Add).st_loc(i);
    main.branch(Op::B, top);
    main.mark(end);
    main.ld_loc(sum).op(Op::Ret);

    assert_eq!(run_main(main), ints(&[55]));
}

#[test]
fn test_arguments_and_argc() {
    let mut main = FunctionBuilder::new("main");
    main.op(Op::LdArgc).ld_arg(0).ld_arg(5).op(Op::Ret);

    let result = run(vec![main], &[], &ints(&[7]));
    assert_eq!(result, vec![Value::Integer(1), Value::Integer(7), Value::Nil]);
}

#[test]
fn test_branch_on_nil() {
    let mut main = FunctionBuilder::new("main");
    let taken = main.label();
    main.op(Op::LdNil).branch(Op::Bn, taken);
    main.ld(1).op(Op::Ret);
    main.mark(taken);
    main.ld(2).op(Op::Ret);

    assert_eq!(run_main(main), ints(&[2]));
}

#[test]
fn test_typeof_and_isnil() {
    let mut main = FunctionBuilder::new("main");
    main.op(Op::LdNTbl).op(Op::Typeof);
    main.op(Op::LdNil).op(Op::IsNil);
    main.ld(1).op(Op::IsNil);
    main.op(Op::Ret);

    assert_eq!(
        run_main(main),
        vec![Value::string("table"), Value::Boolean(true), Value::Boolean(false)]
    );
}

#[test]
fn test_dup_and_pop() {
    let mut main = FunctionBuilder::new("main");
    main.ld(1).op(Op::Dup).op(Op::Add).ld(9).op(Op::Pop).op(Op::Ret);

    assert_eq!(run_main(main), ints(&[2]));
}

#[test]
fn test_running_off_the_end_returns() {
    let mut main = FunctionBuilder::new("main");
    main.ld(5);

    assert_eq!(run_main(main), ints(&[5]));
}

#[test]
fn test_shape_return_pads_and_truncates() {
    let mut truncated = FunctionBuilder::new("main");
    truncated.op(Op::LdDel).ld(1).ld(2).ld(3).shp_rv(2).op(Op::Ret);
    assert_eq!(run_main(truncated), ints(&[1, 2]));

    let mut padded = FunctionBuilder::new("main");
    padded.op(Op::LdDel).shp_rv(3).op(Op::Ret);
    assert_eq!(run_main(padded), vec![Value::Nil, Value::Nil, Value::Nil]);
}

#[test]
fn test_on_stack_immediate() {
    let mut main = FunctionBuilder::new("main");
    main.locals(1);
    main.ld(9).st_loc(0);
    main.ld(0).op(Op::LdLocA).op(Op::Ret);

    assert_eq!(run_main(main), ints(&[9]));
}

#[test]
fn test_nop_and_try_bookkeeping() {
    let mut main = FunctionBuilder::new("main");
    let handler = main.label();
    main.branch(Op::Try, handler);
    main.op(Op::Nop).ld(1);
    main.op(Op::EndTry);
    main.mark(handler);
    main.op(Op::Ret);

    assert_eq!(run_main(main), ints(&[1]));
}
