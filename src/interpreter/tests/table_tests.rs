use super::helpers::*;
use crate::bytecode::{FunctionBuilder, Op};
use crate::error::VmFault;
use crate::value::Value;

const REN: i64 = 0;
const UEN: i64 = 1;
const STRINGS: &[&str] = &["__ren", "__uen"];

#[test]
fn test_absent_key_reads_nil() {
    let mut main = FunctionBuilder::new("main");
    let t = main.local();
    main.op(Op::LdNTbl).ld(1).op(Op::Ren);

    // a metatable without __ren changes nothing
    main.op(Op::LdNTbl).st_loc(t);
    main.op(Op::LdNTbl).ld_loc(t).op(Op::Smt);
    main.ld_loc(t).ld(1).op(Op::Ren);
    main.op(Op::Ret);

    assert_eq!(run_main(main), vec![Value::Nil, Value::Nil]);
}

#[test]
fn test_update_then_read() {
    let mut main = FunctionBuilder::new("main");
    let t = main.local();
    main.op(Op::LdNTbl).st_loc(t);
    main.ld(10).ld_loc(t).ld_str(0).op(Op::Uen);
    main.ld(20).ld_loc(t).ld_str(0).op(Op::Uen);
    main.ld_loc(t).ld_str(0).op(Op::Ren);
    main.op(Op::Ret);

    assert_eq!(run(vec![main], &["key"], &[]), ints(&[20]));
}

#[test]
fn test_integer_and_float_keys_are_distinct() {
    let mut main = FunctionBuilder::new("main");
    let t = main.local();
    main.op(Op::LdNTbl).st_loc(t);
    main.ld(1).ld_loc(t).ld(1).op(Op::Uen);
    main.ld_loc(t).ld_flt(1.0).op(Op::Ren);
    main.ld_loc(t).ld(1).op(Op::Ren);
    main.op(Op::Ret);

    assert_eq!(run_main(main), vec![Value::Nil, Value::Integer(1)]);
}

#[test]
fn test_ien_keeps_the_table() {
    let mut main = FunctionBuilder::new("main");
    main.op(Op::LdNTbl).ld(1).ld(2).op(Op::Ien).ld(1).op(Op::RenL).op(Op::Ret);

    assert_eq!(run_main(main), ints(&[2]));
}

#[test]
fn test_ren_metamethod_and_raw_read() {
    let mut main = FunctionBuilder::new("main");
    let obj = main.local();
    main.op(Op::LdNTbl).st_loc(obj);
    main.op(Op::LdNTbl).ld_str(REN).ld_fun(1).op(Op::Ien);
    main.ld_loc(obj).op(Op::Smt);
    main.ld_loc(obj).ld(21).op(Op::Ren);
    main.ld_loc(obj).ld(21).op(Op::RenL);
    main.op(Op::Ret);

    // __ren(t, k) = k * 2
    let mut ren = FunctionBuilder::new("__ren");
    ren.ld_arg(1).ld(2).op(Op::Mul).op(Op::Ret);

    assert_eq!(
        run(vec![main, ren], STRINGS, &[]),
        vec![Value::Integer(42), Value::Nil]
    );
}

#[test]
fn test_uen_metamethod_receives_table_key_value() {
    let mut main = FunctionBuilder::new("main");
    let obj = main.local();
    main.op(Op::LdNTbl).st_loc(obj);
    main.op(Op::LdNTbl).ld_str(UEN).ld_fun(1).op(Op::Ien);
    main.ld_loc(obj).op(Op::Smt);
    main.ld(41).ld_loc(obj).ld(7).op(Op::Uen);
    main.ld_loc(obj).ld(7).op(Op::RenL);
    main.op(Op::Ret);

    // __uen(t, k, v) stores v + 1 raw
    let mut uen = FunctionBuilder::new("__uen");
    uen.ld_arg(2).ld(1).op(Op::Add).ld_arg(0).ld_arg(1).op(Op::UenL);
    uen.op(Op::Ret);

    assert_eq!(run(vec![main, uen], STRINGS, &[]), ints(&[42]));
}

#[test]
fn test_set_and_get_metatable() {
    let mut main = FunctionBuilder::new("main");
    let obj = main.local();
    let mt = main.local();
    main.op(Op::LdNTbl).st_loc(obj);
    main.op(Op::LdNTbl).st_loc(mt);
    main.ld_loc(mt).ld_loc(obj).op(Op::Smt);
    main.ld_loc(obj).op(Op::Gmt).ld_loc(mt).op(Op::Equ);
    // nil clears it
    main.op(Op::LdNil).ld_loc(obj).op(Op::Smt);
    main.ld_loc(obj).op(Op::Gmt).op(Op::IsNil);
    main.op(Op::Ret);

    assert_eq!(
        run_main(main),
        vec![Value::Boolean(true), Value::Boolean(true)]
    );
}

#[test]
fn test_vector_push_read_pop() {
    let mut main = FunctionBuilder::new("main");
    let v = main.local();
    main.op(Op::LdNVec).st_loc(v);
    main.ld(10).ld_loc(v).op(Op::Pshv);
    main.ld(20).ld_loc(v).op(Op::Pshv);
    main.ld(11).ld_loc(v).ld(0).op(Op::Uen);
    main.ld_loc(v).ld(0).op(Op::Ren);
    main.ld_loc(v).ld(5).op(Op::Ren);
    main.ld_loc(v).op(Op::Popv);
    main.op(Op::Ret);

    assert_eq!(
        run_main(main),
        vec![Value::Integer(11), Value::Nil, Value::Integer(20)]
    );
}

#[test]
fn test_vector_faults() {
    let mut main = FunctionBuilder::new("main");
    main.op(Op::LdNVec).op(Op::Popv);
    assert_eq!(
        fault_of(main),
        VmFault::VectorIndexOutOfRange { index: -1, len: 0 }
    );

    let mut main = FunctionBuilder::new("main");
    let v = main.local();
    main.op(Op::LdNVec).st_loc(v);
    main.ld(1).ld_loc(v).op(Op::Pshv);
    main.ld(2).ld_loc(v).ld(5).op(Op::Uen);
    assert_eq!(
        fault_of(main),
        VmFault::VectorIndexOutOfRange { index: 5, len: 1 }
    );
}

#[test]
fn test_reading_a_non_container_faults() {
    let mut main = FunctionBuilder::new("main");
    main.ld(1).ld(2).op(Op::Ren);

    assert!(matches!(fault_of(main), VmFault::AssertionFailed { .. }));
}
