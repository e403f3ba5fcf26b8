use super::helpers::*;
use crate::bytecode::{FunctionBuilder, Op};
use crate::context::Context;
use crate::function::Function;
use crate::scheduler::Scheduler;
use crate::value::Value;
use maplit::hashmap;

#[test]
fn test_global_read_and_write_reach_the_root() {
    let root = Context::from_variables(hashmap! {
        "g".to_string() => Value::Integer(5),
    });

    let mut main = FunctionBuilder::new("main");
    main.op(Op::LdDel).ld_fun(1).op(Op::Bind).op(Op::Call).op(Op::Ret);

    let mut nested = FunctionBuilder::new("nested");
    nested.ld_str(0).op(Op::Rvg);
    nested.ld(7).ld_str(1).op(Op::Uvg);
    nested.op(Op::Ret);

    let unit = unit_of(vec![main, nested], &["g", "h"]);
    let result = Scheduler::default()
        .execute_unit(unit, None, Some(root.clone()))
        .expect("execution failed");

    assert_eq!(result, ints(&[5]));
    assert_eq!(root.borrow().get_local("h"), Some(Value::Integer(7)));
}

#[test]
fn test_declared_context_variables_shadow() {
    let root = Context::from_variables(hashmap! {
        "x".to_string() => Value::Integer(1),
    });

    let mut main = FunctionBuilder::new("main");
    main.context_variable("x");
    main.ld(2).ld_str(0).op(Op::Uvc);
    main.ld_str(0).op(Op::Rvc).op(Op::Ret);

    let unit = unit_of(vec![main], &["x"]);
    let result = Scheduler::default()
        .execute_unit(unit, None, Some(root.clone()))
        .expect("execution failed");

    assert_eq!(result, ints(&[2]));
    assert_eq!(root.borrow().get_local("x"), Some(Value::Integer(1)));
}

#[test]
fn test_undeclared_writes_land_in_the_root() {
    let root = Context::new_root();

    let mut main = FunctionBuilder::new("main");
    main.ld(3).ld_str(0).op(Op::Uvc).op(Op::Ret);

    let unit = unit_of(vec![main], &["y"]);
    Scheduler::default()
        .execute_unit(unit, None, Some(root.clone()))
        .expect("execution failed");

    assert_eq!(root.borrow().get_local("y"), Some(Value::Integer(3)));
}

#[test]
fn test_unknown_variable_reads_nil() {
    let mut main = FunctionBuilder::new("main");
    main.ld_str(0).op(Op::Rvc).op(Op::Ret);

    assert_eq!(run(vec![main], &["missing"], &[]), vec![Value::Nil]);
}

#[test]
fn test_execute_function_with_context() {
    let context = Context::new_root();

    let mut main = FunctionBuilder::new("main");
    main.ld_arg(0).ld_str(0).op(Op::Uvc).op(Op::Ret);

    let unit = unit_of(vec![main], &["r"]);
    let function = Function::entry(unit, None).expect("entry in range");
    let result = Scheduler::default()
        .execute_function_with_context(function, context.clone(), &ints(&[3]))
        .expect("execution failed");

    assert!(result.is_empty());
    assert_eq!(context.borrow().get_local("r"), Some(Value::Integer(3)));
}
