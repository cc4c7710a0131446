// Copyright 2026 the Exprvm Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use exprvm::builder::Builder;
use exprvm::code::Code;
use exprvm::comprehension::{Comprehension, ForPhrase, Var};
use exprvm::context::{Context, Limits};
use exprvm::host::{HostError, Signature};
use exprvm::instr::Instr;
use exprvm::ops::Op;
use exprvm::registry::{FuncvRef, FuncvSpec, Package};
use exprvm::trace::{TraceMask, TraceSink};
use exprvm::types::{Kind, Type};
use exprvm::value::Value;

fn bench_vm(c: &mut Criterion) {
    bench_int_add_chain(c);
    bench_int_add_chain_traced_instr(c);
    bench_host_call(c);
    bench_wide_host_call(c);
    bench_list_comprehension(c);
    bench_nested_comprehension(c);
}

fn bench_int_add_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("int_add_chain");
    for &chain_len in &[10_usize, 50, 200, 1000] {
        let code = build_int_add_chain(chain_len);
        group.bench_with_input(BenchmarkId::from_parameter(chain_len), &code, |b, code| {
            let mut ctx = Context::with_limits(code, wide_open_limits());
            b.iter(|| {
                ctx.exec(0, code.len()).unwrap();
                black_box(ctx.pop());
            });
        });
    }
    group.finish();
}

fn bench_int_add_chain_traced_instr(c: &mut Criterion) {
    let mut group = c.benchmark_group("int_add_chain_traced_instr");
    for &chain_len in &[10_usize, 50, 200] {
        let code = build_int_add_chain(chain_len);
        let mut sink = CountingInstr::default();
        group.bench_with_input(BenchmarkId::from_parameter(chain_len), &code, |b, code| {
            let mut ctx = Context::with_limits(code, wide_open_limits());
            b.iter(|| {
                ctx.exec_traced(0, code.len(), TraceMask::INSTR, Some(&mut sink))
                    .unwrap();
                black_box(ctx.pop());
            });
        });
    }
    group.finish();
}

fn bench_host_call(c: &mut Criterion) {
    let mut group = c.benchmark_group("host_call");
    let sum = sum_func();
    for &arity in &[1_usize, 8, 64] {
        let code = build_sum_call(&sum, arity);
        group.bench_with_input(BenchmarkId::from_parameter(arity), &code, |b, code| {
            let mut ctx = Context::with_limits(code, wide_open_limits());
            b.iter(|| {
                ctx.exec(0, code.len()).unwrap();
                black_box(ctx.pop());
            });
        });
    }
    group.finish();
}

fn bench_wide_host_call(c: &mut Criterion) {
    let mut group = c.benchmark_group("wide_host_call");
    let sum = sum_func();
    for &arity in &[1023_usize, 1024, 4096] {
        let code = build_sum_call(&sum, arity);
        group.bench_with_input(BenchmarkId::from_parameter(arity), &code, |b, code| {
            let mut ctx = Context::with_limits(code, wide_open_limits());
            b.iter(|| {
                ctx.exec(0, code.len()).unwrap();
                black_box(ctx.pop());
            });
        });
    }
    group.finish();
}

fn bench_list_comprehension(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_comprehension");
    for &len in &[16_usize, 256, 4096] {
        let code = build_squares(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &code, |b, code| {
            let mut ctx = Context::with_limits(code, wide_open_limits());
            b.iter(|| {
                ctx.exec(0, code.len()).unwrap();
                black_box(ctx.pop());
            });
        });
    }
    group.finish();
}

fn bench_nested_comprehension(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested_comprehension");
    for &len in &[8_usize, 32, 128] {
        let code = build_products(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &code, |b, code| {
            let mut ctx = Context::with_limits(code, wide_open_limits());
            b.iter(|| {
                ctx.exec(0, code.len()).unwrap();
                black_box(ctx.pop());
            });
        });
    }
    group.finish();
}

fn wide_open_limits() -> Limits {
    Limits {
        fuel: u64::MAX,
        max_stack: usize::MAX,
        max_host_calls: u64::MAX,
    }
}

#[derive(Default)]
struct CountingInstr {
    count: u64,
}

impl TraceSink for CountingInstr {
    fn instr(&mut self, _code: &Code, _ip: usize, _instr: Instr, _stack_len: usize) {
        self.count = self.count.wrapping_add(1);
    }
}

fn exec_sum(arity: usize, ctx: &mut Context<'_>) -> Result<(), HostError> {
    let mut total = 0_i64;
    for (index, a) in ctx.args(arity).iter().enumerate() {
        total = total.wrapping_add(a.as_int().ok_or(HostError::BadArgument {
            index,
            expected: Kind::Int.ty(),
        })?);
    }
    ctx.ret(arity, Value::Int(total));
    Ok(())
}

fn sum_func() -> FuncvRef {
    let mut pkg = Package::new("math");
    pkg.register_funcv(FuncvSpec::new(
        "Sum",
        exec_sum,
        Signature::variadic(Vec::new(), Kind::Int.ty(), [Kind::Int.ty()]),
    ))
    .unwrap()
}

fn build_int_add_chain(chain_len: usize) -> Code {
    let mut b = Builder::new();
    b.push(0).unwrap();
    for _ in 0..chain_len {
        b.push(1).unwrap().builtin_op(Kind::Int, Op::Add).unwrap();
    }
    b.resolve().unwrap()
}

fn build_sum_call(sum: &FuncvRef, arity: usize) -> Code {
    let mut b = Builder::new();
    for i in 0..arity {
        b.push(i64::try_from(i).unwrap()).unwrap();
    }
    b.call_funcv(sum, arity).unwrap();
    b.resolve().unwrap()
}

fn push_range(b: &mut Builder<'_>, ty: Type, len: usize) {
    for i in 0..len {
        b.push(i64::try_from(i).unwrap()).unwrap();
    }
    b.make_array(ty, isize::try_from(len).unwrap()).unwrap();
}

fn build_squares(len: usize) -> Code {
    let ints = Type::slice_of(Kind::Int.ty());
    let x = Var::new(Kind::Int.ty(), "x");
    let f = ForPhrase::new(None, &x, ints);
    let comp = Comprehension::new(ints);

    let mut b = Builder::new();
    b.begin_comprehension(&comp).unwrap();
    push_range(&mut b, ints, len);
    b.for_phrase(&f).unwrap().define_var(&[&x]).unwrap();
    b.load_var(&x).unwrap().load_var(&x).unwrap();
    b.builtin_op(Kind::Int, Op::Mul).unwrap();
    b.end_for_phrase(&f).unwrap().end_comprehension(&comp).unwrap();
    b.resolve().unwrap()
}

fn build_products(len: usize) -> Code {
    let ints = Type::slice_of(Kind::Int.ty());
    let a = Var::new(Kind::Int.ty(), "a");
    let z = Var::new(Kind::Int.ty(), "b");
    let outer = ForPhrase::new(None, &z, ints);
    let inner = ForPhrase::new(None, &a, ints);
    let comp = Comprehension::new(ints);

    let mut b = Builder::new();
    b.begin_comprehension(&comp).unwrap();
    push_range(&mut b, ints, len);
    b.for_phrase(&outer).unwrap().define_var(&[&z]).unwrap();
    push_range(&mut b, ints, len);
    b.for_phrase(&inner).unwrap().define_var(&[&a]).unwrap();
    b.load_var(&a).unwrap().push(1).unwrap();
    b.builtin_op(Kind::Int, Op::And).unwrap().push(0).unwrap();
    b.builtin_op(Kind::Int, Op::Eq).unwrap();
    b.filter_for_phrase(&inner).unwrap();
    b.load_var(&a).unwrap().load_var(&z).unwrap();
    b.builtin_op(Kind::Int, Op::Mul).unwrap();
    b.end_for_phrase(&inner).unwrap();
    b.end_for_phrase(&outer).unwrap();
    b.end_comprehension(&comp).unwrap();
    b.resolve().unwrap()
}

criterion_group!(benches, bench_vm);
criterion_main!(benches);
